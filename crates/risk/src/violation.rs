//! Pre-trade rejection reasons.

use xmm_core::types::{Quantity, Symbol};

/// Reason an order was refused by the [`RiskGate`](crate::RiskGate).
///
/// These are expected runtime outcomes, not errors: the pipeline continues
/// after a rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskViolation {
    #[error("kill switch active")]
    KillSwitchActive,

    #[error("trading disabled for {symbol}")]
    SymbolDisabled { symbol: Symbol },

    #[error("position limit: post-trade {resulting} exceeds max {limit}")]
    PositionLimit { resulting: Quantity, limit: Quantity },

    #[error("order size {quantity} exceeds max {limit}")]
    OrderSizeLimit { quantity: Quantity, limit: Quantity },

    #[error("order value {value:.2} exceeds max {limit:.2}")]
    OrderValueLimit { value: f64, limit: f64 },

    #[error("rate limit: {count} orders this second, max {limit}")]
    RateLimit { count: u32, limit: u32 },

    #[error("open orders limit reached: {count} of {limit}")]
    OpenOrdersLimit { count: u32, limit: u32 },

    #[error("daily loss limit: {loss:.2} reached {limit:.2}")]
    DailyLossLimit { loss: f64, limit: f64 },

    #[error("price deviates {deviation_bps:.1} bps from reference, max {limit_bps:.1}")]
    PriceDeviation { deviation_bps: f64, limit_bps: f64 },
}
