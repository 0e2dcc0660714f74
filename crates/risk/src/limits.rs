//! Risk limit configuration.

use xmm_core::types::Quantity;

/// Immutable snapshot of the configured risk limits.
///
/// A limit of zero disables its check, except for the thresholds, which are
/// counts.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    // Position limits
    /// Maximum absolute position per symbol (0 = unlimited).
    pub max_position_qty: Quantity,
    /// Maximum position value in quote currency (0 = unlimited).
    pub max_position_value: f64,
    /// Maximum total exposure across symbols (0 = unlimited).
    pub max_total_exposure: f64,

    // Order limits
    /// Maximum single order quantity (0 = unlimited).
    pub max_order_qty: Quantity,
    /// Maximum single order value in quote currency (0 = unlimited).
    pub max_order_value: f64,
    /// Per-wall-clock-second order admission cap (0 = unlimited).
    pub max_orders_per_second: u32,
    /// Maximum concurrent open orders (0 = unlimited).
    pub max_open_orders: u32,

    // Loss limits
    /// Maximum loss on a single trade (0 = unlimited).
    pub max_loss_per_trade: f64,
    /// Daily realized-loss limit; reaching it arms the kill switch.
    pub max_daily_loss: f64,
    /// Maximum drawdown from peak equity; exceeding it arms the kill switch.
    pub max_drawdown: f64,

    // Price limits
    /// Maximum deviation from the reference price in basis points.
    pub max_deviation_bps: f64,

    // Circuit breakers
    pub kill_switch_enabled: bool,
    /// Adapter errors before the kill switch arms.
    pub error_threshold: u32,
    /// Rejects before the kill switch arms.
    pub reject_threshold: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_qty: Quantity::ZERO,
            max_position_value: 0.0,
            max_total_exposure: 0.0,
            max_order_qty: Quantity::ZERO,
            max_order_value: 0.0,
            max_orders_per_second: 100,
            max_open_orders: 100,
            max_loss_per_trade: 0.0,
            max_daily_loss: 0.0,
            max_drawdown: 0.0,
            max_deviation_bps: 100.0,
            kill_switch_enabled: true,
            error_threshold: 10,
            reject_threshold: 20,
        }
    }
}
