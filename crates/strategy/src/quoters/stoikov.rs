//! Avellaneda–Stoikov market maker.
//!
//! Quotes around the reservation (indifference) price
//! `r = mid - mid * q * gamma * sigma^2 * t_remaining` with the optimal
//! spread `gamma * sigma^2 * t_remaining + (2 / gamma) * ln(1 + gamma / k)`,
//! where `q` is the signed inventory in whole units, `gamma` the risk
//! aversion, `sigma` the volatility, `k` the order arrival intensity, and
//! the horizon wraps so the strategy runs continuously across periods.

use xmm_book::OrderBook;
use xmm_core::types::{Price, Quantity, Timestamp};

use crate::signal::Signal;
use crate::traits::{DeclineReason, QuoteDecision, Quoter, QuoterCore, QuoterParams};

/// Avellaneda–Stoikov model parameters.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StoikovParams {
    /// Inventory risk aversion.
    pub gamma: f64,
    /// Volatility over the horizon.
    pub sigma: f64,
    /// Order arrival intensity.
    pub k: f64,
    /// Horizon length in seconds; time-remaining wraps each period.
    pub horizon_secs: f64,
}

impl Default for StoikovParams {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            sigma: 0.02,
            k: 1.5,
            horizon_secs: 60.0,
        }
    }
}

/// Market maker quoting the Avellaneda–Stoikov reservation price and
/// optimal spread.
pub struct StoikovQuoter {
    core: QuoterCore,
    model: StoikovParams,
    start_time: Timestamp,
}

impl StoikovQuoter {
    pub fn new(params: QuoterParams, model: StoikovParams) -> Self {
        Self {
            core: QuoterCore::new(params),
            model,
            start_time: Timestamp::ZERO,
        }
    }

    /// Normalized time remaining in the current horizon period, floored at
    /// 0.01 so the spread never fully collapses at the period boundary.
    fn time_remaining(&self, now: Timestamp) -> f64 {
        let elapsed_secs = now.nanos_since(self.start_time) as f64 / 1e9;
        let cycles = elapsed_secs / self.model.horizon_secs;
        (1.0 - cycles.fract()).max(0.01)
    }

    /// `r = mid - mid * q * gamma * sigma^2 * t_remaining`.
    fn reservation_price(&self, mid: Price, position: Quantity, t_remaining: f64) -> Price {
        let adjustment = position.to_f64()
            * self.model.gamma
            * self.model.sigma
            * self.model.sigma
            * t_remaining;
        mid - Price::from_raw((mid.raw() as f64 * adjustment) as i64)
    }

    /// Optimal spread in bps, clamped to the configured band.
    fn optimal_spread_bps(&self, t_remaining: f64) -> f64 {
        let term1 = self.model.gamma * self.model.sigma * self.model.sigma * t_remaining;
        let term2 = (2.0 / self.model.gamma) * (1.0 + self.model.gamma / self.model.k).ln();
        (10_000.0 * (term1 + term2))
            .clamp(self.core.params.min_spread_bps, self.core.params.max_spread_bps)
    }
}

impl Quoter for StoikovQuoter {
    fn core(&self) -> &QuoterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut QuoterCore {
        &mut self.core
    }

    fn compute_quotes(
        &mut self,
        book: &OrderBook,
        position: Quantity,
        signal: &Signal,
    ) -> QuoteDecision {
        if !self.core.enabled {
            return QuoteDecision::decline(DeclineReason::Disabled);
        }
        if !book.is_valid() {
            return QuoteDecision::decline(DeclineReason::InvalidBook);
        }
        let mid = match book.mid_price() {
            Some(mid) if !mid.is_zero() => mid,
            _ => return QuoteDecision::decline(DeclineReason::NoFairValue),
        };

        if self.start_time == Timestamp::ZERO {
            self.start_time = signal.timestamp;
        }
        let t_remaining = self.time_remaining(signal.timestamp);

        let reservation = self.reservation_price(mid, position, t_remaining);
        let spread_bps = self.optimal_spread_bps(t_remaining);
        let half_spread = Price::from_raw((mid.raw() as f64 * spread_bps / 20_000.0) as i64);

        let bid_price = reservation - half_spread;
        let ask_price = reservation + half_spread;
        if bid_price >= ask_price {
            return QuoteDecision::decline(DeclineReason::WouldCross);
        }

        let bid_size = self.core.order_size(xmm_core::types::Side::Buy, position);
        let ask_size = self.core.order_size(xmm_core::types::Side::Sell, position);
        if bid_size.is_zero() && ask_size.is_zero() {
            return QuoteDecision::decline(DeclineReason::ZeroSize);
        }

        QuoteDecision {
            should_quote: true,
            bid_price,
            ask_price,
            bid_size,
            ask_size,
            reason: None,
        }
    }

    fn name(&self) -> &'static str {
        "stoikov_mm"
    }
}
