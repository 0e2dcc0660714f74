//! Inventory-adjusted market maker.
//!
//! Tracks an exponential moving average of the position and maps it through
//! a sigmoid, so the skew responds smoothly to sustained inventory and
//! saturates at the extremes instead of reacting linearly to every fill.

use xmm_book::OrderBook;
use xmm_core::types::Quantity;

use crate::signal::Signal;
use crate::traits::{QuoteDecision, Quoter, QuoterCore, QuoterParams};

/// Default EMA smoothing factor for the position.
const DEFAULT_EMA_ALPHA: f64 = 0.1;

/// Market maker with EMA-smoothed, sigmoid-shaped inventory skew.
pub struct InventoryQuoter {
    core: QuoterCore,
    ema_alpha: f64,
    ema_position: f64,
}

impl InventoryQuoter {
    pub fn new(params: QuoterParams) -> Self {
        Self::with_alpha(params, DEFAULT_EMA_ALPHA)
    }

    pub fn with_alpha(params: QuoterParams, ema_alpha: f64) -> Self {
        Self {
            core: QuoterCore::new(params),
            ema_alpha,
            ema_position: 0.0,
        }
    }

    /// `2 * sigmoid(3 * ema / max) - 1`, an odd function saturating toward
    /// ±1 as smoothed inventory approaches the cap.
    fn sigmoid_skew(&self) -> f64 {
        if self.core.params.max_position.is_zero() {
            return 0.0;
        }
        let normalized = self.ema_position / self.core.params.max_position.raw() as f64;
        2.0 / (1.0 + (-3.0 * normalized).exp()) - 1.0
    }

    #[cfg(test)]
    fn ema_position(&self) -> f64 {
        self.ema_position
    }
}

impl Quoter for InventoryQuoter {
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
        self.ema_position = self.ema_alpha * position.raw() as f64
            + (1.0 - self.ema_alpha) * self.ema_position;
        let skew = self.sigmoid_skew();
        self.core.quote_around_mid(book, position, signal, skew)
    }

    fn name(&self) -> &'static str {
        "inventory_mm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmm_core::types::{Price, Symbol};

    fn px(v: f64) -> Price {
        Price::from_f64(v)
    }

    fn qty(v: f64) -> Quantity {
        Quantity::from_f64(v)
    }

    fn make_quoter(alpha: f64) -> InventoryQuoter {
        let mut quoter = InventoryQuoter::with_alpha(
            QuoterParams {
                max_position: qty(10.0),
                default_order_size: qty(1.0),
                min_quote_life_us: 0,
                ..QuoterParams::default()
            },
            alpha,
        );
        quoter.set_enabled(true);
        quoter
    }

    fn make_book() -> OrderBook {
        let mut book = OrderBook::new(Symbol::new("BTCUSDT"));
        book.apply_snapshot(&[(px(99.5), qty(1.0))], &[(px(100.5), qty(1.0))]);
        book
    }

    #[test]
    fn test_ema_tracks_position() {
        let mut quoter = make_quoter(0.5);
        let book = make_book();
        quoter.compute_quotes(&book, qty(4.0), &Signal::default());
        assert_eq!(quoter.ema_position(), qty(4.0).raw() as f64 * 0.5);
        quoter.compute_quotes(&book, qty(4.0), &Signal::default());
        assert_eq!(quoter.ema_position(), qty(4.0).raw() as f64 * 0.75);
    }

    #[test]
    fn test_sigmoid_skew_saturates() {
        let mut quoter = make_quoter(1.0);
        let book = make_book();
        // alpha 1.0: ema == position immediately.
        quoter.compute_quotes(&book, qty(10.0), &Signal::default());
        let at_max = quoter.sigmoid_skew();
        quoter.compute_quotes(&book, qty(100.0), &Signal::default());
        let past_max = quoter.sigmoid_skew();

        assert!(at_max > 0.8 && at_max < 1.0);
        assert!(past_max > at_max && past_max <= 1.0);
    }

    #[test]
    fn test_sigmoid_skew_odd() {
        let mut long_quoter = make_quoter(1.0);
        let mut short_quoter = make_quoter(1.0);
        let book = make_book();
        long_quoter.compute_quotes(&book, qty(5.0), &Signal::default());
        short_quoter.compute_quotes(&book, qty(-5.0), &Signal::default());
        assert!(
            (long_quoter.sigmoid_skew() + short_quoter.sigmoid_skew()).abs() < 1e-12,
            "sigmoid skew must be symmetric"
        );
    }

    #[test]
    fn test_smoothing_lags_spot_position() {
        // With a small alpha, one fill barely moves the skew.
        let mut quoter = make_quoter(0.01);
        let book = make_book();
        let flat = quoter.compute_quotes(&book, Quantity::ZERO, &Signal::default());
        let jump = quoter.compute_quotes(&book, qty(10.0), &Signal::default());

        let flat_bid = flat.bid_price.to_f64();
        let jump_bid = jump.bid_price.to_f64();
        // Moves down, but only slightly.
        assert!(jump_bid < flat_bid);
        assert!(flat_bid - jump_bid < 0.01);
    }

    #[test]
    fn test_no_cross_under_saturation() {
        let mut quoter = make_quoter(1.0);
        let book = make_book();
        let decision = quoter.compute_quotes(&book, qty(50.0), &Signal::default());
        if decision.should_quote {
            assert!(decision.bid_price < decision.ask_price);
        }
    }

    #[test]
    fn test_unlimited_position_no_skew() {
        let mut quoter = InventoryQuoter::new(QuoterParams {
            max_position: Quantity::ZERO,
            default_order_size: qty(1.0),
            min_quote_life_us: 0,
            ..QuoterParams::default()
        });
        quoter.set_enabled(true);
        let book = make_book();
        quoter.compute_quotes(&book, qty(100.0), &Signal::default());
        assert_eq!(quoter.sigmoid_skew(), 0.0);
    }

    #[test]
    fn test_name() {
        assert_eq!(make_quoter(0.1).name(), "inventory_mm");
    }
}
