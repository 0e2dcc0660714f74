//! Per-symbol position with average entry price and P&L.

use xmm_core::types::{Price, Quantity, Side, Symbol, Timestamp};

use xmm_core::types::price::PRICE_SCALE;
use xmm_core::types::quantity::QTY_SCALE;

/// A net position in one symbol. Positive quantity is long, negative short.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Quantity,
    /// Weighted-average entry price of the open quantity.
    pub avg_price: Price,
    /// Realized P&L in quote currency, accumulated over closes.
    pub realized_pnl: f64,
    /// Mark-to-market P&L of the open quantity; zero when flat.
    pub unrealized_pnl: f64,
    pub last_update: Timestamp,
}

impl Position {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            quantity: Quantity::ZERO,
            avg_price: Price::ZERO,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            last_update: Timestamp::ZERO,
        }
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        self.quantity.is_positive()
    }

    #[inline]
    pub fn is_short(&self) -> bool {
        self.quantity.is_negative()
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Absolute position value at `mark`, in quote currency.
    pub fn notional_value(&self, mark: Price) -> f64 {
        self.quantity.abs().to_f64() * mark.to_f64()
    }

    /// Apply a fill and return the realized P&L delta it produced.
    ///
    /// Same-direction fills extend the position and reprice the weighted
    /// average entry. Opposite-direction fills close up to the open size,
    /// realizing `closed * (exit - entry)` with the sign of the position;
    /// crossing through zero restarts the average at the fill price.
    pub fn apply_fill(&mut self, side: Side, fill_qty: Quantity, fill_price: Price) -> f64 {
        let mut realized = 0.0;

        match side {
            Side::Buy => {
                if !self.quantity.is_negative() {
                    self.extend(fill_qty, fill_price);
                } else {
                    let covered = fill_qty.min(self.quantity.abs());
                    realized = covered.to_f64() * (self.avg_price - fill_price).to_f64();
                    self.quantity = self.quantity + fill_qty;
                    if self.quantity.is_positive() {
                        self.avg_price = fill_price;
                    }
                }
            }
            Side::Sell => {
                if !self.quantity.is_positive() {
                    self.extend(-fill_qty, fill_price);
                } else {
                    let closed = fill_qty.min(self.quantity);
                    realized = closed.to_f64() * (fill_price - self.avg_price).to_f64();
                    self.quantity = self.quantity - fill_qty;
                    if self.quantity.is_negative() {
                        self.avg_price = fill_price;
                    }
                }
            }
        }

        self.realized_pnl += realized;
        self.last_update = Timestamp::now();
        realized
    }

    /// Extend the position by `signed_qty`, repricing the weighted average.
    fn extend(&mut self, signed_qty: Quantity, fill_price: Price) {
        let old_abs = self.quantity.abs().raw() as i128;
        let add_abs = signed_qty.abs().raw() as i128;
        let new_abs = old_abs + add_abs;
        if new_abs > 0 {
            // i128: avg * qty products at 10^8 scales overflow i64.
            let weighted =
                self.avg_price.raw() as i128 * old_abs + fill_price.raw() as i128 * add_abs;
            self.avg_price = Price::from_raw((weighted / new_abs) as i64);
        }
        self.quantity = self.quantity + signed_qty;
    }

    /// Recompute unrealized P&L against `mark`. A flat position marks to
    /// zero and leaves realized P&L untouched.
    pub fn mark(&mut self, mark: Price) {
        if self.quantity.is_zero() || self.avg_price.is_zero() {
            self.unrealized_pnl = 0.0;
            return;
        }
        let diff = if self.is_long() {
            (mark - self.avg_price).to_f64()
        } else {
            (self.avg_price - mark).to_f64()
        };
        self.unrealized_pnl = self.quantity.abs().to_f64() * diff;
        self.last_update = Timestamp::now();
    }
}

// The two scales must agree for `qty.to_f64() * price.to_f64()` notional
// math to mean quote currency.
const _: () = assert!(PRICE_SCALE == QTY_SCALE);


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    // Round-trip property: any fill sequence that ends flat realizes
    // exactly the P&L computed directly from the fills.
    proptest! {
        #[test]
        fn closing_flat_matches_direct_pnl(
            fills in proptest::collection::vec(
                (
                    any::<bool>(),
                    1i64..1_000,
                    1_000i64..2_000,
                ),
                1..30,
            ),
        ) {
            let mut pos = Position::new(Symbol::new("BTCUSDT"));
            let mut cash = 0.0f64;
            let mut net = 0i64;

            for (is_buy, qty_raw, price_raw) in fills {
                let side = if is_buy { Side::Buy } else { Side::Sell };
                let q = Quantity::from_raw(qty_raw * 100_000_000);
                let p = Price::from_raw(price_raw * 100_000_000);
                pos.apply_fill(side, q, p);
                let signed = if is_buy { qty_raw } else { -qty_raw };
                cash -= signed as f64 * price_raw as f64;
                net += signed;
            }

            // Force flat at a final price and compare.
            let settle = Price::from_raw(1_500 * 100_000_000);
            if net > 0 {
                pos.apply_fill(Side::Sell, Quantity::from_raw(net * 100_000_000), settle);
                cash += net as f64 * 1_500.0;
            } else if net < 0 {
                pos.apply_fill(Side::Buy, Quantity::from_raw(-net * 100_000_000), settle);
                cash -= (-net) as f64 * 1_500.0;
            }

            prop_assert!(pos.is_flat());
            prop_assert!(
                (pos.realized_pnl - cash).abs() < 1e-3,
                "realized {} != cash flow {}",
                pos.realized_pnl,
                cash
            );
        }
    }
}
