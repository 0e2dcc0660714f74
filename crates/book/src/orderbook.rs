//! Per-venue L2 order book with L3 order tracking.
//!
//! Bids are keyed by [`std::cmp::Reverse`] so `BTreeMap` iteration yields
//! prices in descending order (highest bid first); asks use natural
//! ordering. A quantity of zero erases a level. Depth queries go through
//! cached top-of-book arrays that are rebuilt lazily after mutations.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::HashMap;

use xmm_core::types::{Order, OrderId, Price, Quantity, Side, Symbol, Tick, Timestamp};

/// Depth retained by the per-side caches.
pub const MAX_DEPTH: usize = 100;

/// Errors from L3 order tracking.
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    /// The order id is not tracked by this book.
    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),
}

/// Aggregated resting interest at a single price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Quantity,
    /// Number of distinct orders contributing (1 for pure L2 feeds).
    pub order_count: u32,
    pub last_update: Timestamp,
}

impl PriceLevel {
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self {
            price,
            quantity,
            order_count: 1,
            last_update: Timestamp::now(),
        }
    }
}

/// L2 order book for one venue and symbol, with optional per-order (L3)
/// tracking layered on top of the price levels.
pub struct OrderBook {
    symbol: Symbol,
    /// Bid levels, highest price first in iteration order.
    bids: BTreeMap<Reverse<Price>, PriceLevel>,
    /// Ask levels, lowest price first.
    asks: BTreeMap<Price, PriceLevel>,
    /// L3: resting orders by id.
    orders: HashMap<OrderId, Order>,
    bid_cache: Vec<PriceLevel>,
    ask_cache: Vec<PriceLevel>,
    bid_cache_dirty: bool,
    ask_cache_dirty: bool,
    last_update: Timestamp,
    sequence: u64,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
            bid_cache: Vec::with_capacity(MAX_DEPTH),
            ask_cache: Vec::with_capacity(MAX_DEPTH),
            bid_cache_dirty: true,
            ask_cache_dirty: true,
            last_update: Timestamp::ZERO,
            sequence: 0,
        }
    }

    // ── L2 updates ─────────────────────────────────────────────────────

    /// Set or erase a bid level. Zero quantity erases.
    pub fn update_bid(&mut self, price: Price, quantity: Quantity) {
        if quantity.is_zero() {
            self.bids.remove(&Reverse(price));
        } else {
            self.bids.insert(Reverse(price), PriceLevel::new(price, quantity));
        }
        self.bid_cache_dirty = true;
        self.last_update = Timestamp::now();
    }

    /// Set or erase an ask level. Zero quantity erases.
    pub fn update_ask(&mut self, price: Price, quantity: Quantity) {
        if quantity.is_zero() {
            self.asks.remove(&price);
        } else {
            self.asks.insert(price, PriceLevel::new(price, quantity));
        }
        self.ask_cache_dirty = true;
        self.last_update = Timestamp::now();
    }

    /// Replace both sides atomically and reset the sequence. Zero-quantity
    /// input levels are skipped.
    pub fn apply_snapshot(&mut self, bids: &[(Price, Quantity)], asks: &[(Price, Quantity)]) {
        self.bids.clear();
        self.asks.clear();
        for &(price, qty) in bids {
            if !qty.is_zero() {
                self.bids.insert(Reverse(price), PriceLevel::new(price, qty));
            }
        }
        for &(price, qty) in asks {
            if !qty.is_zero() {
                self.asks.insert(price, PriceLevel::new(price, qty));
            }
        }
        self.sequence = 0;
        self.bid_cache_dirty = true;
        self.ask_cache_dirty = true;
        self.last_update = Timestamp::now();
    }

    /// Replace both sides with a top-of-book tick. Used on venues where the
    /// feed carries only the best levels.
    pub fn apply_tick(&mut self, tick: &Tick) {
        self.bids.clear();
        self.asks.clear();
        if !tick.bid_qty.is_zero() && tick.bid.is_positive() {
            self.bids
                .insert(Reverse(tick.bid), PriceLevel::new(tick.bid, tick.bid_qty));
        }
        if !tick.ask_qty.is_zero() && tick.ask.is_positive() {
            self.asks.insert(tick.ask, PriceLevel::new(tick.ask, tick.ask_qty));
        }
        self.sequence = tick.sequence;
        self.bid_cache_dirty = true;
        self.ask_cache_dirty = true;
        self.last_update = tick.local_ts;
    }

    pub fn clear_bids(&mut self) {
        self.bids.clear();
        self.bid_cache_dirty = true;
    }

    pub fn clear_asks(&mut self) {
        self.asks.clear();
        self.ask_cache_dirty = true;
    }

    // ── L3 updates ─────────────────────────────────────────────────────
    //
    // Levels always carry each order's unfilled remainder: add contributes
    // `remaining()`, fills shrink through `modify_order`, and removal
    // subtracts exactly the current remainder.

    /// Track an individual resting order, adding its remainder to the level.
    pub fn add_order(&mut self, order: Order) {
        let remaining = order.remaining();
        match order.side {
            Side::Buy => {
                let level = self
                    .bids
                    .entry(Reverse(order.price))
                    .or_insert_with(|| PriceLevel {
                        price: order.price,
                        quantity: Quantity::ZERO,
                        order_count: 0,
                        last_update: Timestamp::ZERO,
                    });
                level.quantity = level.quantity + remaining;
                level.order_count += 1;
                level.last_update = Timestamp::now();
                self.bid_cache_dirty = true;
            }
            Side::Sell => {
                let level = self.asks.entry(order.price).or_insert_with(|| PriceLevel {
                    price: order.price,
                    quantity: Quantity::ZERO,
                    order_count: 0,
                    last_update: Timestamp::ZERO,
                });
                level.quantity = level.quantity + remaining;
                level.order_count += 1;
                level.last_update = Timestamp::now();
                self.ask_cache_dirty = true;
            }
        }
        self.orders.insert(order.id, order);
        self.last_update = Timestamp::now();
    }

    /// Change a resting order's remainder to `new_remaining`, adjusting its
    /// level by the difference.
    pub fn modify_order(&mut self, id: OrderId, new_remaining: Quantity) -> Result<(), BookError> {
        let order = self.orders.get_mut(&id).ok_or(BookError::UnknownOrder(id))?;
        let delta = new_remaining - order.remaining();
        order.quantity = order.filled_qty + new_remaining;
        let (side, price) = (order.side, order.price);
        self.adjust_level(side, price, delta, 0);
        Ok(())
    }

    /// Stop tracking a resting order, subtracting its remainder from the
    /// level.
    pub fn remove_order(&mut self, id: OrderId) -> Result<Order, BookError> {
        let order = self.orders.remove(&id).ok_or(BookError::UnknownOrder(id))?;
        self.adjust_level(order.side, order.price, -order.remaining(), -1);
        Ok(order)
    }

    fn adjust_level(&mut self, side: Side, price: Price, qty_delta: Quantity, count_delta: i32) {
        match side {
            Side::Buy => {
                if let Some(level) = self.bids.get_mut(&Reverse(price)) {
                    level.quantity = level.quantity + qty_delta;
                    level.order_count = level.order_count.saturating_add_signed(count_delta);
                    level.last_update = Timestamp::now();
                    if !level.quantity.is_positive() || level.order_count == 0 {
                        self.bids.remove(&Reverse(price));
                    }
                }
                self.bid_cache_dirty = true;
            }
            Side::Sell => {
                if let Some(level) = self.asks.get_mut(&price) {
                    level.quantity = level.quantity + qty_delta;
                    level.order_count = level.order_count.saturating_add_signed(count_delta);
                    level.last_update = Timestamp::now();
                    if !level.quantity.is_positive() || level.order_count == 0 {
                        self.asks.remove(&price);
                    }
                }
                self.ask_cache_dirty = true;
            }
        }
        self.last_update = Timestamp::now();
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Highest bid level, if any.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.values().next().copied()
    }

    /// Lowest ask level, if any.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.values().next().copied()
    }

    /// Midpoint of the best bid and ask.
    pub fn mid_price(&self) -> Option<Price> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some(Price::midpoint(bid, ask))
    }

    /// Quoted spread: best ask minus best bid.
    pub fn spread(&self) -> Option<Price> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some(ask - bid)
    }

    /// Quoted spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<f64> {
        let spread = self.spread()?;
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return None;
        }
        Some(10_000.0 * spread.raw() as f64 / mid.raw() as f64)
    }

    /// Bid level at `depth` (0 = best), served from the rebuilt cache.
    pub fn bid_level(&mut self, depth: usize) -> Option<PriceLevel> {
        if self.bid_cache_dirty {
            self.rebuild_bid_cache();
        }
        self.bid_cache.get(depth).copied()
    }

    /// Ask level at `depth` (0 = best), served from the rebuilt cache.
    pub fn ask_level(&mut self, depth: usize) -> Option<PriceLevel> {
        if self.ask_cache_dirty {
            self.rebuild_ask_cache();
        }
        self.ask_cache.get(depth).copied()
    }

    /// Number of bid levels.
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask levels.
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Volume-weighted average bid price for sweeping `qty`, walking bids in
    /// descending price order. Returns zero when nothing fills.
    pub fn vwap_bid(&self, qty: Quantity) -> Price {
        Self::vwap(self.bids.values(), qty)
    }

    /// Volume-weighted average ask price for sweeping `qty`, walking asks in
    /// ascending price order. Returns zero when nothing fills.
    pub fn vwap_ask(&self, qty: Quantity) -> Price {
        Self::vwap(self.asks.values(), qty)
    }

    fn vwap<'a>(levels: impl Iterator<Item = &'a PriceLevel>, qty: Quantity) -> Price {
        let mut remaining = qty;
        // i128: price * quantity products at 10^8 scale overflow i64.
        let mut total_value: i128 = 0;
        let mut total_qty: i128 = 0;

        for level in levels {
            if !remaining.is_positive() {
                break;
            }
            let fill = remaining.min(level.quantity);
            total_value += level.price.raw() as i128 * fill.raw() as i128;
            total_qty += fill.raw() as i128;
            remaining = remaining - fill;
        }

        if total_qty == 0 {
            Price::ZERO
        } else {
            Price::from_raw((total_value / total_qty) as i64)
        }
    }

    /// Depth imbalance over the top `levels` per side:
    /// `(bid_vol - ask_vol) / (bid_vol + ask_vol)`, zero on an empty book.
    pub fn imbalance(&self, levels: usize) -> f64 {
        let bid_vol: i64 = self.bids.values().take(levels).map(|l| l.quantity.raw()).sum();
        let ask_vol: i64 = self.asks.values().take(levels).map(|l| l.quantity.raw()).sum();
        let total = bid_vol + ask_vol;
        if total == 0 {
            0.0
        } else {
            (bid_vol - ask_vol) as f64 / total as f64
        }
    }

    /// A book is valid when both sides are populated and not crossed.
    pub fn is_valid(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price < ask.price,
            _ => false,
        }
    }

    /// `true` when best bid >= best ask, indicating a feed integrity issue
    /// on a single venue.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    fn rebuild_bid_cache(&mut self) {
        self.bid_cache.clear();
        self.bid_cache.extend(self.bids.values().take(MAX_DEPTH).copied());
        self.bid_cache_dirty = false;
    }

    fn rebuild_ask_cache(&mut self) {
        self.ask_cache.clear();
        self.ask_cache.extend(self.asks.values().take(MAX_DEPTH).copied());
        self.ask_cache_dirty = false;
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_levels(
        lo: i64,
        hi: i64,
    ) -> impl Strategy<Value = Vec<(Price, Quantity)>> {
        proptest::collection::vec(
            (
                (lo..hi).prop_map(Price::from_raw),
                (1i64..1_000_000_000).prop_map(Quantity::from_raw),
            ),
            0..20,
        )
    }

    proptest! {
        // Bids below asks by construction: the book must never report
        // crossed and best levels must be side extremes.
        #[test]
        fn book_monotonicity(
            bids in arb_levels(1_000, 5_000_000),
            asks in arb_levels(5_000_001, 10_000_000),
        ) {
            let mut book = OrderBook::new(Symbol::new("BTCUSDT"));
            book.apply_snapshot(&bids, &asks);

            if book.bid_depth() > 0 && book.ask_depth() > 0 {
                prop_assert!(book.is_valid());
                prop_assert!(!book.is_crossed());
                let best_bid = book.best_bid().unwrap().price;
                let best_ask = book.best_ask().unwrap().price;
                for (p, _) in &bids {
                    prop_assert!(*p <= best_bid);
                }
                for (p, _) in &asks {
                    prop_assert!(*p >= best_ask);
                }
            }
        }

        // Setting then erasing a level restores the prior side exactly.
        #[test]
        fn set_then_erase_is_identity(
            base in arb_levels(1_000, 5_000_000),
            price in (5_000_001i64..6_000_000).prop_map(Price::from_raw),
            qty in (1i64..1_000_000).prop_map(Quantity::from_raw),
        ) {
            let mut book = OrderBook::new(Symbol::new("BTCUSDT"));
            book.apply_snapshot(&base, &[]);
            let before: Vec<_> = (0..book.bid_depth()).filter_map(|d| book.bid_level(d)).collect();

            book.update_bid(price, qty);
            book.update_bid(price, Quantity::ZERO);

            let after: Vec<_> = (0..book.bid_depth()).filter_map(|d| book.bid_level(d)).collect();
            prop_assert_eq!(before.len(), after.len());
            for (b, a) in before.iter().zip(after.iter()) {
                prop_assert_eq!(b.price, a.price);
                prop_assert_eq!(b.quantity, a.quantity);
            }
        }

        // The VWAP of a sweep lies within the price range of the side.
        #[test]
        fn vwap_within_side_range(
            bids in arb_levels(1_000, 5_000_000),
            sweep in 1i64..10_000_000_000,
        ) {
            let mut book = OrderBook::new(Symbol::new("BTCUSDT"));
            book.apply_snapshot(&bids, &[]);
            let vwap = book.vwap_bid(Quantity::from_raw(sweep));
            if book.bid_depth() > 0 {
                let best = book.best_bid().unwrap().price;
                let worst = bids.iter().map(|(p, _)| *p).min().unwrap();
                prop_assert!(vwap <= best);
                prop_assert!(vwap >= worst);
            } else {
                prop_assert_eq!(vwap, Price::ZERO);
            }
        }
    }
}
