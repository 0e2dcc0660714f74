//! Cross-venue market maker.
//!
//! Quotes around the consolidated fair value on each configured venue,
//! skewing per-venue inventory independently, and computes hedge orders
//! that offset a fill on the lowest-latency other venue.

use std::collections::HashMap;

use xmm_book::ConsolidatedBook;
use xmm_core::types::{
    ExchangeId, Order, OrderId, OrderType, Price, Quantity, Side, TimeInForce,
};

use crate::traits::DeclineReason;

/// Parameters for the cross-venue quoter.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CrossVenueParams {
    pub min_spread_bps: f64,
    pub max_spread_bps: f64,
    pub target_spread_bps: f64,

    /// Inventory cap per venue (0 = unlimited).
    pub max_position_per_venue: Quantity,
    /// Net inventory cap across venues (0 = unlimited).
    pub max_total_position: Quantity,

    pub default_order_size: Quantity,
    pub min_order_size: Quantity,
    /// Upper size clamp (0 = unclamped).
    pub max_order_size: Quantity,

    /// Venues to quote on. Empty quotes nowhere.
    pub quote_venues: Vec<ExchangeId>,
    /// Venues eligible for hedging; empty falls back to any active venue.
    pub hedge_venues: Vec<ExchangeId>,
    /// Hedge every fill immediately at full size.
    pub hedge_immediately: bool,

    pub quote_refresh_us: u64,
    pub hedge_timeout_us: u64,
}

impl Default for CrossVenueParams {
    fn default() -> Self {
        Self {
            min_spread_bps: 5.0,
            max_spread_bps: 100.0,
            target_spread_bps: 15.0,
            max_position_per_venue: Quantity::ZERO,
            max_total_position: Quantity::ZERO,
            default_order_size: Quantity::from_f64(0.001),
            min_order_size: Quantity::ZERO,
            max_order_size: Quantity::ZERO,
            quote_venues: Vec::new(),
            hedge_venues: Vec::new(),
            hedge_immediately: true,
            quote_refresh_us: 100_000,
            hedge_timeout_us: 500_000,
        }
    }
}

/// One venue's quoting decision within a round.
#[derive(Debug, Clone, Copy)]
pub struct VenueQuote {
    pub exchange: ExchangeId,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
    pub should_quote: bool,
}

/// A full round of per-venue decisions.
#[derive(Debug, Clone)]
pub struct CrossVenueDecision {
    pub quotes: Vec<VenueQuote>,
    pub reason: Option<DeclineReason>,
}

/// Positions held on each venue, with the derived net.
#[derive(Debug, Clone, Default)]
pub struct CrossVenuePosition {
    positions: HashMap<ExchangeId, Quantity>,
    net: Quantity,
}

impl CrossVenuePosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn venue(&self, exchange: ExchangeId) -> Quantity {
        self.positions.get(&exchange).copied().unwrap_or(Quantity::ZERO)
    }

    pub fn net(&self) -> Quantity {
        self.net
    }

    pub fn set(&mut self, exchange: ExchangeId, quantity: Quantity) {
        self.positions.insert(exchange, quantity);
        self.recalculate();
    }

    pub fn apply_fill(&mut self, exchange: ExchangeId, side: Side, quantity: Quantity) {
        let signed = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };
        let entry = self.positions.entry(exchange).or_insert(Quantity::ZERO);
        *entry = *entry + signed;
        self.recalculate();
    }

    fn recalculate(&mut self) {
        self.net = self
            .positions
            .values()
            .fold(Quantity::ZERO, |acc, q| acc + *q);
    }
}

/// Active quote ids and prices on one venue.
#[derive(Debug, Clone, Copy, Default)]
struct ActiveQuotes {
    bid_id: OrderId,
    ask_id: OrderId,
    bid_price: Price,
    ask_price: Price,
}

/// Quotes the consolidated fair value across venues and hedges fills.
pub struct CrossVenueQuoter {
    params: CrossVenueParams,
    enabled: bool,
    active: HashMap<ExchangeId, ActiveQuotes>,
    /// Observed round-trip latency per venue, nanoseconds.
    latencies: HashMap<ExchangeId, u64>,
    total_quotes: u64,
    total_fills: u64,
    hedge_orders: u64,
}

impl CrossVenueQuoter {
    pub fn new(params: CrossVenueParams) -> Self {
        Self {
            params,
            enabled: false,
            active: HashMap::new(),
            latencies: HashMap::new(),
            total_quotes: 0,
            total_fills: 0,
            hedge_orders: 0,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn update_params(&mut self, params: CrossVenueParams) {
        self.params = params;
    }

    pub fn params(&self) -> &CrossVenueParams {
        &self.params
    }

    /// Record a measured venue latency for hedge-venue selection.
    pub fn record_latency(&mut self, exchange: ExchangeId, latency_ns: u64) {
        self.latencies.insert(exchange, latency_ns);
    }

    /// Produce one decision per configured quote venue around the
    /// consolidated fair value.
    pub fn compute_quotes(
        &mut self,
        book: &ConsolidatedBook,
        position: &CrossVenuePosition,
    ) -> CrossVenueDecision {
        if !self.enabled {
            return CrossVenueDecision {
                quotes: Vec::new(),
                reason: Some(DeclineReason::Disabled),
            };
        }
        let nbbo = book.nbbo();
        if !nbbo.is_valid() {
            return CrossVenueDecision {
                quotes: Vec::new(),
                reason: Some(DeclineReason::InvalidBook),
            };
        }
        let fair_value = nbbo.mid_price();

        let spread_bps = self
            .params
            .target_spread_bps
            .clamp(self.params.min_spread_bps, self.params.max_spread_bps);
        let half_spread =
            Price::from_raw((fair_value.raw() as f64 * spread_bps / 20_000.0) as i64);

        // Net cap closes the growing side on every venue at once.
        let net = position.net();
        let at_net_long = !self.params.max_total_position.is_zero()
            && net >= self.params.max_total_position;
        let at_net_short = !self.params.max_total_position.is_zero()
            && net <= -self.params.max_total_position;

        let mut quotes = Vec::with_capacity(self.params.quote_venues.len());
        for &venue in &self.params.quote_venues {
            let venue_position = position.venue(venue);
            let skew = self.venue_skew(venue_position);
            let skew_adjust = Price::from_raw((half_spread.raw() as f64 * skew) as i64);

            let bid_price = fair_value - half_spread - skew_adjust;
            let ask_price = fair_value + half_spread - skew_adjust;

            let mut bid_size = self.order_size(Side::Buy, venue_position);
            let mut ask_size = self.order_size(Side::Sell, venue_position);
            if at_net_long {
                bid_size = Quantity::ZERO;
            }
            if at_net_short {
                ask_size = Quantity::ZERO;
            }

            let should_quote = bid_price < ask_price
                && (!bid_size.is_zero() || !ask_size.is_zero());
            if should_quote {
                self.total_quotes += 1;
            }
            quotes.push(VenueQuote {
                exchange: venue,
                bid_price,
                ask_price,
                bid_size,
                ask_size,
                should_quote,
            });
        }

        CrossVenueDecision {
            quotes,
            reason: None,
        }
    }

    /// Linear per-venue skew in [-1, 1].
    fn venue_skew(&self, venue_position: Quantity) -> f64 {
        if self.params.max_position_per_venue.is_zero() {
            return 0.0;
        }
        (venue_position.raw() as f64 / self.params.max_position_per_venue.raw() as f64)
            .clamp(-1.0, 1.0)
    }

    fn order_size(&self, side: Side, venue_position: Quantity) -> Quantity {
        let mut size = self.params.default_order_size;
        if !self.params.max_position_per_venue.is_zero() {
            let max = self.params.max_position_per_venue.raw() as f64;
            let ratio = match side {
                Side::Buy if venue_position.is_positive() => {
                    1.0 - venue_position.raw() as f64 / max
                }
                Side::Sell if venue_position.is_negative() => {
                    1.0 + venue_position.raw() as f64 / max
                }
                _ => 1.0,
            };
            size = Quantity::from_raw((size.raw() as f64 * ratio.max(0.0)) as i64);
        }
        size = size.max(self.params.min_order_size);
        if !self.params.max_order_size.is_zero() {
            size = size.min(self.params.max_order_size);
        }
        size
    }

    /// Build the order that offsets a fill: opposite side, full fill size,
    /// on the best hedge venue. Returns `None` when no other venue is
    /// available or hedging is disabled.
    pub fn compute_hedge_order(
        &mut self,
        fill_exchange: ExchangeId,
        fill_side: Side,
        fill_qty: Quantity,
        _fill_price: Price,
        book: &ConsolidatedBook,
    ) -> Option<Order> {
        if !self.params.hedge_immediately || fill_qty.is_zero() {
            return None;
        }
        let hedge_side = fill_side.opposite();
        let venue = self.select_hedge_venue(book, hedge_side, fill_exchange)?;

        // Cross the hedge venue's top of book.
        let price = match hedge_side {
            Side::Buy => book.venue_ask(venue)?.0,
            Side::Sell => book.venue_bid(venue)?.0,
        };

        let mut order = Order::limit(
            book.symbol(),
            venue,
            hedge_side,
            price,
            fill_qty,
            TimeInForce::Ioc,
        );
        order.order_type = OrderType::Ioc;
        self.hedge_orders += 1;
        Some(order)
    }

    /// Lowest-latency candidate among the hedge venues (or any active
    /// venue) that is not the fill venue and has a book to cross.
    fn select_hedge_venue(
        &self,
        book: &ConsolidatedBook,
        hedge_side: Side,
        fill_exchange: ExchangeId,
    ) -> Option<ExchangeId> {
        let candidates: Vec<ExchangeId> = if self.params.hedge_venues.is_empty() {
            book.active_venues()
        } else {
            self.params.hedge_venues.clone()
        };

        candidates
            .into_iter()
            .filter(|&venue| venue != fill_exchange)
            .filter(|&venue| match hedge_side {
                Side::Buy => book.venue_ask(venue).is_some(),
                Side::Sell => book.venue_bid(venue).is_some(),
            })
            .min_by_key(|venue| self.latencies.get(venue).copied().unwrap_or(u64::MAX))
    }

    /// A fill on `exchange`: update tallies and clear the matching active
    /// quote.
    pub fn on_fill(&mut self, exchange: ExchangeId, order_id: OrderId, _fill_qty: Quantity) {
        self.total_fills += 1;
        if let Some(active) = self.active.get_mut(&exchange) {
            if active.bid_id == order_id {
                active.bid_id = OrderId::NONE;
                active.bid_price = Price::ZERO;
            } else if active.ask_id == order_id {
                active.ask_id = OrderId::NONE;
                active.ask_price = Price::ZERO;
            }
        }
    }

    /// A cancel on `exchange`: clear the matching active quote.
    pub fn on_cancel(&mut self, exchange: ExchangeId, order_id: OrderId) {
        if let Some(active) = self.active.get_mut(&exchange) {
            if active.bid_id == order_id {
                active.bid_id = OrderId::NONE;
                active.bid_price = Price::ZERO;
            } else if active.ask_id == order_id {
                active.ask_id = OrderId::NONE;
                active.ask_price = Price::ZERO;
            }
        }
    }

    /// The engine placed a quote on `exchange`.
    pub fn on_quote_placed(
        &mut self,
        exchange: ExchangeId,
        side: Side,
        order_id: OrderId,
        price: Price,
    ) {
        let active = self.active.entry(exchange).or_default();
        match side {
            Side::Buy => {
                active.bid_id = order_id;
                active.bid_price = price;
            }
            Side::Sell => {
                active.ask_id = order_id;
                active.ask_price = price;
            }
        }
    }

    pub fn total_quotes(&self) -> u64 {
        self.total_quotes
    }

    pub fn total_fills(&self) -> u64 {
        self.total_fills
    }

    pub fn hedge_orders(&self) -> u64 {
        self.hedge_orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmm_core::types::Symbol;

    fn px(v: f64) -> Price {
        Price::from_f64(v)
    }

    fn qty(v: f64) -> Quantity {
        Quantity::from_f64(v)
    }

    fn two_venue_book() -> ConsolidatedBook {
        let book = ConsolidatedBook::new(Symbol::new("BTCUSDT"));
        book.update_bid(ExchangeId::Binance, px(99.5), qty(1.0));
        book.update_ask(ExchangeId::Binance, px(100.5), qty(1.0));
        book.update_bid(ExchangeId::Bybit, px(99.4), qty(2.0));
        book.update_ask(ExchangeId::Bybit, px(100.6), qty(2.0));
        book
    }

    fn make_quoter() -> CrossVenueQuoter {
        let mut quoter = CrossVenueQuoter::new(CrossVenueParams {
            quote_venues: vec![ExchangeId::Binance, ExchangeId::Bybit],
            max_position_per_venue: qty(10.0),
            max_total_position: qty(15.0),
            default_order_size: qty(1.0),
            ..CrossVenueParams::default()
        });
        quoter.set_enabled(true);
        quoter
    }

    #[test]
    fn test_quotes_every_configured_venue() {
        let mut quoter = make_quoter();
        let book = two_venue_book();
        let decision = quoter.compute_quotes(&book, &CrossVenuePosition::new());

        assert!(decision.reason.is_none());
        assert_eq!(decision.quotes.len(), 2);
        for quote in &decision.quotes {
            assert!(quote.should_quote);
            assert!(quote.bid_price < quote.ask_price);
            assert_eq!(quote.bid_size, qty(1.0));
            assert_eq!(quote.ask_size, qty(1.0));
        }
        assert_eq!(quoter.total_quotes(), 2);
    }

    #[test]
    fn test_disabled_and_invalid_book() {
        let mut quoter = make_quoter();
        quoter.set_enabled(false);
        let book = two_venue_book();
        let decision = quoter.compute_quotes(&book, &CrossVenuePosition::new());
        assert_eq!(decision.reason, Some(DeclineReason::Disabled));

        quoter.set_enabled(true);
        let empty = ConsolidatedBook::new(Symbol::new("BTCUSDT"));
        let decision = quoter.compute_quotes(&empty, &CrossVenuePosition::new());
        assert_eq!(decision.reason, Some(DeclineReason::InvalidBook));
    }

    #[test]
    fn test_per_venue_skew_independent() {
        let mut quoter = make_quoter();
        let book = two_venue_book();
        let mut position = CrossVenuePosition::new();
        position.set(ExchangeId::Binance, qty(5.0));

        let decision = quoter.compute_quotes(&book, &position);
        let binance = decision.quotes.iter().find(|q| q.exchange == ExchangeId::Binance).unwrap();
        let bybit = decision.quotes.iter().find(|q| q.exchange == ExchangeId::Bybit).unwrap();

        // Long on Binance skews its quotes down; Bybit is untouched.
        assert!(binance.bid_price < bybit.bid_price);
        assert!(binance.ask_price < bybit.ask_price);
        assert!(binance.bid_size < bybit.bid_size);
    }

    #[test]
    fn test_net_cap_starves_growing_side_everywhere() {
        let mut quoter = make_quoter();
        let book = two_venue_book();
        let mut position = CrossVenuePosition::new();
        position.set(ExchangeId::Binance, qty(8.0));
        position.set(ExchangeId::Bybit, qty(7.0));
        assert_eq!(position.net(), qty(15.0));

        let decision = quoter.compute_quotes(&book, &position);
        for quote in &decision.quotes {
            assert!(quote.bid_size.is_zero(), "net cap must stop buying");
            assert!(!quote.ask_size.is_zero());
        }
    }

    #[test]
    fn test_position_tracking() {
        let mut position = CrossVenuePosition::new();
        position.apply_fill(ExchangeId::Binance, Side::Buy, qty(2.0));
        position.apply_fill(ExchangeId::Bybit, Side::Sell, qty(0.5));

        assert_eq!(position.venue(ExchangeId::Binance), qty(2.0));
        assert_eq!(position.venue(ExchangeId::Bybit), qty(-0.5));
        assert_eq!(position.venue(ExchangeId::Okx), Quantity::ZERO);
        assert_eq!(position.net(), qty(1.5));
    }

    #[test]
    fn test_hedge_selects_lowest_latency_peer() {
        let mut quoter = make_quoter();
        let book = two_venue_book();
        book.update_bid(ExchangeId::Okx, px(99.3), qty(1.0));
        book.update_ask(ExchangeId::Okx, px(100.7), qty(1.0));

        quoter.record_latency(ExchangeId::Binance, 1_000);
        quoter.record_latency(ExchangeId::Bybit, 9_000);
        quoter.record_latency(ExchangeId::Okx, 3_000);

        // Fill was a buy on Binance: hedge sells elsewhere, preferring the
        // faster of Bybit/Okx.
        let hedge = quoter
            .compute_hedge_order(ExchangeId::Binance, Side::Buy, qty(0.5), px(99.5), &book)
            .unwrap();
        assert_eq!(hedge.side, Side::Sell);
        assert_eq!(hedge.exchange, ExchangeId::Okx);
        assert_eq!(hedge.quantity, qty(0.5));
        // Sell hedge crosses Okx's best bid.
        assert_eq!(hedge.price, px(99.3));
        assert_eq!(hedge.tif, TimeInForce::Ioc);
        assert_eq!(quoter.hedge_orders(), 1);
    }

    #[test]
    fn test_hedge_respects_configured_venues() {
        let mut quoter = make_quoter();
        quoter.update_params(CrossVenueParams {
            quote_venues: vec![ExchangeId::Binance],
            hedge_venues: vec![ExchangeId::Bybit],
            default_order_size: qty(1.0),
            ..CrossVenueParams::default()
        });
        let book = two_venue_book();

        let hedge = quoter
            .compute_hedge_order(ExchangeId::Binance, Side::Sell, qty(1.0), px(100.5), &book)
            .unwrap();
        assert_eq!(hedge.exchange, ExchangeId::Bybit);
        assert_eq!(hedge.side, Side::Buy);
        // Buy hedge crosses Bybit's best ask.
        assert_eq!(hedge.price, px(100.6));
    }

    #[test]
    fn test_hedge_never_uses_fill_venue() {
        let mut quoter = make_quoter();
        let book = ConsolidatedBook::new(Symbol::new("BTCUSDT"));
        book.update_bid(ExchangeId::Binance, px(99.5), qty(1.0));
        book.update_ask(ExchangeId::Binance, px(100.5), qty(1.0));

        // Only the fill venue is active: no hedge possible.
        let hedge =
            quoter.compute_hedge_order(ExchangeId::Binance, Side::Buy, qty(1.0), px(100.5), &book);
        assert!(hedge.is_none());
    }

    #[test]
    fn test_hedge_disabled() {
        let mut quoter = make_quoter();
        quoter.update_params(CrossVenueParams {
            hedge_immediately: false,
            quote_venues: vec![ExchangeId::Binance],
            ..CrossVenueParams::default()
        });
        let book = two_venue_book();
        let hedge =
            quoter.compute_hedge_order(ExchangeId::Binance, Side::Buy, qty(1.0), px(100.5), &book);
        assert!(hedge.is_none());
    }

    #[test]
    fn test_fill_and_cancel_clear_active_quotes() {
        let mut quoter = make_quoter();
        quoter.on_quote_placed(ExchangeId::Binance, Side::Buy, OrderId(1), px(99.0));
        quoter.on_quote_placed(ExchangeId::Binance, Side::Sell, OrderId(2), px(101.0));

        quoter.on_fill(ExchangeId::Binance, OrderId(1), qty(1.0));
        assert_eq!(quoter.total_fills(), 1);
        assert!(quoter.active[&ExchangeId::Binance].bid_id.is_none());
        assert_eq!(quoter.active[&ExchangeId::Binance].ask_id, OrderId(2));

        quoter.on_cancel(ExchangeId::Binance, OrderId(2));
        assert!(quoter.active[&ExchangeId::Binance].ask_id.is_none());
    }
}
