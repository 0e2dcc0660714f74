//! Multi-venue consolidated book with NBBO and per-level attribution.
//!
//! Each venue feeds a small [`ExchangeBook`]; the consolidated bid/ask
//! ladders and the NBBO are rebuilt lazily on the first read after a
//! mutation and memoized until the next one. One mutex guards the whole
//! structure: updates are infrequent relative to the tick path and readers
//! take consistent snapshots.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use xmm_core::types::{
    ExchangeId, Price, Quantity, Symbol, Tick, Timestamp, MAX_VENUES,
};

/// Consolidated levels retained per side on rebuild.
const CONSOLIDATED_DEPTH: usize = 50;

/// One venue's contribution to a consolidated level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Contribution {
    pub exchange: ExchangeId,
    pub quantity: Quantity,
    pub last_update: Timestamp,
}

/// A price with the venues resting at it. The total always equals the sum
/// of the contributions; zero-quantity contributions are never stored.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConsolidatedLevel {
    pub price: Price,
    pub total_quantity: Quantity,
    pub contributions: Vec<Contribution>,
}

impl ConsolidatedLevel {
    /// Quantity a single venue contributes at this price.
    pub fn venue_quantity(&self, exchange: ExchangeId) -> Quantity {
        self.contributions
            .iter()
            .find(|c| c.exchange == exchange)
            .map(|c| c.quantity)
            .unwrap_or(Quantity::ZERO)
    }
}

/// Best bid and offer across all venues, with attribution.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct Nbbo {
    pub best_bid: Price,
    pub best_ask: Price,
    pub best_bid_qty: Quantity,
    pub best_ask_qty: Quantity,
    pub bid_exchange: Option<ExchangeId>,
    pub ask_exchange: Option<ExchangeId>,
    pub timestamp: Timestamp,
}

impl Nbbo {
    #[inline]
    pub fn spread(&self) -> Price {
        self.best_ask - self.best_bid
    }

    /// Spread in basis points of the mid; negative when the NBBO is crossed.
    pub fn spread_bps(&self) -> f64 {
        let mid = Price::midpoint(self.best_bid, self.best_ask);
        if mid.is_zero() {
            return 0.0;
        }
        10_000.0 * self.spread().raw() as f64 / mid.raw() as f64
    }

    #[inline]
    pub fn mid_price(&self) -> Price {
        Price::midpoint(self.best_bid, self.best_ask)
    }

    /// Valid when both sides are present and not crossed. A crossed NBBO is
    /// not an error: it is an arbitrage candidate.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.best_bid.raw() > 0 && self.best_ask.raw() > 0 && self.best_bid < self.best_ask
    }
}

/// A cross-venue price dislocation: buy on one venue, sell on another.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ArbitrageOpportunity {
    pub symbol: Symbol,
    pub buy_exchange: ExchangeId,
    pub sell_exchange: ExchangeId,
    pub buy_price: Price,
    pub sell_price: Price,
    /// Conservative size: the lesser of the two top-of-book quantities.
    pub quantity: Quantity,
    /// Gross edge in basis points of the buy price.
    pub profit_bps: f64,
    pub detected_at: Timestamp,
}

/// One venue's book inside the consolidated view.
#[derive(Debug, Default)]
pub struct ExchangeBook {
    /// Bid levels, highest first.
    pub bids: BTreeMap<Reverse<Price>, Quantity>,
    /// Ask levels, lowest first.
    pub asks: BTreeMap<Price, Quantity>,
    pub last_update: Timestamp,
    pub sequence: u64,
}

impl ExchangeBook {
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids.iter().next().map(|(Reverse(p), q)| (*p, *q))
    }

    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks.iter().next().map(|(p, q)| (*p, *q))
    }

    fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    fn imbalance(&self, levels: usize) -> f64 {
        let bid_vol: i64 = self.bids.values().take(levels).map(|q| q.raw()).sum();
        let ask_vol: i64 = self.asks.values().take(levels).map(|q| q.raw()).sum();
        let total = bid_vol + ask_vol;
        if total == 0 {
            0.0
        } else {
            (bid_vol - ask_vol) as f64 / total as f64
        }
    }
}

struct Inner {
    books: [ExchangeBook; MAX_VENUES],
    active: [bool; MAX_VENUES],
    bids: Vec<ConsolidatedLevel>,
    asks: Vec<ConsolidatedLevel>,
    nbbo: Nbbo,
    dirty: bool,
    last_update: Timestamp,
}

impl Inner {
    fn rebuild_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }

        let mut bids: BTreeMap<Reverse<Price>, ConsolidatedLevel> = BTreeMap::new();
        let mut asks: BTreeMap<Price, ConsolidatedLevel> = BTreeMap::new();

        for index in 0..MAX_VENUES {
            if !self.active[index] {
                continue;
            }
            let exchange = match venue_from_index(index) {
                Some(ex) => ex,
                None => continue,
            };
            let book = &self.books[index];
            for (Reverse(price), qty) in book.bids.iter().take(CONSOLIDATED_DEPTH) {
                merge_contribution(
                    bids.entry(Reverse(*price)).or_insert_with(|| empty_level(*price)),
                    exchange,
                    *qty,
                    book.last_update,
                );
            }
            for (price, qty) in book.asks.iter().take(CONSOLIDATED_DEPTH) {
                merge_contribution(
                    asks.entry(*price).or_insert_with(|| empty_level(*price)),
                    exchange,
                    *qty,
                    book.last_update,
                );
            }
        }

        self.bids = bids.into_values().take(CONSOLIDATED_DEPTH).collect();
        self.asks = asks.into_values().take(CONSOLIDATED_DEPTH).collect();

        let mut nbbo = Nbbo {
            timestamp: Timestamp::now(),
            ..Nbbo::default()
        };
        if let Some(level) = self.bids.first() {
            let top = level
                .contributions
                .iter()
                .max_by_key(|c| c.quantity)
                .expect("consolidated level has a contribution");
            nbbo.best_bid = level.price;
            nbbo.best_bid_qty = level.total_quantity;
            nbbo.bid_exchange = Some(top.exchange);
        }
        if let Some(level) = self.asks.first() {
            let top = level
                .contributions
                .iter()
                .max_by_key(|c| c.quantity)
                .expect("consolidated level has a contribution");
            nbbo.best_ask = level.price;
            nbbo.best_ask_qty = level.total_quantity;
            nbbo.ask_exchange = Some(top.exchange);
        }
        self.nbbo = nbbo;
        self.dirty = false;
    }
}

fn empty_level(price: Price) -> ConsolidatedLevel {
    ConsolidatedLevel {
        price,
        total_quantity: Quantity::ZERO,
        contributions: Vec::new(),
    }
}

fn merge_contribution(
    level: &mut ConsolidatedLevel,
    exchange: ExchangeId,
    qty: Quantity,
    ts: Timestamp,
) {
    if qty.is_zero() {
        return;
    }
    level.total_quantity = level.total_quantity + qty;
    level.contributions.push(Contribution {
        exchange,
        quantity: qty,
        last_update: ts,
    });
}

fn venue_from_index(index: usize) -> Option<ExchangeId> {
    ExchangeId::ALL.into_iter().find(|ex| ex.index() == index)
}

/// Consolidated multi-venue book for a single symbol.
///
/// All methods take `&self`; an internal mutex serializes mutation and
/// rebuild, so every reader observes a consistent snapshot of the latest
/// per-venue states.
pub struct ConsolidatedBook {
    symbol: Symbol,
    inner: Mutex<Inner>,
}

impl ConsolidatedBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            inner: Mutex::new(Inner {
                books: Default::default(),
                active: [false; MAX_VENUES],
                bids: Vec::new(),
                asks: Vec::new(),
                nbbo: Nbbo::default(),
                dirty: true,
                last_update: Timestamp::ZERO,
            }),
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    // ── Per-venue updates ──────────────────────────────────────────────

    /// Set or erase one venue's bid level. Zero quantity erases.
    pub fn update_bid(&self, exchange: ExchangeId, price: Price, qty: Quantity) {
        let mut inner = self.inner.lock();
        let book = &mut inner.books[exchange.index()];
        if qty.is_zero() {
            book.bids.remove(&Reverse(price));
        } else {
            book.bids.insert(Reverse(price), qty);
        }
        book.last_update = Timestamp::now();
        Self::mark_dirty(&mut inner, exchange);
    }

    /// Set or erase one venue's ask level. Zero quantity erases.
    pub fn update_ask(&self, exchange: ExchangeId, price: Price, qty: Quantity) {
        let mut inner = self.inner.lock();
        let book = &mut inner.books[exchange.index()];
        if qty.is_zero() {
            book.asks.remove(&price);
        } else {
            book.asks.insert(price, qty);
        }
        book.last_update = Timestamp::now();
        Self::mark_dirty(&mut inner, exchange);
    }

    /// Replace one venue's book from a snapshot.
    pub fn apply_snapshot(
        &self,
        exchange: ExchangeId,
        bids: &[(Price, Quantity)],
        asks: &[(Price, Quantity)],
    ) {
        let mut inner = self.inner.lock();
        let book = &mut inner.books[exchange.index()];
        book.bids.clear();
        book.asks.clear();
        for &(price, qty) in bids {
            if !qty.is_zero() {
                book.bids.insert(Reverse(price), qty);
            }
        }
        for &(price, qty) in asks {
            if !qty.is_zero() {
                book.asks.insert(price, qty);
            }
        }
        book.sequence = 0;
        book.last_update = Timestamp::now();
        Self::mark_dirty(&mut inner, exchange);
    }

    /// Replace one venue's book with a top-of-book tick.
    pub fn apply_tick(&self, tick: &Tick) {
        let mut inner = self.inner.lock();
        let book = &mut inner.books[tick.exchange.index()];
        book.bids.clear();
        book.asks.clear();
        if tick.bid.is_positive() && !tick.bid_qty.is_zero() {
            book.bids.insert(Reverse(tick.bid), tick.bid_qty);
        }
        if tick.ask.is_positive() && !tick.ask_qty.is_zero() {
            book.asks.insert(tick.ask, tick.ask_qty);
        }
        book.sequence = tick.sequence;
        book.last_update = tick.local_ts;
        Self::mark_dirty(&mut inner, tick.exchange);
    }

    /// Drop a venue from the consolidated view (e.g. on disconnect).
    pub fn clear_venue(&self, exchange: ExchangeId) {
        let mut inner = self.inner.lock();
        inner.books[exchange.index()] = ExchangeBook::default();
        inner.active[exchange.index()] = false;
        inner.dirty = true;
        inner.last_update = Timestamp::now();
        tracing::debug!(symbol = %self.symbol, venue = %exchange, "venue cleared from consolidated book");
    }

    fn mark_dirty(inner: &mut Inner, exchange: ExchangeId) {
        inner.active[exchange.index()] = !inner.books[exchange.index()].is_empty();
        inner.dirty = true;
        inner.last_update = Timestamp::now();
    }

    // ── Consolidated reads ─────────────────────────────────────────────

    /// Best bid and offer across venues, rebuilding lazily when dirty.
    pub fn nbbo(&self) -> Nbbo {
        let mut inner = self.inner.lock();
        inner.rebuild_if_dirty();
        inner.nbbo
    }

    /// Consolidated bid level at `depth` (0 = best).
    pub fn consolidated_bid(&self, depth: usize) -> Option<ConsolidatedLevel> {
        let mut inner = self.inner.lock();
        inner.rebuild_if_dirty();
        inner.bids.get(depth).cloned()
    }

    /// Consolidated ask level at `depth` (0 = best).
    pub fn consolidated_ask(&self, depth: usize) -> Option<ConsolidatedLevel> {
        let mut inner = self.inner.lock();
        inner.rebuild_if_dirty();
        inner.asks.get(depth).cloned()
    }

    /// One venue's best bid.
    pub fn venue_bid(&self, exchange: ExchangeId) -> Option<(Price, Quantity)> {
        self.inner.lock().books[exchange.index()].best_bid()
    }

    /// One venue's best ask.
    pub fn venue_ask(&self, exchange: ExchangeId) -> Option<(Price, Quantity)> {
        self.inner.lock().books[exchange.index()].best_ask()
    }

    /// Venues currently contributing at least one level.
    pub fn active_venues(&self) -> Vec<ExchangeId> {
        let inner = self.inner.lock();
        ExchangeId::ALL
            .into_iter()
            .filter(|ex| inner.active[ex.index()])
            .collect()
    }

    pub fn active_venue_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.active.iter().filter(|a| **a).count()
    }

    pub fn last_update(&self) -> Timestamp {
        self.inner.lock().last_update
    }

    // ── Cross-venue analytics ──────────────────────────────────────────

    /// `true` when some venue's best bid exceeds another venue's best ask.
    pub fn has_arbitrage_opportunity(&self) -> bool {
        self.find_arbitrage().is_some()
    }

    /// The widest cross-venue dislocation, if any: buy where the ask is
    /// lowest, sell where the bid is highest, sized conservatively to the
    /// lesser top-of-book quantity.
    pub fn find_arbitrage(&self) -> Option<ArbitrageOpportunity> {
        let inner = self.inner.lock();
        let mut best: Option<ArbitrageOpportunity> = None;

        for sell_ex in ExchangeId::ALL {
            if !inner.active[sell_ex.index()] {
                continue;
            }
            let (bid, bid_qty) = match inner.books[sell_ex.index()].best_bid() {
                Some(b) => b,
                None => continue,
            };
            for buy_ex in ExchangeId::ALL {
                if buy_ex == sell_ex || !inner.active[buy_ex.index()] {
                    continue;
                }
                let (ask, ask_qty) = match inner.books[buy_ex.index()].best_ask() {
                    Some(a) => a,
                    None => continue,
                };
                if bid <= ask || ask.raw() <= 0 {
                    continue;
                }
                let profit_bps = 10_000.0 * (bid - ask).raw() as f64 / ask.raw() as f64;
                let candidate = ArbitrageOpportunity {
                    symbol: self.symbol,
                    buy_exchange: buy_ex,
                    sell_exchange: sell_ex,
                    buy_price: ask,
                    sell_price: bid,
                    quantity: ask_qty.min(bid_qty),
                    profit_bps,
                    detected_at: Timestamp::now(),
                };
                if best
                    .as_ref()
                    .map_or(true, |b| candidate.profit_bps > b.profit_bps)
                {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// NBBO spread in bps; negative when venues cross each other.
    pub fn cross_venue_spread_bps(&self) -> f64 {
        self.nbbo().spread_bps()
    }

    /// Volume-weighted average bid over the consolidated ladder.
    pub fn vwap_bid(&self, qty: Quantity) -> Price {
        let mut inner = self.inner.lock();
        inner.rebuild_if_dirty();
        consolidated_vwap(&inner.bids, qty)
    }

    /// Volume-weighted average ask over the consolidated ladder.
    pub fn vwap_ask(&self, qty: Quantity) -> Price {
        let mut inner = self.inner.lock();
        inner.rebuild_if_dirty();
        consolidated_vwap(&inner.asks, qty)
    }

    /// Imbalance over the top `levels` of the consolidated ladders.
    pub fn imbalance(&self, levels: usize) -> f64 {
        let mut inner = self.inner.lock();
        inner.rebuild_if_dirty();
        let bid_vol: i64 = inner.bids.iter().take(levels).map(|l| l.total_quantity.raw()).sum();
        let ask_vol: i64 = inner.asks.iter().take(levels).map(|l| l.total_quantity.raw()).sum();
        let total = bid_vol + ask_vol;
        if total == 0 {
            0.0
        } else {
            (bid_vol - ask_vol) as f64 / total as f64
        }
    }

    /// Per-venue top-of-book imbalance over `levels` depth.
    pub fn per_venue_imbalance(&self, levels: usize) -> Vec<(ExchangeId, f64)> {
        let inner = self.inner.lock();
        ExchangeId::ALL
            .into_iter()
            .filter(|ex| inner.active[ex.index()])
            .map(|ex| (ex, inner.books[ex.index()].imbalance(levels)))
            .collect()
    }
}

fn consolidated_vwap(levels: &[ConsolidatedLevel], qty: Quantity) -> Price {
    let mut remaining = qty;
    let mut total_value: i128 = 0;
    let mut total_qty: i128 = 0;
    for level in levels {
        if !remaining.is_positive() {
            break;
        }
        let fill = remaining.min(level.total_quantity);
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

/// Consolidated books for many symbols.
pub struct ConsolidatedBookManager {
    books: DashMap<Symbol, Arc<ConsolidatedBook>>,
}

impl ConsolidatedBookManager {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, symbol: Symbol) -> Arc<ConsolidatedBook> {
        self.books
            .entry(symbol)
            .or_insert_with(|| Arc::new(ConsolidatedBook::new(symbol)))
            .clone()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Arc<ConsolidatedBook>> {
        self.books.get(symbol).map(|b| b.clone())
    }

    /// Route a tick into the owning symbol's book, creating it on first
    /// sight.
    pub fn update(&self, symbol: Symbol, tick: &Tick) {
        self.get_or_create(symbol).apply_tick(tick);
    }

    /// Best dislocation per symbol, across all books.
    pub fn find_all_arbitrage(&self) -> Vec<ArbitrageOpportunity> {
        self.books
            .iter()
            .filter_map(|entry| entry.value().find_arbitrage())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn clear(&self) {
        self.books.clear();
    }
}

impl Default for ConsolidatedBookManager {
    fn default() -> Self {
        Self::new()
    }
}
