//! Triangular arbitrage over configured symbol triples on a single venue.
//!
//! A path `(ab, bc, ca)` is three markets forming a cycle, e.g.
//! `BTC/USDT -> ETH/BTC -> ETH/USDT`: buy B with A, buy C with B, sell C
//! back into A. The round-trip yield multiplies the three crossings; the
//! reported edge is gross of fees, which are a layer above the core.

use parking_lot::Mutex;

use xmm_book::ConsolidatedBookManager;
use xmm_core::types::{ExchangeId, Price, Quantity, Side, Symbol, Timestamp};

/// Thresholds for the triangular scanner.
#[derive(Debug, Clone)]
pub struct TriangularConfig {
    /// Minimum round-trip edge in basis points, gross of fees.
    pub min_profit_bps: f64,
    /// Minimum executable size of the first leg (0 = no floor).
    pub min_quantity: Quantity,
    /// Opportunities older than this are stale.
    pub max_age_ns: u64,
}

impl Default for TriangularConfig {
    fn default() -> Self {
        Self {
            min_profit_bps: 10.0,
            min_quantity: Quantity::ZERO,
            max_age_ns: 50_000_000,
        }
    }
}

/// A detected three-leg cycle on one venue.
#[derive(Debug, Clone, Copy)]
pub struct TriangularOpportunity {
    pub symbol_ab: Symbol,
    pub symbol_bc: Symbol,
    pub symbol_ca: Symbol,
    pub exchange: ExchangeId,
    /// Executable size of the first leg, capped by its top of book.
    pub quantity: Quantity,
    /// Round-trip edge in basis points, gross of fees.
    pub profit_bps: f64,
    pub detected_at: Timestamp,
    pub side_ab: Side,
    pub side_bc: Side,
    pub side_ca: Side,
    pub price_ab: Price,
    pub price_bc: Price,
    pub price_ca: Price,
}

/// Callback invoked for each detected cycle.
pub type TriangularCallback = Box<dyn Fn(&TriangularOpportunity) + Send + Sync>;

struct Path {
    ab: Symbol,
    bc: Symbol,
    ca: Symbol,
}

/// Scans configured triples against one venue's books.
pub struct TriangularScanner {
    config: TriangularConfig,
    paths: Vec<Path>,
    callback: Mutex<Option<TriangularCallback>>,
}

impl TriangularScanner {
    pub fn new(config: TriangularConfig) -> Self {
        Self {
            config,
            paths: Vec::new(),
            callback: Mutex::new(None),
        }
    }

    /// Register a cycle `A -> B -> C -> A` as its three market symbols.
    pub fn add_path(&mut self, ab: Symbol, bc: Symbol, ca: Symbol) {
        self.paths.push(Path { ab, bc, ca });
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn set_callback(&self, callback: TriangularCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// Evaluate every configured path against `exchange`'s books and return
    /// the cycles clearing the profit floor.
    pub fn detect(
        &self,
        books: &ConsolidatedBookManager,
        exchange: ExchangeId,
    ) -> Vec<TriangularOpportunity> {
        let mut found = Vec::new();

        for path in &self.paths {
            let Some(opportunity) = self.evaluate_path(path, books, exchange) else {
                continue;
            };
            if opportunity.profit_bps < self.config.min_profit_bps {
                continue;
            }
            if !self.config.min_quantity.is_zero()
                && opportunity.quantity < self.config.min_quantity
            {
                continue;
            }
            if let Some(cb) = self.callback.lock().as_ref() {
                cb(&opportunity);
            }
            found.push(opportunity);
        }
        found
    }

    /// Walk one cycle: buy B with A at the `ab` ask, buy C with B at the
    /// `bc` ask, sell C for A at the `ca` bid. Yield per unit of A is
    /// `(1 / ask_ab) * (1 / ask_bc) * bid_ca`.
    fn evaluate_path(
        &self,
        path: &Path,
        books: &ConsolidatedBookManager,
        exchange: ExchangeId,
    ) -> Option<TriangularOpportunity> {
        let book_ab = books.get(&path.ab)?;
        let book_bc = books.get(&path.bc)?;
        let book_ca = books.get(&path.ca)?;

        let (ask_ab, ask_ab_qty) = book_ab.venue_ask(exchange)?;
        let (ask_bc, _) = book_bc.venue_ask(exchange)?;
        let (bid_ca, _) = book_ca.venue_bid(exchange)?;
        if ask_ab.raw() <= 0 || ask_bc.raw() <= 0 || bid_ca.raw() <= 0 {
            return None;
        }

        let round_trip = (1.0 / ask_ab.to_f64()) * (1.0 / ask_bc.to_f64()) * bid_ca.to_f64();
        let profit_bps = (round_trip - 1.0) * 10_000.0;

        Some(TriangularOpportunity {
            symbol_ab: path.ab,
            symbol_bc: path.bc,
            symbol_ca: path.ca,
            exchange,
            quantity: ask_ab_qty,
            profit_bps,
            detected_at: Timestamp::now(),
            side_ab: Side::Buy,
            side_bc: Side::Buy,
            side_ca: Side::Sell,
            price_ab: ask_ab,
            price_bc: ask_bc,
            price_ca: bid_ca,
        })
    }
}
