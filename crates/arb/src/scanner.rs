//! Cross-venue arbitrage scanner.
//!
//! After each consolidated book update the scanner sweeps every venue pair
//! for `best_bid(A) > best_ask(B)`, builds candidates sized to the thinner
//! top of book, validates them against the configured thresholds, and emits
//! survivors through the registered callback.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use xmm_book::{ArbitrageOpportunity, ConsolidatedBook};
use xmm_core::types::{ExchangeId, Quantity, Timestamp};

/// Scanner thresholds.
#[derive(Debug, Clone)]
pub struct ArbConfig {
    /// Minimum gross edge in basis points.
    pub min_profit_bps: f64,
    /// Slippage allowance subtracted by execution layers, carried for them.
    pub max_slippage_bps: f64,
    /// Minimum executable size (0 = no floor).
    pub min_quantity: Quantity,
    /// Cap applied to the candidate size (0 = uncapped).
    pub max_quantity: Quantity,
    /// Candidates older than this are stale.
    pub max_opportunity_age_ns: u64,
    /// Require the candidate to fill a fraction of the desired size.
    pub require_both_sides_liquid: bool,
    /// Fraction of `max_quantity` both sides must cover.
    pub min_liquidity_ratio: f64,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            min_profit_bps: 5.0,
            max_slippage_bps: 2.0,
            min_quantity: Quantity::ZERO,
            max_quantity: Quantity::ZERO,
            max_opportunity_age_ns: 100_000_000,
            require_both_sides_liquid: true,
            min_liquidity_ratio: 0.5,
        }
    }
}

/// Callback invoked for each validated opportunity.
pub type OpportunityCallback = Box<dyn Fn(&ArbitrageOpportunity) + Send + Sync>;

/// Detects cross-venue dislocations on the consolidated book.
pub struct ArbScanner {
    config: RwLock<ArbConfig>,
    callback: Mutex<Option<OpportunityCallback>>,
    detected: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
}

impl ArbScanner {
    pub fn new(config: ArbConfig) -> Self {
        Self {
            config: RwLock::new(config),
            callback: Mutex::new(None),
            detected: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Register the emission callback. Must happen before the feeding
    /// thread starts.
    pub fn set_opportunity_callback(&self, callback: OpportunityCallback) {
        *self.callback.lock() = Some(callback);
    }

    pub fn update_config(&self, config: ArbConfig) {
        *self.config.write() = config;
    }

    pub fn config(&self) -> ArbConfig {
        self.config.read().clone()
    }

    /// Sweep all venue pairs and return the validated candidates.
    pub fn detect(&self, book: &ConsolidatedBook) -> Vec<ArbitrageOpportunity> {
        let config = self.config.read().clone();
        let venues = book.active_venues();
        let mut found = Vec::new();

        for &sell_venue in &venues {
            let (bid, bid_qty) = match book.venue_bid(sell_venue) {
                Some(b) => b,
                None => continue,
            };
            for &buy_venue in &venues {
                if buy_venue == sell_venue {
                    continue;
                }
                let (ask, ask_qty) = match book.venue_ask(buy_venue) {
                    Some(a) => a,
                    None => continue,
                };
                if bid <= ask || ask.raw() <= 0 {
                    continue;
                }

                let mut quantity = bid_qty.min(ask_qty);
                if !config.max_quantity.is_zero() {
                    quantity = quantity.min(config.max_quantity);
                }
                let candidate = ArbitrageOpportunity {
                    symbol: book.symbol(),
                    buy_exchange: buy_venue,
                    sell_exchange: sell_venue,
                    buy_price: ask,
                    sell_price: bid,
                    quantity,
                    profit_bps: 10_000.0 * (bid - ask).raw() as f64 / ask.raw() as f64,
                    detected_at: Timestamp::now(),
                };
                if self.validate(&candidate, &config) {
                    found.push(candidate);
                }
            }
        }
        found
    }

    /// The single most profitable validated candidate.
    pub fn find_best_opportunity(&self, book: &ConsolidatedBook) -> Option<ArbitrageOpportunity> {
        self.detect(book)
            .into_iter()
            .max_by(|a, b| a.profit_bps.total_cmp(&b.profit_bps))
    }

    /// Run detection after a book update and emit each validated
    /// opportunity through the callback.
    pub fn on_book_update(&self, book: &ConsolidatedBook) {
        let opportunities = self.detect(book);
        if opportunities.is_empty() {
            return;
        }
        self.detected
            .fetch_add(opportunities.len() as u64, Ordering::Relaxed);

        let callback = self.callback.lock();
        for opportunity in &opportunities {
            tracing::debug!(
                symbol = %opportunity.symbol,
                buy = %opportunity.buy_exchange,
                sell = %opportunity.sell_exchange,
                profit_bps = opportunity.profit_bps,
                qty = %opportunity.quantity,
                "arbitrage opportunity"
            );
            if let Some(cb) = callback.as_ref() {
                cb(opportunity);
            }
        }
    }

    fn validate(&self, opportunity: &ArbitrageOpportunity, config: &ArbConfig) -> bool {
        if opportunity.profit_bps < config.min_profit_bps {
            return false;
        }
        if !config.min_quantity.is_zero() && opportunity.quantity < config.min_quantity {
            return false;
        }
        if config.require_both_sides_liquid && !config.max_quantity.is_zero() {
            let desired = config.max_quantity.raw() as f64;
            if (opportunity.quantity.raw() as f64) < config.min_liquidity_ratio * desired {
                return false;
            }
        }
        let age = Timestamp::now().nanos_since(opportunity.detected_at);
        if age > config.max_opportunity_age_ns {
            return false;
        }
        true
    }

    /// Record an execution attempt driven from a detected opportunity.
    pub fn record_execution(&self, success: bool) {
        if success {
            self.executed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn opportunities_detected(&self) -> u64 {
        self.detected.load(Ordering::Relaxed)
    }

    pub fn opportunities_executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn executions_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use xmm_core::types::{Price, Symbol};

    fn px(v: f64) -> Price {
        Price::from_f64(v)
    }

    fn qty(v: f64) -> Quantity {
        Quantity::from_f64(v)
    }

    fn open_config() -> ArbConfig {
        ArbConfig {
            min_profit_bps: 5.0,
            min_quantity: Quantity::ZERO,
            max_quantity: Quantity::ZERO,
            require_both_sides_liquid: false,
            ..ArbConfig::default()
        }
    }

    /// A bid 101 qty 1, B ask 100 qty 2 -> buy on B, sell on
    /// A, qty 1, 100 bps.
    fn dislocated_book() -> ConsolidatedBook {
        let book = ConsolidatedBook::new(Symbol::new("BTCUSDT"));
        book.update_bid(ExchangeId::Binance, px(101.0), qty(1.0));
        book.update_ask(ExchangeId::Binance, px(101.5), qty(1.0));
        book.update_bid(ExchangeId::Bybit, px(99.0), qty(2.0));
        book.update_ask(ExchangeId::Bybit, px(100.0), qty(2.0));
        book
    }

    #[test]
    fn test_detects_dislocation() {
        let scanner = ArbScanner::new(open_config());
        let book = dislocated_book();
        let found = scanner.detect(&book);

        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.buy_exchange, ExchangeId::Bybit);
        assert_eq!(opp.sell_exchange, ExchangeId::Binance);
        assert_eq!(opp.buy_price, px(100.0));
        assert_eq!(opp.sell_price, px(101.0));
        assert_eq!(opp.quantity, qty(1.0));
        assert!((opp.profit_bps - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_candidates_on_aligned_book() {
        let scanner = ArbScanner::new(open_config());
        let book = ConsolidatedBook::new(Symbol::new("BTCUSDT"));
        book.update_bid(ExchangeId::Binance, px(100.0), qty(1.0));
        book.update_ask(ExchangeId::Binance, px(100.5), qty(1.0));
        book.update_bid(ExchangeId::Bybit, px(100.1), qty(1.0));
        book.update_ask(ExchangeId::Bybit, px(100.4), qty(1.0));

        assert!(scanner.detect(&book).is_empty());
        assert!(scanner.find_best_opportunity(&book).is_none());
    }

    #[test]
    fn test_min_profit_filter() {
        let mut config = open_config();
        config.min_profit_bps = 150.0;
        let scanner = ArbScanner::new(config);
        // 100 bps of edge falls below the 150 bps floor.
        assert!(scanner.detect(&dislocated_book()).is_empty());
    }

    #[test]
    fn test_min_quantity_filter() {
        let mut config = open_config();
        config.min_quantity = qty(1.5);
        let scanner = ArbScanner::new(config);
        // Candidate size is min(1, 2) = 1 < 1.5.
        assert!(scanner.detect(&dislocated_book()).is_empty());
    }

    #[test]
    fn test_max_quantity_caps_size() {
        let mut config = open_config();
        config.max_quantity = qty(0.25);
        let scanner = ArbScanner::new(config);
        let found = scanner.detect(&dislocated_book());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].quantity, qty(0.25));
    }

    #[test]
    fn test_liquidity_ratio_filter() {
        let mut config = open_config();
        config.require_both_sides_liquid = true;
        config.max_quantity = qty(4.0);
        config.min_liquidity_ratio = 0.5;
        let scanner = ArbScanner::new(config);
        // Available 1 < 0.5 * desired 4.
        assert!(scanner.detect(&dislocated_book()).is_empty());

        let mut config = open_config();
        config.require_both_sides_liquid = true;
        config.max_quantity = qty(2.0);
        config.min_liquidity_ratio = 0.5;
        let scanner = ArbScanner::new(config);
        // Available 1 >= 0.5 * desired 2.
        assert_eq!(scanner.detect(&dislocated_book()).len(), 1);
    }

    #[test]
    fn test_callback_and_counters() {
        let scanner = ArbScanner::new(open_config());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        scanner.set_opportunity_callback(Box::new(move |opp| {
            assert!(opp.profit_bps > 0.0);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let book = dislocated_book();
        scanner.on_book_update(&book);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.opportunities_detected(), 1);

        // An aligned book emits nothing further.
        let aligned = ConsolidatedBook::new(Symbol::new("BTCUSDT"));
        aligned.update_bid(ExchangeId::Binance, px(100.0), qty(1.0));
        aligned.update_ask(ExchangeId::Binance, px(100.5), qty(1.0));
        scanner.on_book_update(&aligned);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_execution_counters() {
        let scanner = ArbScanner::new(open_config());
        scanner.record_execution(true);
        scanner.record_execution(true);
        scanner.record_execution(false);
        assert_eq!(scanner.opportunities_executed(), 2);
        assert_eq!(scanner.executions_failed(), 1);
    }

    #[test]
    fn test_find_best_among_three_venues() {
        let scanner = ArbScanner::new(open_config());
        let book = dislocated_book();
        // A third venue with an even cheaper ask.
        book.update_bid(ExchangeId::Okx, px(98.0), qty(1.0));
        book.update_ask(ExchangeId::Okx, px(99.5), qty(1.0));

        let best = scanner.find_best_opportunity(&book).unwrap();
        assert_eq!(best.buy_exchange, ExchangeId::Okx);
        assert_eq!(best.sell_exchange, ExchangeId::Binance);
        assert!((best.profit_bps - 10_000.0 * 1.5 / 99.5).abs() < 1e-9);
    }

    #[test]
    fn test_update_config() {
        let scanner = ArbScanner::new(open_config());
        assert_eq!(scanner.config().min_profit_bps, 5.0);
        let mut config = open_config();
        config.min_profit_bps = 42.0;
        scanner.update_config(config);
        assert_eq!(scanner.config().min_profit_bps, 42.0);
    }
}
