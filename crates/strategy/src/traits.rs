//! The quoting capability: decision types, shared parameters, the
//! [`Quoter`] trait, and the [`QuoterCore`] base state every strategy
//! composes.

use xmm_book::OrderBook;
use xmm_core::types::{OrderId, Price, Quantity, Side, Timestamp, Trade};

use crate::signal::Signal;

/// Why a quoter declined to quote this round. Expected outcomes, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    /// The strategy is disabled.
    Disabled,
    /// The book is one-sided or crossed.
    InvalidBook,
    /// No fair value could be derived.
    NoFairValue,
    /// Skew pushed the bid at or through the ask.
    WouldCross,
    /// Both computed sizes were zero.
    ZeroSize,
    /// Inside the minimum quote lifetime with unchanged prices.
    Throttled,
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeclineReason::Disabled => "strategy disabled",
            DeclineReason::InvalidBook => "invalid book",
            DeclineReason::NoFairValue => "no fair value",
            DeclineReason::WouldCross => "prices would cross",
            DeclineReason::ZeroSize => "order sizes are zero",
            DeclineReason::Throttled => "prices unchanged",
        };
        f.write_str(s)
    }
}

/// One round of quoting output.
#[derive(Debug, Clone, Copy)]
pub struct QuoteDecision {
    pub should_quote: bool,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
    pub reason: Option<DeclineReason>,
}

impl QuoteDecision {
    pub fn decline(reason: DeclineReason) -> Self {
        Self {
            should_quote: false,
            bid_price: Price::ZERO,
            ask_price: Price::ZERO,
            bid_size: Quantity::ZERO,
            ask_size: Quantity::ZERO,
            reason: Some(reason),
        }
    }
}

/// Parameters shared by the market-making strategies.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct QuoterParams {
    pub min_spread_bps: f64,
    pub max_spread_bps: f64,
    pub target_spread_bps: f64,

    /// Maximum inventory (0 = unlimited).
    pub max_position: Quantity,
    /// Skew coefficient applied in bps space.
    pub inventory_skew_coeff: f64,

    pub default_order_size: Quantity,
    pub min_order_size: Quantity,
    /// Upper size clamp (0 = unclamped).
    pub max_order_size: Quantity,

    /// Minimum lifetime of a quote before an unchanged reprice is dropped.
    pub min_quote_life_us: u64,
}

impl Default for QuoterParams {
    fn default() -> Self {
        Self {
            min_spread_bps: 5.0,
            max_spread_bps: 50.0,
            target_spread_bps: 10.0,
            max_position: Quantity::ZERO,
            inventory_skew_coeff: 0.5,
            default_order_size: Quantity::from_f64(0.001),
            min_order_size: Quantity::ZERO,
            max_order_size: Quantity::ZERO,
            min_quote_life_us: 50_000,
        }
    }
}

/// A market-making strategy evaluated by the strategy thread.
///
/// Strategies are synchronous and single-threaded: no locks, no I/O, no
/// allocation beyond their own state. The engine owns order emission; after
/// a successful send it reports back through [`on_quote_placed`] so the
/// strategy can track its active quotes.
///
/// [`on_quote_placed`]: Quoter::on_quote_placed
pub trait Quoter: Send {
    /// Shared base state (enabled flag, active quotes, throttle, tallies).
    fn core(&self) -> &QuoterCore;
    fn core_mut(&mut self) -> &mut QuoterCore;

    /// Produce this round's quoting decision from the book, the current
    /// signed position, and the synthesized signal.
    fn compute_quotes(
        &mut self,
        book: &OrderBook,
        position: Quantity,
        signal: &Signal,
    ) -> QuoteDecision;

    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Market trade observed (not necessarily ours).
    fn on_trade(&mut self, _trade: &Trade) {}

    /// One of our orders filled.
    fn on_fill(&mut self, order_id: OrderId, side: Side, fill_qty: Quantity, fill_price: Price) {
        self.core_mut().record_fill(order_id, side, fill_qty, fill_price);
    }

    /// One of our orders was canceled.
    fn on_cancel(&mut self, order_id: OrderId) {
        self.core_mut().clear_quote(order_id);
    }

    /// One of our orders was rejected; handled like a cancel.
    fn on_reject(&mut self, order_id: OrderId) {
        self.core_mut().clear_quote(order_id);
    }

    /// The engine placed a quote on a venue and got `order_id` back.
    fn on_quote_placed(&mut self, side: Side, order_id: OrderId, price: Price) {
        self.core_mut().record_quote_placed(side, order_id, price);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.core_mut().enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.core().enabled
    }
}

/// Shared quoting state and the base quote construction every strategy in
/// the family reuses.
#[derive(Debug, Clone)]
pub struct QuoterCore {
    pub params: QuoterParams,
    pub enabled: bool,

    active_bid_id: OrderId,
    active_ask_id: OrderId,
    active_bid_price: Price,
    active_ask_price: Price,
    last_quote_time: Timestamp,

    quotes_sent: u64,
    fills: u64,
    total_bought: Quantity,
    total_sold: Quantity,
}

impl QuoterCore {
    pub fn new(params: QuoterParams) -> Self {
        Self {
            params,
            enabled: false,
            active_bid_id: OrderId::NONE,
            active_ask_id: OrderId::NONE,
            active_bid_price: Price::ZERO,
            active_ask_price: Price::ZERO,
            last_quote_time: Timestamp::ZERO,
            quotes_sent: 0,
            fills: 0,
            total_bought: Quantity::ZERO,
            total_sold: Quantity::ZERO,
        }
    }

    // ── Base quote construction ────────────────────────────────────────

    /// Build a decision around the book mid with the given inventory skew
    /// in [-1, 1]. This is the shared body of the base algorithm; callers
    /// supply the skew model.
    pub fn quote_around_mid(
        &mut self,
        book: &OrderBook,
        position: Quantity,
        signal: &Signal,
        skew: f64,
    ) -> QuoteDecision {
        if !self.enabled {
            return QuoteDecision::decline(DeclineReason::Disabled);
        }
        if !book.is_valid() {
            return QuoteDecision::decline(DeclineReason::InvalidBook);
        }
        let fair_value = match book.mid_price() {
            Some(mid) if !mid.is_zero() => mid,
            _ => return QuoteDecision::decline(DeclineReason::NoFairValue),
        };

        // Target spread widened by volatility, clamped to the configured
        // band; half of the round trip on each side.
        let spread_bps = self.spread_bps(signal);
        let half_spread = Price::from_raw((fair_value.raw() as f64 * spread_bps / 20_000.0) as i64);

        // Skew shifts both quotes against the inventory.
        let skew_adjust = Price::from_raw(
            (fair_value.raw() as f64 * skew * self.params.inventory_skew_coeff / 10_000.0) as i64,
        );

        let bid_price = fair_value - half_spread - skew_adjust;
        let ask_price = fair_value + half_spread - skew_adjust;
        if bid_price >= ask_price {
            return QuoteDecision::decline(DeclineReason::WouldCross);
        }

        let bid_size = self.order_size(Side::Buy, position);
        let ask_size = self.order_size(Side::Sell, position);
        if bid_size.is_zero() && ask_size.is_zero() {
            return QuoteDecision::decline(DeclineReason::ZeroSize);
        }

        let now = Timestamp::now();
        if self.is_throttled(now, bid_price, ask_price, fair_value) {
            return QuoteDecision::decline(DeclineReason::Throttled);
        }
        self.last_quote_time = now;

        QuoteDecision {
            should_quote: true,
            bid_price,
            ask_price,
            bid_size,
            ask_size,
            reason: None,
        }
    }

    /// `clamp(target * (1 + volatility), min, max)`.
    pub fn spread_bps(&self, signal: &Signal) -> f64 {
        let mut spread = self.params.target_spread_bps;
        if signal.volatility > 0.0 {
            spread *= 1.0 + signal.volatility;
        }
        spread.clamp(self.params.min_spread_bps, self.params.max_spread_bps)
    }

    /// Linear inventory skew: `position / max_position`, clamped to
    /// [-1, 1]. Zero when no position cap is configured.
    pub fn linear_skew(&self, position: Quantity) -> f64 {
        if self.params.max_position.is_zero() {
            return 0.0;
        }
        (position.raw() as f64 / self.params.max_position.raw() as f64).clamp(-1.0, 1.0)
    }

    /// Base size, shrunk on the side that would grow inventory, clamped to
    /// the configured bounds.
    pub fn order_size(&self, side: Side, position: Quantity) -> Quantity {
        let mut size = self.params.default_order_size;

        if !self.params.max_position.is_zero() {
            let max = self.params.max_position.raw() as f64;
            let ratio = match side {
                Side::Buy if position.is_positive() => 1.0 - position.raw() as f64 / max,
                Side::Sell if position.is_negative() => 1.0 + position.raw() as f64 / max,
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

    /// Inside the minimum quote lifetime, a reprice within 1 bps of the
    /// active quotes on both sides is suppressed.
    fn is_throttled(&self, now: Timestamp, bid: Price, ask: Price, fair_value: Price) -> bool {
        if self.params.min_quote_life_us == 0 {
            return false;
        }
        if now.nanos_since(self.last_quote_time) >= self.params.min_quote_life_us * 1_000 {
            return false;
        }
        let threshold = fair_value / 10_000;
        let bid_delta = (bid - self.active_bid_price).abs();
        let ask_delta = (ask - self.active_ask_price).abs();
        bid_delta < threshold && ask_delta < threshold
    }

    // ── Active quote and tally bookkeeping ─────────────────────────────

    pub fn record_quote_placed(&mut self, side: Side, order_id: OrderId, price: Price) {
        self.quotes_sent += 1;
        match side {
            Side::Buy => {
                self.active_bid_id = order_id;
                self.active_bid_price = price;
            }
            Side::Sell => {
                self.active_ask_id = order_id;
                self.active_ask_price = price;
            }
        }
    }

    pub fn record_fill(
        &mut self,
        order_id: OrderId,
        side: Side,
        fill_qty: Quantity,
        fill_price: Price,
    ) {
        self.fills += 1;
        match side {
            Side::Buy => self.total_bought = self.total_bought + fill_qty,
            Side::Sell => self.total_sold = self.total_sold + fill_qty,
        }
        tracing::debug!(
            %order_id,
            %side,
            qty = %fill_qty,
            price = %fill_price,
            "quoter fill"
        );
    }

    pub fn clear_quote(&mut self, order_id: OrderId) {
        if order_id == self.active_bid_id {
            self.active_bid_id = OrderId::NONE;
            self.active_bid_price = Price::ZERO;
        } else if order_id == self.active_ask_id {
            self.active_ask_id = OrderId::NONE;
            self.active_ask_price = Price::ZERO;
        }
    }

    pub fn active_bid(&self) -> Option<(OrderId, Price)> {
        (!self.active_bid_id.is_none()).then_some((self.active_bid_id, self.active_bid_price))
    }

    pub fn active_ask(&self) -> Option<(OrderId, Price)> {
        (!self.active_ask_id.is_none()).then_some((self.active_ask_id, self.active_ask_price))
    }

    pub fn quotes_sent(&self) -> u64 {
        self.quotes_sent
    }

    pub fn fills(&self) -> u64 {
        self.fills
    }

    pub fn total_bought(&self) -> Quantity {
        self.total_bought
    }

    pub fn total_sold(&self) -> Quantity {
        self.total_sold
    }
}
