//! The pre-trade risk gate.
//!
//! [`RiskGate::check_order`] runs a fixed sequence of checks and
//! short-circuits on the first failure. A mutex guards the position and
//! open-order maps; atomics cover the rate limiter, open-order count, kill
//! switch flag, and P&L totals, so the hot-path admission test never takes a
//! lock it does not need.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use xmm_core::types::{Order, OrderId, Price, Quantity, Side, Symbol, Timestamp};

use crate::limits::RiskLimits;
use crate::position::Position;
use crate::violation::RiskViolation;

/// `f64` behind an `AtomicU64` bit pattern, for lock-free P&L totals.
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn fetch_add(&self, delta: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return f64::from_bits(current),
                Err(observed) => current = observed,
            }
        }
    }
}

/// Callback invoked exactly once when the kill switch first arms.
pub type KillSwitchCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Pre-trade risk gate with position and P&L bookkeeping.
pub struct RiskGate {
    limits: RwLock<RiskLimits>,

    positions: Mutex<HashMap<Symbol, Position>>,
    disabled_symbols: Mutex<HashSet<Symbol>>,

    open_orders: Mutex<HashMap<OrderId, Order>>,
    open_order_count: AtomicU32,

    // Rate limiting: counter per wall-clock second bucket.
    orders_this_second: AtomicU32,
    current_second: AtomicU64,

    daily_realized_pnl: AtomicF64,
    peak_equity: AtomicF64,

    kill_switch: AtomicBool,
    error_count: AtomicU32,
    reject_count: AtomicU32,
    kill_switch_callback: Mutex<Option<KillSwitchCallback>>,

    orders_checked: AtomicU64,
    orders_rejected: AtomicU64,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits: RwLock::new(limits),
            positions: Mutex::new(HashMap::new()),
            disabled_symbols: Mutex::new(HashSet::new()),
            open_orders: Mutex::new(HashMap::new()),
            open_order_count: AtomicU32::new(0),
            orders_this_second: AtomicU32::new(0),
            current_second: AtomicU64::new(0),
            daily_realized_pnl: AtomicF64::new(0.0),
            peak_equity: AtomicF64::new(0.0),
            kill_switch: AtomicBool::new(false),
            error_count: AtomicU32::new(0),
            reject_count: AtomicU32::new(0),
            kill_switch_callback: Mutex::new(None),
            orders_checked: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
        }
    }

    // ── Pre-trade checks ───────────────────────────────────────────────

    /// Run the pre-trade checks in order, short-circuiting on the first
    /// failure. `reference_price` enables the deviation check.
    pub fn check_order(
        &self,
        order: &Order,
        reference_price: Option<Price>,
    ) -> Result<(), RiskViolation> {
        self.orders_checked.fetch_add(1, Ordering::Relaxed);
        let limits = self.limits.read().clone();

        let result = self.run_checks(order, reference_price, &limits);
        if let Err(violation) = &result {
            self.orders_rejected.fetch_add(1, Ordering::Relaxed);
            self.note_reject(&limits);
            tracing::debug!(
                client_id = %order.client_id,
                symbol = %order.symbol,
                %violation,
                "order refused by risk gate"
            );
        }
        result
    }

    fn run_checks(
        &self,
        order: &Order,
        reference_price: Option<Price>,
        limits: &RiskLimits,
    ) -> Result<(), RiskViolation> {
        // 1. Kill switch
        if self.kill_switch.load(Ordering::Relaxed) {
            return Err(RiskViolation::KillSwitchActive);
        }

        // 2. Symbol enablement (default enabled)
        if self.disabled_symbols.lock().contains(&order.symbol) {
            return Err(RiskViolation::SymbolDisabled {
                symbol: order.symbol,
            });
        }

        // 3. Position limit on the post-trade quantity
        if !limits.max_position_qty.is_zero() {
            let current = self.position_qty(order.symbol);
            let resulting = match order.side {
                Side::Buy => current + order.quantity,
                Side::Sell => current - order.quantity,
            };
            if resulting.abs() > limits.max_position_qty {
                return Err(RiskViolation::PositionLimit {
                    resulting,
                    limit: limits.max_position_qty,
                });
            }
        }

        // 4. Order size and value
        if !limits.max_order_qty.is_zero() && order.quantity > limits.max_order_qty {
            return Err(RiskViolation::OrderSizeLimit {
                quantity: order.quantity,
                limit: limits.max_order_qty,
            });
        }
        if limits.max_order_value > 0.0 {
            let value = order.quantity.to_f64() * order.price.to_f64();
            if value > limits.max_order_value {
                return Err(RiskViolation::OrderValueLimit {
                    value,
                    limit: limits.max_order_value,
                });
            }
        }

        // 5. Rate limit
        if limits.max_orders_per_second > 0 {
            self.check_rate_limit_at(Timestamp::now().as_secs(), limits.max_orders_per_second)?;
        }

        // 6. Open orders cap
        if limits.max_open_orders > 0 {
            let count = self.open_order_count.load(Ordering::Relaxed);
            if count >= limits.max_open_orders {
                return Err(RiskViolation::OpenOrdersLimit {
                    count,
                    limit: limits.max_open_orders,
                });
            }
        }

        // 7. Daily loss; reaching the limit arms the kill switch.
        if limits.max_daily_loss > 0.0 {
            let daily_loss = -self.daily_realized_pnl.load();
            if daily_loss >= limits.max_daily_loss {
                self.activate_kill_switch(&format!(
                    "daily loss limit reached: {daily_loss:.2}"
                ));
                return Err(RiskViolation::DailyLossLimit {
                    loss: daily_loss,
                    limit: limits.max_daily_loss,
                });
            }
        }

        // 8. Price deviation against the reference, when provided.
        if let Some(reference) = reference_price {
            if limits.max_deviation_bps > 0.0 && !reference.is_zero() {
                let deviation_bps = 10_000.0 * (order.price - reference).abs().raw() as f64
                    / reference.raw() as f64;
                if deviation_bps > limits.max_deviation_bps {
                    return Err(RiskViolation::PriceDeviation {
                        deviation_bps,
                        limit_bps: limits.max_deviation_bps,
                    });
                }
            }
        }

        Ok(())
    }

    /// Second-bucket rate limiter: the counter resets when the wall-clock
    /// second changes; each admission attempt consumes a slot.
    fn check_rate_limit_at(&self, now_sec: u64, max_per_second: u32) -> Result<(), RiskViolation> {
        let prev = self.current_second.load(Ordering::Relaxed);
        if now_sec != prev
            && self
                .current_second
                .compare_exchange(prev, now_sec, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            self.orders_this_second.store(0, Ordering::Relaxed);
        }

        let count = self.orders_this_second.fetch_add(1, Ordering::Relaxed);
        if count >= max_per_second {
            return Err(RiskViolation::RateLimit {
                count,
                limit: max_per_second,
            });
        }
        Ok(())
    }

    // ── Post-trade bookkeeping ─────────────────────────────────────────

    /// Register an admitted order that the adapter accepted.
    pub fn on_order_sent(&self, order: &Order) {
        self.open_orders.lock().insert(order.id, *order);
        self.open_order_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply a fill: position update, realized P&L, drawdown tracking, and
    /// open-order retirement once fully filled.
    pub fn on_order_filled(
        &self,
        order_id: OrderId,
        symbol: Symbol,
        side: Side,
        fill_qty: Quantity,
        fill_price: Price,
    ) {
        let realized = {
            let mut positions = self.positions.lock();
            let position = positions
                .entry(symbol)
                .or_insert_with(|| Position::new(symbol));
            position.apply_fill(side, fill_qty, fill_price)
        };
        self.daily_realized_pnl.fetch_add(realized);

        self.update_drawdown();

        let mut open = self.open_orders.lock();
        if let Some(order) = open.get_mut(&order_id) {
            order.filled_qty = order.filled_qty + fill_qty;
            order.status = if order.filled_qty >= order.quantity {
                xmm_core::types::OrderStatus::Filled
            } else {
                xmm_core::types::OrderStatus::PartiallyFilled
            };
            if !order.is_active() {
                open.remove(&order_id);
                self.open_order_count.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }

    /// Retire a canceled order.
    pub fn on_order_canceled(&self, order_id: OrderId) {
        if self.open_orders.lock().remove(&order_id).is_some() {
            self.open_order_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Retire a rejected order and count the reject toward the kill-switch
    /// threshold.
    pub fn on_order_rejected(&self, order_id: OrderId) {
        self.on_order_canceled(order_id);
        let limits = self.limits.read().clone();
        self.note_reject(&limits);
    }

    /// Count an adapter error; crossing the error threshold arms the kill
    /// switch.
    pub fn note_error(&self) {
        let errors = self.error_count.fetch_add(1, Ordering::Relaxed) + 1;
        let limits = self.limits.read();
        if limits.kill_switch_enabled
            && limits.error_threshold > 0
            && errors >= limits.error_threshold
        {
            let reason = format!("error threshold reached: {errors}");
            drop(limits);
            self.activate_kill_switch(&reason);
        }
    }

    fn note_reject(&self, limits: &RiskLimits) {
        let rejects = self.reject_count.fetch_add(1, Ordering::Relaxed) + 1;
        if limits.kill_switch_enabled
            && limits.reject_threshold > 0
            && rejects >= limits.reject_threshold
        {
            self.activate_kill_switch(&format!("reject threshold reached: {rejects}"));
        }
    }

    fn update_drawdown(&self) {
        let equity = self.total_pnl();
        let peak = self.peak_equity.load();
        if equity > peak {
            self.peak_equity.store(equity);
            return;
        }
        let max_drawdown = self.limits.read().max_drawdown;
        if max_drawdown > 0.0 {
            let drawdown = peak - equity;
            if drawdown > max_drawdown {
                self.activate_kill_switch(&format!("drawdown limit exceeded: {drawdown:.2}"));
            }
        }
    }

    // ── Position and P&L accessors ─────────────────────────────────────

    /// Overwrite a position (e.g. from an account snapshot on reconnect).
    pub fn set_position(&self, symbol: Symbol, quantity: Quantity, avg_price: Price) {
        let mut positions = self.positions.lock();
        let position = positions
            .entry(symbol)
            .or_insert_with(|| Position::new(symbol));
        position.quantity = quantity;
        position.avg_price = avg_price;
        position.last_update = Timestamp::now();
    }

    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.positions.lock().get(symbol).cloned()
    }

    /// Net position quantity; zero when the symbol has never traded.
    pub fn position_qty(&self, symbol: Symbol) -> Quantity {
        self.positions
            .lock()
            .get(&symbol)
            .map(|p| p.quantity)
            .unwrap_or(Quantity::ZERO)
    }

    /// Re-mark one symbol's unrealized P&L.
    pub fn update_mark_price(&self, symbol: Symbol, mark: Price) {
        if let Some(position) = self.positions.lock().get_mut(&symbol) {
            position.mark(mark);
        }
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.lock().values().map(|p| p.unrealized_pnl).sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.positions.lock().values().map(|p| p.realized_pnl).sum()
    }

    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl() + self.unrealized_pnl()
    }

    /// Realized P&L since the last daily reset, plus current unrealized.
    pub fn daily_pnl(&self) -> f64 {
        self.daily_realized_pnl.load() + self.unrealized_pnl()
    }

    /// Gross exposure: sum of absolute position notionals at entry prices.
    pub fn total_exposure(&self) -> f64 {
        self.positions
            .lock()
            .values()
            .map(|p| p.quantity.abs().to_f64() * p.avg_price.to_f64())
            .sum()
    }

    /// Net exposure: signed sum of position notionals at entry prices.
    pub fn net_exposure(&self) -> f64 {
        self.positions
            .lock()
            .values()
            .map(|p| p.quantity.to_f64() * p.avg_price.to_f64())
            .sum()
    }

    // ── Kill switch ────────────────────────────────────────────────────

    /// Arm the kill switch. Idempotent: the registered callback fires only
    /// on the first arming.
    pub fn activate_kill_switch(&self, reason: &str) {
        if !self.kill_switch.swap(true, Ordering::SeqCst) {
            tracing::error!(reason, "KILL SWITCH ACTIVATED, order flow halted");
            if let Some(callback) = self.kill_switch_callback.lock().as_ref() {
                callback(reason);
            }
        }
    }

    /// Disarm the kill switch and reset the error and reject counters.
    pub fn deactivate_kill_switch(&self) {
        self.kill_switch.store(false, Ordering::SeqCst);
        self.error_count.store(0, Ordering::Relaxed);
        self.reject_count.store(0, Ordering::Relaxed);
        tracing::warn!("kill switch deactivated, order flow resumed");
    }

    #[inline]
    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch.load(Ordering::Relaxed)
    }

    /// Register the cancel-all callback. Must happen before any producing
    /// thread starts.
    pub fn set_kill_switch_callback(&self, callback: KillSwitchCallback) {
        *self.kill_switch_callback.lock() = Some(callback);
    }

    // ── Symbol management ──────────────────────────────────────────────

    pub fn enable_symbol(&self, symbol: Symbol) {
        self.disabled_symbols.lock().remove(&symbol);
    }

    pub fn disable_symbol(&self, symbol: Symbol) {
        self.disabled_symbols.lock().insert(symbol);
    }

    pub fn is_symbol_enabled(&self, symbol: &Symbol) -> bool {
        !self.disabled_symbols.lock().contains(symbol)
    }

    // ── Limits and daily lifecycle ─────────────────────────────────────

    pub fn update_limits(&self, limits: RiskLimits) {
        *self.limits.write() = limits;
    }

    pub fn limits(&self) -> RiskLimits {
        self.limits.read().clone()
    }

    /// Reset daily P&L, re-seed the equity peak, and clear the breaker
    /// counters for a new trading day.
    pub fn reset_daily_stats(&self) {
        self.daily_realized_pnl.store(0.0);
        self.peak_equity.store(self.total_pnl());
        self.error_count.store(0, Ordering::Relaxed);
        self.reject_count.store(0, Ordering::Relaxed);
    }

    // ── Statistics ─────────────────────────────────────────────────────

    pub fn orders_checked(&self) -> u64 {
        self.orders_checked.load(Ordering::Relaxed)
    }

    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn open_order_count(&self) -> u32 {
        self.open_order_count.load(Ordering::Relaxed)
    }

    pub fn open_orders(&self) -> Vec<Order> {
        self.open_orders.lock().values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use xmm_core::types::{ExchangeId, TimeInForce};

    fn px(v: f64) -> Price {
        Price::from_f64(v)
    }

    fn qty(v: f64) -> Quantity {
        Quantity::from_f64(v)
    }

    fn sym() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    fn make_order(side: Side, price: Price, quantity: Quantity) -> Order {
        let mut order = Order::limit(sym(), ExchangeId::Binance, side, price, quantity, TimeInForce::Gtc);
        order.id = OrderId(1);
        order.client_id = OrderId(1);
        order
    }

    fn open_limits() -> RiskLimits {
        RiskLimits {
            max_daily_loss: 0.0,
            max_deviation_bps: 0.0,
            ..RiskLimits::default()
        }
    }

    #[test]
    fn test_pass_with_open_limits() {
        let gate = RiskGate::new(open_limits());
        let order = make_order(Side::Buy, px(100.0), qty(1.0));
        assert!(gate.check_order(&order, None).is_ok());
        assert_eq!(gate.orders_checked(), 1);
        assert_eq!(gate.orders_rejected(), 0);
    }

    #[test]
    fn test_kill_switch_rejects_first() {
        let gate = RiskGate::new(open_limits());
        gate.activate_kill_switch("test");
        let order = make_order(Side::Buy, px(100.0), qty(1.0));
        assert_eq!(
            gate.check_order(&order, None),
            Err(RiskViolation::KillSwitchActive)
        );
        assert_eq!(gate.orders_rejected(), 1);
    }

    #[test]
    fn test_symbol_disabled() {
        let gate = RiskGate::new(open_limits());
        assert!(gate.is_symbol_enabled(&sym()));
        gate.disable_symbol(sym());
        let order = make_order(Side::Buy, px(100.0), qty(1.0));
        assert!(matches!(
            gate.check_order(&order, None),
            Err(RiskViolation::SymbolDisabled { .. })
        ));
        gate.enable_symbol(sym());
        assert!(gate.check_order(&order, None).is_ok());
    }

    // max_position 5; long 4 after a flip sequence ending
    // short 2; a further SELL 4 would reach |-6| > 5.
    #[test]
    fn test_position_flip_and_limit() {
        let mut limits = open_limits();
        limits.max_position_qty = qty(5.0);
        let gate = RiskGate::new(limits);

        gate.on_order_filled(OrderId(10), sym(), Side::Buy, qty(4.0), px(100.0));
        let pos = gate.position(&sym()).unwrap();
        assert_eq!(pos.quantity, qty(4.0));
        assert_eq!(pos.avg_price, px(100.0));

        gate.on_order_filled(OrderId(11), sym(), Side::Sell, qty(6.0), px(105.0));
        let pos = gate.position(&sym()).unwrap();
        assert_eq!(pos.quantity, qty(-2.0));
        assert_eq!(pos.avg_price, px(105.0));
        assert!((pos.realized_pnl - 20.0).abs() < 1e-9);

        let order = make_order(Side::Sell, px(105.0), qty(4.0));
        assert!(matches!(
            gate.check_order(&order, None),
            Err(RiskViolation::PositionLimit { .. })
        ));

        // Reducing the short is fine.
        let order = make_order(Side::Buy, px(105.0), qty(4.0));
        assert!(gate.check_order(&order, None).is_ok());
    }

    #[test]
    fn test_order_size_and_value_limits() {
        let mut limits = open_limits();
        limits.max_order_qty = qty(1.0);
        limits.max_order_value = 150.0;
        let gate = RiskGate::new(limits);

        let too_big = make_order(Side::Buy, px(100.0), qty(2.0));
        assert!(matches!(
            gate.check_order(&too_big, None),
            Err(RiskViolation::OrderSizeLimit { .. })
        ));

        let too_valuable = make_order(Side::Buy, px(200.0), qty(1.0));
        assert!(matches!(
            gate.check_order(&too_valuable, None),
            Err(RiskViolation::OrderValueLimit { .. })
        ));

        let fine = make_order(Side::Buy, px(100.0), qty(1.0));
        assert!(gate.check_order(&fine, None).is_ok());
    }

    // limit 3/s; three pass, the fourth rejects, and the
    // next second admits again.
    #[test]
    fn test_rate_limit_second_buckets() {
        let gate = RiskGate::new(open_limits());
        for _ in 0..3 {
            assert!(gate.check_rate_limit_at(100, 3).is_ok());
        }
        assert!(matches!(
            gate.check_rate_limit_at(100, 3),
            Err(RiskViolation::RateLimit { count: 3, limit: 3 })
        ));

        // Second boundary resets the counter.
        assert!(gate.check_rate_limit_at(101, 3).is_ok());
        assert!(gate.check_rate_limit_at(101, 3).is_ok());
    }

    #[test]
    fn test_open_orders_limit() {
        let mut limits = open_limits();
        limits.max_open_orders = 2;
        let gate = RiskGate::new(limits);

        let mut a = make_order(Side::Buy, px(100.0), qty(1.0));
        a.id = OrderId(1);
        let mut b = make_order(Side::Buy, px(100.0), qty(1.0));
        b.id = OrderId(2);
        gate.on_order_sent(&a);
        gate.on_order_sent(&b);
        assert_eq!(gate.open_order_count(), 2);

        let c = make_order(Side::Buy, px(100.0), qty(1.0));
        assert!(matches!(
            gate.check_order(&c, None),
            Err(RiskViolation::OpenOrdersLimit { .. })
        ));

        gate.on_order_canceled(OrderId(1));
        assert_eq!(gate.open_order_count(), 1);
        assert!(gate.check_order(&c, None).is_ok());
    }

    #[test]
    fn test_daily_loss_arms_kill_switch() {
        let mut limits = open_limits();
        limits.max_daily_loss = 50.0;
        let gate = RiskGate::new(limits);

        // Lose 60 on a round trip.
        gate.on_order_filled(OrderId(1), sym(), Side::Buy, qty(1.0), px(100.0));
        gate.on_order_filled(OrderId(1), sym(), Side::Sell, qty(1.0), px(40.0));
        assert!((gate.daily_pnl() + 60.0).abs() < 1e-9);

        let order = make_order(Side::Buy, px(40.0), qty(1.0));
        assert!(matches!(
            gate.check_order(&order, None),
            Err(RiskViolation::DailyLossLimit { .. })
        ));
        assert!(gate.is_kill_switch_active());
    }

    #[test]
    fn test_price_deviation_needs_reference() {
        let mut limits = open_limits();
        limits.max_deviation_bps = 50.0;
        let gate = RiskGate::new(limits);

        let order = make_order(Side::Buy, px(101.0), qty(1.0));
        // 100 bps away from reference 100.
        assert!(matches!(
            gate.check_order(&order, Some(px(100.0))),
            Err(RiskViolation::PriceDeviation { .. })
        ));
        // No reference, no deviation check.
        assert!(gate.check_order(&order, None).is_ok());
        // Within bounds passes.
        assert!(gate.check_order(&order, Some(px(100.999))).is_ok());
    }

    #[test]
    fn test_kill_switch_callback_fires_once() {
        let gate = RiskGate::new(open_limits());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        gate.set_kill_switch_callback(Box::new(move |_reason| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        gate.activate_kill_switch("first");
        gate.activate_kill_switch("second");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(gate.is_kill_switch_active());
    }

    #[test]
    fn test_deactivate_resets_counters() {
        let mut limits = open_limits();
        limits.reject_threshold = 2;
        let gate = RiskGate::new(limits);
        gate.disable_symbol(sym());

        let order = make_order(Side::Buy, px(100.0), qty(1.0));
        let _ = gate.check_order(&order, None);
        let _ = gate.check_order(&order, None);
        // Two rejects reached the threshold.
        assert!(gate.is_kill_switch_active());

        gate.deactivate_kill_switch();
        assert!(!gate.is_kill_switch_active());
        gate.enable_symbol(sym());
        assert!(gate.check_order(&order, None).is_ok());
    }

    #[test]
    fn test_reject_threshold_from_exchange_rejects() {
        let mut limits = open_limits();
        limits.reject_threshold = 3;
        let gate = RiskGate::new(limits);

        gate.on_order_rejected(OrderId(1));
        gate.on_order_rejected(OrderId(2));
        assert!(!gate.is_kill_switch_active());
        gate.on_order_rejected(OrderId(3));
        assert!(gate.is_kill_switch_active());
    }

    #[test]
    fn test_error_threshold_arms_kill_switch() {
        let mut limits = open_limits();
        limits.error_threshold = 2;
        let gate = RiskGate::new(limits);

        gate.note_error();
        assert!(!gate.is_kill_switch_active());
        gate.note_error();
        assert!(gate.is_kill_switch_active());
    }

    #[test]
    fn test_drawdown_arms_kill_switch() {
        let mut limits = open_limits();
        limits.max_drawdown = 30.0;
        let gate = RiskGate::new(limits);

        // Peak at +50 realized.
        gate.on_order_filled(OrderId(1), sym(), Side::Buy, qty(1.0), px(100.0));
        gate.on_order_filled(OrderId(1), sym(), Side::Sell, qty(1.0), px(150.0));
        assert!(!gate.is_kill_switch_active());

        // Give back 40 from the peak.
        gate.on_order_filled(OrderId(2), sym(), Side::Buy, qty(1.0), px(150.0));
        gate.on_order_filled(OrderId(2), sym(), Side::Sell, qty(1.0), px(110.0));
        assert!(gate.is_kill_switch_active());
    }

    #[test]
    fn test_fill_retires_open_order() {
        let gate = RiskGate::new(open_limits());
        let mut order = make_order(Side::Buy, px(100.0), qty(1.0));
        order.id = OrderId(5);
        gate.on_order_sent(&order);
        assert_eq!(gate.open_order_count(), 1);

        gate.on_order_filled(OrderId(5), sym(), Side::Buy, qty(0.4), px(100.0));
        assert_eq!(gate.open_order_count(), 1);
        let open = gate.open_orders();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].filled_qty, qty(0.4));

        gate.on_order_filled(OrderId(5), sym(), Side::Buy, qty(0.6), px(100.0));
        assert_eq!(gate.open_order_count(), 0);
        assert!(gate.open_orders().is_empty());
    }

    #[test]
    fn test_mark_price_and_pnl_totals() {
        let gate = RiskGate::new(open_limits());
        gate.on_order_filled(OrderId(1), sym(), Side::Buy, qty(2.0), px(100.0));
        gate.update_mark_price(sym(), px(110.0));

        assert!((gate.unrealized_pnl() - 20.0).abs() < 1e-9);
        assert_eq!(gate.realized_pnl(), 0.0);
        assert!((gate.total_pnl() - 20.0).abs() < 1e-9);
        assert!((gate.daily_pnl() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_exposure() {
        let gate = RiskGate::new(open_limits());
        gate.on_order_filled(OrderId(1), sym(), Side::Buy, qty(1.0), px(100.0));
        gate.on_order_filled(OrderId(2), Symbol::new("ETHUSDT"), Side::Sell, qty(2.0), px(50.0));

        assert!((gate.total_exposure() - 200.0).abs() < 1e-9);
        assert!((gate.net_exposure() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_daily_stats() {
        let gate = RiskGate::new(open_limits());
        gate.on_order_filled(OrderId(1), sym(), Side::Buy, qty(1.0), px(100.0));
        gate.on_order_filled(OrderId(1), sym(), Side::Sell, qty(1.0), px(90.0));
        assert!(gate.daily_pnl() < 0.0);

        gate.reset_daily_stats();
        assert_eq!(gate.daily_pnl(), 0.0);
        // Lifetime realized P&L is untouched by the daily reset.
        assert!((gate.realized_pnl() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_position_overwrites() {
        let gate = RiskGate::new(open_limits());
        gate.set_position(sym(), qty(3.0), px(101.0));
        let pos = gate.position(&sym()).unwrap();
        assert_eq!(pos.quantity, qty(3.0));
        assert_eq!(pos.avg_price, px(101.0));
    }

    #[test]
    fn test_unlimited_when_zero() {
        // All zero limits: everything passes.
        let limits = RiskLimits {
            max_position_qty: Quantity::ZERO,
            max_order_qty: Quantity::ZERO,
            max_order_value: 0.0,
            max_orders_per_second: 0,
            max_open_orders: 0,
            max_daily_loss: 0.0,
            max_drawdown: 0.0,
            max_deviation_bps: 0.0,
            ..RiskLimits::default()
        };
        let gate = RiskGate::new(limits);
        let order = make_order(Side::Buy, px(1_000_000.0), qty(1_000.0));
        for _ in 0..100 {
            assert!(gate.check_order(&order, Some(px(1.0))).is_ok());
        }
    }
}
