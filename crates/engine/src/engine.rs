//! Engine orchestration: thread topology, event routing, and lifecycle.
//!
//! Four worker threads run until `running` clears, coordinated only through
//! the transport rings:
//!
//! - **market-data** pops ticks, updates the books, refreshes the mark
//!   price, and (when scanning is on) enqueues a scan event;
//! - **strategy** drains scan events, evaluates the quoter, and issues
//!   quotes through [`Engine::send_order`] on its own thread;
//! - **order** drains order updates and trades into the risk gate and the
//!   quoter callbacks;
//! - **risk** is a low-frequency monitor; kill-switch arming itself happens
//!   inline on the pre-trade and fill paths.
//!
//! Backpressure is drop-with-counter: a full ring sheds the event and a
//! periodic warning notes the loss. Losing ticks is preferable to
//! head-of-line blocking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use xmm_arb::{ArbConfig, ArbScanner};
use xmm_book::{ConsolidatedBook, OrderBook};
use xmm_core::types::{
    ExchangeId, Order, OrderId, OrderStatus, OrderType, Price, Quantity, Side, Symbol, Tick,
    TimeInForce, Timestamp, Trade,
};
use xmm_risk::{RiskGate, RiskLimits};
use xmm_strategy::{Quoter, Signal};
use xmm_transport::{MpmcRing, SpscRing};

use crate::client::{CancelRequest, ExchangeCallbacks, ExchangeClient, OrderRequest};

/// Tick ring capacity; sized to absorb bursts.
const TICK_RING_CAPACITY: usize = 65_536;
/// Order-update, trade, and scan ring capacity.
const EVENT_RING_CAPACITY: usize = 8_192;
/// Dropped-event warning cadence.
const DROP_WARN_EVERY: u64 = 1_000;

/// Fatal startup failures. Runtime failures are values or counters, never
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to connect to {0}")]
    ConnectFailed(ExchangeId),
    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Static engine parameters resolved at build time.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbol: Symbol,
    pub exchange: ExchangeId,
    /// Book depth requested from the adapter.
    pub depth_levels: usize,
    /// Strategy loop cadence.
    pub quote_refresh_us: u64,
    /// Inventory cap used for the signal's pressure term.
    pub max_position: Quantity,
    /// Run the arbitrage scanner over the consolidated view.
    pub arb_enabled: bool,
}

/// Marker event telling the scanner the consolidated view changed.
#[derive(Debug, Clone, Copy)]
struct ScanEvent;

/// State shared by the worker threads and adapter callbacks.
struct Shared {
    settings: EngineSettings,
    running: AtomicBool,
    /// Cleared on disconnect and kill switch; gates order emission.
    trading_enabled: AtomicBool,

    // Rings. Ticks and scan events have a single producer and consumer;
    // order updates and trades may be produced from several adapter
    // threads, so they ride the MPMC ring.
    tick_ring: SpscRing<Tick, TICK_RING_CAPACITY>,
    order_ring: MpmcRing<Order, EVENT_RING_CAPACITY>,
    trade_ring: MpmcRing<Trade, EVENT_RING_CAPACITY>,
    scan_ring: SpscRing<ScanEvent, EVENT_RING_CAPACITY>,

    /// Primary venue book driving the quoter.
    book: Mutex<OrderBook>,
    /// Multi-venue view driving the scanner.
    consolidated: ConsolidatedBook,
    risk: RiskGate,
    quoter: Mutex<Box<dyn Quoter>>,
    scanner: ArbScanner,
    client: Arc<dyn ExchangeClient>,

    client_order_seq: AtomicU64,
    ticks_processed: AtomicU64,
    orders_sent: AtomicU64,
    trades_executed: AtomicU64,
    dropped_ticks: AtomicU64,
    dropped_events: AtomicU64,
}

/// The trading engine. Owns the books, the risk gate, the quoter, the
/// scanner, the rings, and the worker threads.
pub struct Engine {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Assemble an engine from its parts. Most callers go through
    /// [`EngineBuilder`](crate::EngineBuilder) instead.
    pub fn new(
        settings: EngineSettings,
        limits: RiskLimits,
        quoter: Box<dyn Quoter>,
        arb_config: ArbConfig,
        client: Arc<dyn ExchangeClient>,
    ) -> Self {
        let symbol = settings.symbol;
        let shared = Arc::new(Shared {
            settings,
            running: AtomicBool::new(false),
            trading_enabled: AtomicBool::new(false),
            tick_ring: SpscRing::new(),
            order_ring: MpmcRing::new(),
            trade_ring: MpmcRing::new(),
            scan_ring: SpscRing::new(),
            book: Mutex::new(OrderBook::new(symbol)),
            consolidated: ConsolidatedBook::new(symbol),
            risk: RiskGate::new(limits),
            quoter: Mutex::new(quoter),
            scanner: ArbScanner::new(arb_config),
            client,
            client_order_seq: AtomicU64::new(1),
            ticks_processed: AtomicU64::new(0),
            orders_sent: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            dropped_ticks: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        });
        Self {
            shared,
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Wire callbacks, connect, subscribe, spawn the workers, and enable
    /// the strategy. Calling `start` on a running engine logs a warning and
    /// returns.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("engine already running");
            return Ok(());
        }
        let shared = &self.shared;
        tracing::info!(
            symbol = %shared.settings.symbol,
            exchange = %shared.settings.exchange,
            adapter = shared.client.name(),
            "starting engine"
        );

        // Kill switch: close the admission gate first, then sweep the book.
        // The adapter serializes the sweep against any in-flight send.
        let weak = Arc::downgrade(&self.shared);
        shared.risk.set_kill_switch_callback(Box::new(move |reason| {
            if let Some(shared) = weak.upgrade() {
                shared.trading_enabled.store(false, Ordering::SeqCst);
                tracing::error!(reason, "kill switch: cancelling all open orders");
                shared.client.cancel_all_orders(shared.settings.symbol);
            }
        }));

        shared.client.set_callbacks(self.make_callbacks());

        if !shared.client.connect() {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(EngineError::ConnectFailed(shared.settings.exchange));
        }
        shared
            .client
            .subscribe_orderbook(shared.settings.symbol, shared.settings.depth_levels);
        shared.client.subscribe_trades(shared.settings.symbol);

        let mut threads = self.threads.lock();
        for (name, body) in [
            ("market-data", market_data_loop as fn(Arc<Shared>)),
            ("strategy", strategy_loop as fn(Arc<Shared>)),
            ("order", order_loop as fn(Arc<Shared>)),
            ("risk", risk_loop as fn(Arc<Shared>)),
        ] {
            let shared = Arc::clone(&self.shared);
            match std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || body(shared))
            {
                Ok(handle) => threads.push(handle),
                Err(source) => {
                    // Unwind the partial start: stop the threads already
                    // spawned and refuse to run.
                    self.shared.running.store(false, Ordering::SeqCst);
                    for handle in threads.drain(..) {
                        let _ = handle.join();
                    }
                    self.shared.client.disconnect();
                    return Err(EngineError::Spawn { name, source });
                }
            }
        }

        shared.quoter.lock().set_enabled(true);
        tracing::info!("engine started");
        Ok(())
    }

    /// Disable the strategy, cancel open orders, stop and join the
    /// workers, and disconnect.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let shared = &self.shared;
        tracing::info!("stopping engine");

        shared.trading_enabled.store(false, Ordering::SeqCst);
        shared.quoter.lock().set_enabled(false);
        shared.client.cancel_all_orders(shared.settings.symbol);

        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
        // A send in flight on the strategy thread can land behind the first
        // sweep; with the workers joined, a second sweep is conclusive.
        shared.client.cancel_all_orders(shared.settings.symbol);
        shared.client.disconnect();

        tracing::info!(
            ticks = shared.ticks_processed.load(Ordering::Relaxed),
            orders = shared.orders_sent.load(Ordering::Relaxed),
            trades = shared.trades_executed.load(Ordering::Relaxed),
            dropped_ticks = shared.dropped_ticks.load(Ordering::Relaxed),
            "engine stopped"
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Risk-check and dispatch an order on the calling thread. Returns the
    /// venue-assigned id, or [`OrderId::NONE`] on any refusal.
    pub fn send_order(&self, order: Order) -> OrderId {
        let reference = self.shared.book.lock().mid_price();
        submit_order(&self.shared, order, reference)
    }

    /// Cancel one order through the adapter and retire it from the gate.
    pub fn cancel_order(&self, exchange_order_id: OrderId) -> bool {
        cancel_order(&self.shared, exchange_order_id)
    }

    // ── Observability ──────────────────────────────────────────────────

    pub fn risk(&self) -> &RiskGate {
        &self.shared.risk
    }

    pub fn scanner(&self) -> &ArbScanner {
        &self.shared.scanner
    }

    pub fn consolidated_book(&self) -> &ConsolidatedBook {
        &self.shared.consolidated
    }

    /// Primary-book midpoint, if both sides are present.
    pub fn book_mid(&self) -> Option<Price> {
        self.shared.book.lock().mid_price()
    }

    pub fn ticks_processed(&self) -> u64 {
        self.shared.ticks_processed.load(Ordering::Relaxed)
    }

    pub fn orders_sent(&self) -> u64 {
        self.shared.orders_sent.load(Ordering::Relaxed)
    }

    pub fn trades_executed(&self) -> u64 {
        self.shared.trades_executed.load(Ordering::Relaxed)
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.shared.dropped_ticks.load(Ordering::Relaxed)
    }

    fn make_callbacks(&self) -> ExchangeCallbacks {
        let on_tick = {
            let weak = Arc::downgrade(&self.shared);
            Arc::new(move |tick: Tick| {
                if let Some(shared) = weak.upgrade() {
                    if shared.tick_ring.try_push(tick).is_err() {
                        note_drop(&shared.dropped_ticks, "tick");
                    }
                }
            })
        };
        let on_order_update = {
            let weak = Arc::downgrade(&self.shared);
            Arc::new(move |order: Order| {
                if let Some(shared) = weak.upgrade() {
                    if shared.order_ring.try_push(order).is_err() {
                        note_drop(&shared.dropped_events, "order update");
                    }
                }
            })
        };
        let on_trade = {
            let weak = Arc::downgrade(&self.shared);
            Arc::new(move |trade: Trade| {
                if let Some(shared) = weak.upgrade() {
                    if shared.trade_ring.try_push(trade).is_err() {
                        note_drop(&shared.dropped_events, "trade");
                    }
                }
            })
        };
        let on_error = {
            let weak = Arc::downgrade(&self.shared);
            Arc::new(move |message: &str| {
                tracing::error!(message, "adapter error");
                if let Some(shared) = weak.upgrade() {
                    shared.risk.note_error();
                }
            })
        };
        let on_connected = {
            let weak = Arc::downgrade(&self.shared);
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    tracing::info!("adapter connected, trading enabled");
                    shared.trading_enabled.store(true, Ordering::SeqCst);
                }
            })
        };
        let on_disconnected = {
            let weak = Arc::downgrade(&self.shared);
            Arc::new(move || {
                if let Some(shared) = weak.upgrade() {
                    tracing::warn!("adapter disconnected, trading disabled");
                    shared.trading_enabled.store(false, Ordering::SeqCst);
                }
            })
        };

        ExchangeCallbacks {
            on_tick: Some(on_tick),
            on_order_update: Some(on_order_update),
            on_trade: Some(on_trade),
            on_error: Some(on_error),
            on_connected: Some(on_connected),
            on_disconnected: Some(on_disconnected),
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn note_drop(counter: &AtomicU64, what: &str) {
    let dropped = counter.fetch_add(1, Ordering::Relaxed) + 1;
    if dropped % DROP_WARN_EVERY == 0 {
        tracing::warn!(dropped, "{what} ring full, events shed");
    }
}

/// The admission path: risk gate, then adapter dispatch, then registration.
/// Runs on the calling thread.
fn submit_order(shared: &Shared, mut order: Order, reference: Option<Price>) -> OrderId {
    order.client_id = OrderId(shared.client_order_seq.fetch_add(1, Ordering::Relaxed));

    if let Err(violation) = shared.risk.check_order(&order, reference) {
        tracing::warn!(
            client_id = %order.client_id,
            %violation,
            "order refused pre-trade"
        );
        return OrderId::NONE;
    }
    if !shared.trading_enabled.load(Ordering::Relaxed) {
        return OrderId::NONE;
    }

    let request = OrderRequest {
        symbol: order.symbol,
        side: order.side,
        order_type: order.order_type,
        tif: order.tif,
        price: order.price,
        quantity: order.quantity,
        client_order_id: order.client_id,
    };
    let response = shared.client.send_order(&request);
    if !response.success {
        tracing::warn!(
            client_id = %order.client_id,
            error = response.error.as_deref().unwrap_or("unspecified"),
            "adapter refused order"
        );
        return OrderId::NONE;
    }

    order.id = response.exchange_order_id;
    shared.risk.on_order_sent(&order);
    shared.orders_sent.fetch_add(1, Ordering::Relaxed);
    order.id
}

fn cancel_order(shared: &Shared, exchange_order_id: OrderId) -> bool {
    let request = CancelRequest {
        symbol: shared.settings.symbol,
        exchange_order_id,
        client_order_id: OrderId::NONE,
    };
    let response = shared.client.cancel_order(&request);
    if response.success {
        shared.risk.on_order_canceled(exchange_order_id);
    }
    response.success
}

// ── Worker threads ─────────────────────────────────────────────────────

fn market_data_loop(shared: Arc<Shared>) {
    tracing::debug!("market data thread started");
    while shared.running.load(Ordering::Relaxed) {
        match shared.tick_ring.try_pop() {
            Some(tick) => {
                shared.ticks_processed.fetch_add(1, Ordering::Relaxed);
                // The primary book and the mark price track the quoting
                // venue; other venues feed only the consolidated view.
                if tick.exchange == shared.settings.exchange {
                    let mut book = shared.book.lock();
                    book.apply_tick(&tick);
                    if let Some(mid) = book.mid_price() {
                        shared.risk.update_mark_price(shared.settings.symbol, mid);
                    }
                }
                shared.consolidated.apply_tick(&tick);
                if shared.settings.arb_enabled && shared.scan_ring.try_push(ScanEvent).is_err() {
                    note_drop(&shared.dropped_events, "scan");
                }
            }
            None => std::thread::sleep(Duration::from_micros(10)),
        }
    }
    tracing::debug!("market data thread stopped");
}

fn strategy_loop(shared: Arc<Shared>) {
    tracing::debug!("strategy thread started");
    while shared.running.load(Ordering::Relaxed) {
        // Drain pending scan events; one sweep covers the batch.
        let mut scan = false;
        while shared.scan_ring.try_pop().is_some() {
            scan = true;
        }
        if scan {
            shared.scanner.on_book_update(&shared.consolidated);
        }

        if !shared.trading_enabled.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }

        let position = shared.risk.position_qty(shared.settings.symbol);
        let decision = {
            let mut quoter = shared.quoter.lock();
            if !quoter.is_enabled() {
                drop(quoter);
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
            let book = shared.book.lock();
            let fair_value = book.mid_price().map(|p| p.to_f64()).unwrap_or(0.0);
            let inventory_pressure = if shared.settings.max_position.is_zero() {
                0.0
            } else {
                position.raw() as f64 / shared.settings.max_position.raw() as f64
            };
            let signal = Signal {
                fair_value,
                inventory_pressure,
                timestamp: Timestamp::now(),
                ..Signal::default()
            };
            quoter.compute_quotes(&book, position, &signal)
        };

        if decision.should_quote {
            let reference = Some(Price::midpoint(decision.bid_price, decision.ask_price));
            for (side, price, size) in [
                (Side::Buy, decision.bid_price, decision.bid_size),
                (Side::Sell, decision.ask_price, decision.ask_size),
            ] {
                if size.is_zero() || !price.is_positive() {
                    continue;
                }
                let mut order = Order::limit(
                    shared.settings.symbol,
                    shared.settings.exchange,
                    side,
                    price,
                    size,
                    TimeInForce::Gtx,
                );
                order.order_type = OrderType::LimitMaker;
                let id = submit_order(&shared, order, reference);
                if !id.is_none() {
                    shared.quoter.lock().on_quote_placed(side, id, price);
                }
            }
        }

        std::thread::sleep(Duration::from_micros(shared.settings.quote_refresh_us));
    }
    tracing::debug!("strategy thread stopped");
}

fn order_loop(shared: Arc<Shared>) {
    tracing::debug!("order thread started");
    while shared.running.load(Ordering::Relaxed) {
        let mut progress = false;

        if let Some(update) = shared.order_ring.try_pop() {
            progress = true;
            match update.status {
                OrderStatus::Canceled | OrderStatus::Expired => {
                    shared.risk.on_order_canceled(update.id);
                    shared.quoter.lock().on_cancel(update.id);
                }
                OrderStatus::Rejected => {
                    shared.risk.on_order_rejected(update.id);
                    shared.quoter.lock().on_reject(update.id);
                }
                // Fills arrive through the trade ring.
                _ => {}
            }
        }

        if let Some(trade) = shared.trade_ring.try_pop() {
            progress = true;
            shared.trades_executed.fetch_add(1, Ordering::Relaxed);
            shared.risk.on_order_filled(
                trade.order_id,
                shared.settings.symbol,
                trade.side,
                trade.quantity,
                trade.price,
            );
            shared
                .quoter
                .lock()
                .on_fill(trade.order_id, trade.side, trade.quantity, trade.price);
        }

        if !progress {
            std::thread::sleep(Duration::from_micros(100));
        }
    }
    tracing::debug!("order thread stopped");
}

fn risk_loop(shared: Arc<Shared>) {
    tracing::debug!("risk thread started");
    let mut iterations = 0u64;
    while shared.running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
        iterations += 1;
        if iterations % 100 == 0 {
            tracing::info!(
                daily_pnl = shared.risk.daily_pnl(),
                exposure = shared.risk.total_exposure(),
                open_orders = shared.risk.open_order_count(),
                rejected = shared.risk.orders_rejected(),
                "risk monitor"
            );
        }
    }
    tracing::debug!("risk thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperClient;
    use xmm_strategy::{BasicQuoter, QuoterParams};

    fn px(v: f64) -> Price {
        Price::from_f64(v)
    }

    fn qty(v: f64) -> Quantity {
        Quantity::from_f64(v)
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            symbol: Symbol::new("BTCUSDT"),
            exchange: ExchangeId::Binance,
            depth_levels: 20,
            quote_refresh_us: 1_000,
            max_position: qty(1.0),
            arb_enabled: false,
        }
    }

    fn make_engine(client: Arc<PaperClient>) -> Engine {
        let quoter = Box::new(BasicQuoter::new(QuoterParams {
            max_position: qty(1.0),
            default_order_size: qty(0.01),
            min_quote_life_us: 0,
            ..QuoterParams::default()
        }));
        Engine::new(
            settings(),
            RiskLimits::default(),
            quoter,
            ArbConfig::default(),
            client,
        )
    }

    #[test]
    fn test_start_is_idempotent() {
        let client = Arc::new(PaperClient::new(ExchangeId::Binance));
        let engine = make_engine(client);
        engine.start().unwrap();
        assert!(engine.is_running());
        // A second start is a warning, not an error.
        engine.start().unwrap();
        engine.stop();
        assert!(!engine.is_running());
        // A second stop is a no-op.
        engine.stop();
    }

    #[test]
    fn test_send_order_registers_with_gate() {
        let client = Arc::new(PaperClient::new(ExchangeId::Binance));
        let engine = make_engine(Arc::clone(&client));
        engine.start().unwrap();

        let order = Order::limit(
            Symbol::new("BTCUSDT"),
            ExchangeId::Binance,
            Side::Buy,
            px(100.0),
            qty(0.01),
            TimeInForce::Gtc,
        );
        let id = engine.send_order(order);
        assert!(!id.is_none());
        assert_eq!(engine.orders_sent(), 1);
        assert_eq!(engine.risk().open_order_count(), 1);

        engine.stop();
    }

    #[test]
    fn test_send_order_refused_by_gate_returns_none() {
        let client = Arc::new(PaperClient::new(ExchangeId::Binance));
        let engine = make_engine(Arc::clone(&client));
        engine.start().unwrap();
        engine.risk().activate_kill_switch("test");

        let order = Order::limit(
            Symbol::new("BTCUSDT"),
            ExchangeId::Binance,
            Side::Buy,
            px(100.0),
            qty(0.01),
            TimeInForce::Gtc,
        );
        assert!(engine.send_order(order).is_none());
        assert_eq!(engine.orders_sent(), 0);

        engine.stop();
    }

    #[test]
    fn test_kill_switch_cancels_open_orders() {
        let client = Arc::new(PaperClient::new(ExchangeId::Binance));
        let engine = make_engine(Arc::clone(&client));
        engine.start().unwrap();

        // With no ticks fed the book stays empty, so the strategy thread
        // declines and this resting order is the only one on the venue.
        let order = Order::limit(
            Symbol::new("BTCUSDT"),
            ExchangeId::Binance,
            Side::Buy,
            px(98.0),
            qty(0.01),
            TimeInForce::Gtc,
        );
        assert!(!engine.send_order(order).is_none());
        assert_eq!(client.resting_count(), 1);

        engine.risk().activate_kill_switch("unit test");
        assert_eq!(client.resting_count(), 0, "cancel-all must sweep the venue");

        engine.stop();
    }
}
