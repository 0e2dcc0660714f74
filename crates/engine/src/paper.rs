//! In-process paper-trading venue.
//!
//! [`PaperClient`] implements the [`ExchangeClient`] contract against its
//! own top-of-book state: orders that cross fill immediately as taker,
//! post-only orders that would cross are refused, and resting orders fill
//! as maker when a later tick crosses them. Fills and cancels are delivered
//! through the registered callbacks exactly like a live adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use xmm_core::types::{
    ExchangeId, Order, OrderId, OrderStatus, OrderType, Price, Quantity, Side, Symbol, Tick,
    TimeInForce, Timestamp, Trade,
};

use crate::client::{
    CancelRequest, CancelResponse, ExchangeCallbacks, ExchangeClient, OrderRequest, OrderResponse,
};

#[derive(Debug, Clone)]
struct RestingOrder {
    client_order_id: OrderId,
    symbol: Symbol,
    side: Side,
    price: Price,
    remaining: Quantity,
}

/// Simulated venue with immediate and resting fills.
pub struct PaperClient {
    exchange: ExchangeId,
    connected: AtomicBool,
    next_order_id: AtomicU64,
    next_trade_id: AtomicU64,
    callbacks: Mutex<ExchangeCallbacks>,
    /// Resting orders keyed by exchange order id.
    resting: Mutex<HashMap<u64, RestingOrder>>,
    best_bid: Mutex<Option<(Price, Quantity)>>,
    best_ask: Mutex<Option<(Price, Quantity)>>,
}

impl PaperClient {
    pub fn new(exchange: ExchangeId) -> Self {
        Self {
            exchange,
            connected: AtomicBool::new(false),
            next_order_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
            callbacks: Mutex::new(ExchangeCallbacks::default()),
            resting: Mutex::new(HashMap::new()),
            best_bid: Mutex::new(None),
            best_ask: Mutex::new(None),
        }
    }

    /// Feed a tick: updates the simulated top of book, delivers the tick to
    /// the engine, and fills any resting orders the tick crosses.
    pub fn process_tick(&self, tick: Tick) {
        *self.best_bid.lock() = Some((tick.bid, tick.bid_qty));
        *self.best_ask.lock() = Some((tick.ask, tick.ask_qty));

        if let Some(on_tick) = self.callbacks.lock().on_tick.clone() {
            on_tick(tick);
        }

        self.match_resting(tick);
    }

    /// Number of currently resting orders.
    pub fn resting_count(&self) -> usize {
        self.resting.lock().len()
    }

    fn match_resting(&self, tick: Tick) {
        let mut filled = Vec::new();
        {
            let mut resting = self.resting.lock();
            resting.retain(|&id, order| {
                let crosses = match order.side {
                    Side::Buy => tick.ask <= order.price,
                    Side::Sell => tick.bid >= order.price,
                };
                if crosses {
                    filled.push((id, order.clone()));
                }
                !crosses
            });
        }

        for (id, order) in filled {
            self.emit_fill(OrderId(id), &order, order.price, order.remaining, true);
        }
    }

    fn emit_fill(
        &self,
        exchange_order_id: OrderId,
        order: &RestingOrder,
        price: Price,
        quantity: Quantity,
        is_maker: bool,
    ) {
        let trade = Trade {
            order_id: exchange_order_id,
            trade_id: self.next_trade_id.fetch_add(1, Ordering::Relaxed),
            price,
            quantity,
            timestamp: Timestamp::now(),
            exchange: self.exchange,
            side: order.side,
            is_maker,
        };
        if let Some(on_trade) = self.callbacks.lock().on_trade.clone() {
            on_trade(trade);
        }
    }

    fn emit_cancel(&self, exchange_order_id: OrderId, order: &RestingOrder) {
        let update = Order {
            id: exchange_order_id,
            client_id: order.client_order_id,
            price: order.price,
            quantity: order.remaining,
            filled_qty: Quantity::ZERO,
            timestamp: Timestamp::now(),
            symbol: order.symbol,
            exchange: self.exchange,
            side: order.side,
            order_type: OrderType::Limit,
            status: OrderStatus::Canceled,
            tif: TimeInForce::Gtc,
        };
        if let Some(on_order_update) = self.callbacks.lock().on_order_update.clone() {
            on_order_update(update);
        }
    }
}

impl ExchangeClient for PaperClient {
    fn connect(&self) -> bool {
        self.connected.store(true, Ordering::SeqCst);
        if let Some(on_connected) = self.callbacks.lock().on_connected.clone() {
            on_connected();
        }
        true
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(on_disconnected) = self.callbacks.lock().on_disconnected.clone() {
            on_disconnected();
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe_orderbook(&self, _symbol: Symbol, _depth: usize) -> bool {
        self.is_connected()
    }

    fn subscribe_trades(&self, _symbol: Symbol) -> bool {
        self.is_connected()
    }

    fn subscribe_ticker(&self, _symbol: Symbol) -> bool {
        self.is_connected()
    }

    fn unsubscribe(&self, _symbol: Symbol) -> bool {
        true
    }

    fn send_order(&self, request: &OrderRequest) -> OrderResponse {
        if !self.is_connected() {
            return OrderResponse::refused(request.client_order_id, "not connected");
        }

        let best_bid = self.best_bid.lock().map(|(p, _)| p);
        let best_ask = self.best_ask.lock().map(|(p, _)| p);
        let crosses = match request.side {
            Side::Buy => best_ask.is_some_and(|ask| request.price >= ask),
            Side::Sell => best_bid.is_some_and(|bid| request.price <= bid),
        };

        let immediate = match request.order_type {
            OrderType::Market => true,
            OrderType::Limit | OrderType::Ioc | OrderType::Fok => crosses,
            OrderType::LimitMaker => {
                if crosses {
                    // Post-only orders that would take liquidity are refused.
                    return OrderResponse::refused(
                        request.client_order_id,
                        "post-only order would cross",
                    );
                }
                false
            }
        };

        let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
        let exchange_order_id = OrderId(id);
        let resting = RestingOrder {
            client_order_id: request.client_order_id,
            symbol: request.symbol,
            side: request.side,
            price: request.price,
            remaining: request.quantity,
        };

        if immediate {
            let fill_price = match request.side {
                Side::Buy => best_ask.unwrap_or(request.price),
                Side::Sell => best_bid.unwrap_or(request.price),
            };
            self.emit_fill(exchange_order_id, &resting, fill_price, request.quantity, false);
        } else if matches!(request.order_type, OrderType::Ioc | OrderType::Fok) {
            // Unmatched immediate orders expire instead of resting.
            return OrderResponse::refused(request.client_order_id, "no crossing liquidity");
        } else {
            self.resting.lock().insert(id, resting);
        }

        OrderResponse {
            success: true,
            exchange_order_id,
            client_order_id: request.client_order_id,
            error: None,
            exchange_ts: Timestamp::now(),
        }
    }

    fn cancel_order(&self, request: &CancelRequest) -> CancelResponse {
        let removed = self.resting.lock().remove(&request.exchange_order_id.0);
        match removed {
            Some(order) => {
                self.emit_cancel(request.exchange_order_id, &order);
                CancelResponse {
                    success: true,
                    exchange_order_id: request.exchange_order_id,
                    error: None,
                }
            }
            None => CancelResponse {
                success: false,
                exchange_order_id: request.exchange_order_id,
                error: Some("unknown order".to_string()),
            },
        }
    }

    fn cancel_all_orders(&self, symbol: Symbol) -> CancelResponse {
        let drained: Vec<(u64, RestingOrder)> = {
            let mut resting = self.resting.lock();
            let ids: Vec<u64> = resting
                .iter()
                .filter(|(_, o)| o.symbol == symbol)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| resting.remove(&id).map(|o| (id, o)))
                .collect()
        };
        for (id, order) in &drained {
            self.emit_cancel(OrderId(*id), order);
        }
        CancelResponse {
            success: true,
            exchange_order_id: OrderId::NONE,
            error: None,
        }
    }

    fn get_balance(&self, _asset: &str) -> f64 {
        1_000_000.0
    }

    fn get_open_orders(&self, symbol: Symbol) -> Vec<Order> {
        self.resting
            .lock()
            .iter()
            .filter(|(_, o)| o.symbol == symbol)
            .map(|(&id, o)| Order {
                id: OrderId(id),
                client_id: o.client_order_id,
                price: o.price,
                quantity: o.remaining,
                filled_qty: Quantity::ZERO,
                timestamp: Timestamp::now(),
                symbol: o.symbol,
                exchange: self.exchange,
                side: o.side,
                order_type: OrderType::Limit,
                status: OrderStatus::New,
                tif: TimeInForce::Gtc,
            })
            .collect()
    }

    fn server_time(&self) -> Timestamp {
        Timestamp::now()
    }

    fn set_callbacks(&self, callbacks: ExchangeCallbacks) {
        *self.callbacks.lock() = callbacks;
    }

    fn name(&self) -> &'static str {
        "paper"
    }

    fn exchange_id(&self) -> ExchangeId {
        self.exchange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn px(v: f64) -> Price {
        Price::from_f64(v)
    }

    fn qty(v: f64) -> Quantity {
        Quantity::from_f64(v)
    }

    fn sym() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    fn tick(bid: f64, ask: f64) -> Tick {
        Tick {
            bid: px(bid),
            ask: px(ask),
            bid_qty: qty(1.0),
            ask_qty: qty(1.0),
            last_price: px((bid + ask) / 2.0),
            last_qty: qty(0.1),
            exchange_ts: Timestamp::now(),
            local_ts: Timestamp::now(),
            sequence: 1,
            exchange: ExchangeId::Binance,
        }
    }

    fn request(side: Side, order_type: OrderType, price: f64, quantity: f64) -> OrderRequest {
        OrderRequest {
            symbol: sym(),
            side,
            order_type,
            tif: TimeInForce::Gtc,
            price: px(price),
            quantity: qty(quantity),
            client_order_id: OrderId(7),
        }
    }

    fn client_with_trades() -> (PaperClient, Arc<Mutex<Vec<Trade>>>) {
        let client = PaperClient::new(ExchangeId::Binance);
        client.connect();
        let trades = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&trades);
        client.set_callbacks(ExchangeCallbacks {
            on_trade: Some(Arc::new(move |trade| sink.lock().push(trade))),
            ..ExchangeCallbacks::default()
        });
        (client, trades)
    }

    #[test]
    fn test_refuses_when_disconnected() {
        let client = PaperClient::new(ExchangeId::Binance);
        let resp = client.send_order(&request(Side::Buy, OrderType::Limit, 100.0, 1.0));
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("not connected"));
    }

    #[test]
    fn test_market_order_fills_at_touch() {
        let (client, trades) = client_with_trades();
        client.process_tick(tick(99.0, 100.0));

        let resp = client.send_order(&request(Side::Buy, OrderType::Market, 0.0, 0.5));
        assert!(resp.success);

        let trades = trades.lock();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, px(100.0));
        assert_eq!(trades[0].quantity, qty(0.5));
        assert!(!trades[0].is_maker);
        assert_eq!(trades[0].order_id, resp.exchange_order_id);
    }

    #[test]
    fn test_passive_limit_rests_then_fills_as_maker() {
        let (client, trades) = client_with_trades();
        client.process_tick(tick(99.0, 100.0));

        let resp = client.send_order(&request(Side::Buy, OrderType::Limit, 98.5, 1.0));
        assert!(resp.success);
        assert_eq!(client.resting_count(), 1);
        assert!(trades.lock().is_empty());

        // Market trades down through the resting bid.
        client.process_tick(tick(97.0, 98.0));
        assert_eq!(client.resting_count(), 0);
        let trades = trades.lock();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, px(98.5));
        assert!(trades[0].is_maker);
        assert_eq!(trades[0].side, Side::Buy);
    }

    #[test]
    fn test_crossing_limit_fills_immediately() {
        let (client, trades) = client_with_trades();
        client.process_tick(tick(99.0, 100.0));

        let resp = client.send_order(&request(Side::Buy, OrderType::Limit, 100.5, 1.0));
        assert!(resp.success);
        assert_eq!(client.resting_count(), 0);
        // Fills at the touch, not the limit.
        assert_eq!(trades.lock()[0].price, px(100.0));
    }

    #[test]
    fn test_post_only_refused_when_crossing() {
        let (client, trades) = client_with_trades();
        client.process_tick(tick(99.0, 100.0));

        let resp = client.send_order(&request(Side::Buy, OrderType::LimitMaker, 100.5, 1.0));
        assert!(!resp.success);
        assert!(resp.error.as_deref().unwrap().contains("post-only"));
        assert!(trades.lock().is_empty());

        // Passive post-only rests normally.
        let resp = client.send_order(&request(Side::Buy, OrderType::LimitMaker, 98.0, 1.0));
        assert!(resp.success);
        assert_eq!(client.resting_count(), 1);
    }

    #[test]
    fn test_ioc_expires_instead_of_resting() {
        let (client, trades) = client_with_trades();
        client.process_tick(tick(99.0, 100.0));

        let resp = client.send_order(&request(Side::Buy, OrderType::Ioc, 98.0, 1.0));
        assert!(!resp.success);
        assert_eq!(client.resting_count(), 0);
        assert!(trades.lock().is_empty());
    }

    #[test]
    fn test_cancel_emits_order_update() {
        let client = PaperClient::new(ExchangeId::Binance);
        client.connect();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        client.set_callbacks(ExchangeCallbacks {
            on_order_update: Some(Arc::new(move |order| sink.lock().push(order))),
            ..ExchangeCallbacks::default()
        });
        client.process_tick(tick(99.0, 100.0));

        let resp = client.send_order(&request(Side::Sell, OrderType::Limit, 101.0, 1.0));
        assert_eq!(client.resting_count(), 1);

        let cancel = client.cancel_order(&CancelRequest {
            symbol: sym(),
            exchange_order_id: resp.exchange_order_id,
            client_order_id: resp.client_order_id,
        });
        assert!(cancel.success);
        assert_eq!(client.resting_count(), 0);

        let updates = updates.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, OrderStatus::Canceled);
        assert_eq!(updates[0].id, resp.exchange_order_id);
    }

    #[test]
    fn test_cancel_unknown_fails() {
        let client = PaperClient::new(ExchangeId::Binance);
        client.connect();
        let resp = client.cancel_order(&CancelRequest {
            symbol: sym(),
            exchange_order_id: OrderId(404),
            client_order_id: OrderId::NONE,
        });
        assert!(!resp.success);
    }

    #[test]
    fn test_cancel_all_drains_symbol() {
        let client = PaperClient::new(ExchangeId::Binance);
        client.connect();
        client.process_tick(tick(99.0, 100.0));
        client.send_order(&request(Side::Buy, OrderType::Limit, 98.0, 1.0));
        client.send_order(&request(Side::Sell, OrderType::Limit, 101.0, 1.0));
        assert_eq!(client.resting_count(), 2);
        assert_eq!(client.get_open_orders(sym()).len(), 2);

        let resp = client.cancel_all_orders(sym());
        assert!(resp.success);
        assert_eq!(client.resting_count(), 0);
        assert!(client.get_open_orders(sym()).is_empty());
    }

    #[test]
    fn test_connection_callbacks() {
        let client = PaperClient::new(ExchangeId::Binance);
        let connects = Arc::new(AtomicUsize::new(0));
        let disconnects = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&connects);
        let d = Arc::clone(&disconnects);
        client.set_callbacks(ExchangeCallbacks {
            on_connected: Some(Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })),
            on_disconnected: Some(Arc::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })),
            ..ExchangeCallbacks::default()
        });

        assert!(!client.is_connected());
        client.connect();
        assert!(client.is_connected());
        client.disconnect();
        assert!(!client.is_connected());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exchange_ids_monotonic() {
        let (client, _trades) = client_with_trades();
        client.process_tick(tick(99.0, 100.0));
        let a = client.send_order(&request(Side::Buy, OrderType::Limit, 98.0, 1.0));
        let b = client.send_order(&request(Side::Buy, OrderType::Limit, 97.0, 1.0));
        assert!(b.exchange_order_id.0 > a.exchange_order_id.0);
    }
}
