//! The venue adapter capability.
//!
//! Wire codecs, transport, and signing live behind this trait in external
//! adapter crates. All operations are synchronous; adapters deliver market
//! data and execution events on their own threads through the registered
//! [`ExchangeCallbacks`], which must do nothing but thread-safe enqueues.

use std::sync::Arc;

use xmm_core::types::{
    ExchangeId, Order, OrderId, OrderType, Price, Quantity, Side, Symbol, Tick, TimeInForce,
    Timestamp, Trade,
};

/// A new order handed to the adapter.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub price: Price,
    pub quantity: Quantity,
    /// Engine-assigned, monotonic.
    pub client_order_id: OrderId,
}

/// Adapter response to an order submission. A refusal is a value, not an
/// error: `success = false` with a reason.
#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub success: bool,
    pub exchange_order_id: OrderId,
    pub client_order_id: OrderId,
    pub error: Option<String>,
    pub exchange_ts: Timestamp,
}

impl OrderResponse {
    pub fn refused(client_order_id: OrderId, error: impl Into<String>) -> Self {
        Self {
            success: false,
            exchange_order_id: OrderId::NONE,
            client_order_id,
            error: Some(error.into()),
            exchange_ts: Timestamp::ZERO,
        }
    }
}

/// A cancel request by exchange order id.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub symbol: Symbol,
    pub exchange_order_id: OrderId,
    pub client_order_id: OrderId,
}

/// Adapter response to a cancel.
#[derive(Debug, Clone)]
pub struct CancelResponse {
    pub success: bool,
    pub exchange_order_id: OrderId,
    pub error: Option<String>,
}

/// Event sinks registered by the engine before the adapter connects.
///
/// Each callback runs on the adapter's thread; implementations must only
/// enqueue into the engine's rings.
#[derive(Clone, Default)]
pub struct ExchangeCallbacks {
    pub on_tick: Option<Arc<dyn Fn(Tick) + Send + Sync>>,
    pub on_order_update: Option<Arc<dyn Fn(Order) + Send + Sync>>,
    pub on_trade: Option<Arc<dyn Fn(Trade) + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_connected: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_disconnected: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl std::fmt::Debug for ExchangeCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCallbacks")
            .field("on_tick", &self.on_tick.is_some())
            .field("on_order_update", &self.on_order_update.is_some())
            .field("on_trade", &self.on_trade.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Synchronous venue adapter contract.
///
/// Implementations must be `Send + Sync` and internally serialize order
/// entry: `send_order` from the strategy thread can race
/// `cancel_all_orders` from the kill-switch path, and the adapter's
/// internal ordering decides which lands first.
pub trait ExchangeClient: Send + Sync {
    // Connection management
    fn connect(&self) -> bool;
    fn disconnect(&self);
    fn is_connected(&self) -> bool;

    // Market data subscriptions
    fn subscribe_orderbook(&self, symbol: Symbol, depth: usize) -> bool;
    fn subscribe_trades(&self, symbol: Symbol) -> bool;
    fn subscribe_ticker(&self, symbol: Symbol) -> bool;
    fn unsubscribe(&self, symbol: Symbol) -> bool;

    // Order management
    fn send_order(&self, request: &OrderRequest) -> OrderResponse;
    fn cancel_order(&self, request: &CancelRequest) -> CancelResponse;
    fn cancel_all_orders(&self, symbol: Symbol) -> CancelResponse;

    // Account queries
    fn get_balance(&self, asset: &str) -> f64;
    fn get_open_orders(&self, symbol: Symbol) -> Vec<Order>;
    fn server_time(&self) -> Timestamp;

    // Event wiring; must happen before `connect`.
    fn set_callbacks(&self, callbacks: ExchangeCallbacks);

    fn name(&self) -> &'static str;
    fn exchange_id(&self) -> ExchangeId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_object_safe() {
        fn _assert(_client: &dyn ExchangeClient) {}
    }

    #[test]
    fn test_refused_response() {
        let resp = OrderResponse::refused(OrderId(9), "rate limited");
        assert!(!resp.success);
        assert!(resp.exchange_order_id.is_none());
        assert_eq!(resp.client_order_id, OrderId(9));
        assert_eq!(resp.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_callbacks_default_empty() {
        let callbacks = ExchangeCallbacks::default();
        assert!(callbacks.on_tick.is_none());
        assert!(callbacks.on_order_update.is_none());
        assert!(callbacks.on_trade.is_none());
        assert!(callbacks.on_error.is_none());
        assert!(callbacks.on_connected.is_none());
        assert!(callbacks.on_disconnected.is_none());
    }

    #[test]
    fn test_callbacks_debug_shows_presence() {
        let mut callbacks = ExchangeCallbacks::default();
        callbacks.on_tick = Some(Arc::new(|_tick| {}));
        let debug = format!("{callbacks:?}");
        assert!(debug.contains("on_tick: true"));
        assert!(debug.contains("on_trade: false"));
    }
}
