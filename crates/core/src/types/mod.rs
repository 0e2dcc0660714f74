//! Core types for the XMM trading engine.
//!
//! Everything here is designed for the hot path: prices and quantities are
//! fixed-point `i64` values at a single global scale, timestamps are raw
//! monotonic nanoseconds, symbols are inline 16-byte values, and the order
//! and tick records are padded to cache-line multiples so they never straddle
//! a line inside a ring slot.

pub mod market_data;
pub mod order;
pub mod price;
pub mod quantity;
pub mod symbol;
pub mod timestamp;

pub use market_data::{Tick, Trade};
pub use order::{
    ExchangeId, Order, OrderId, OrderStatus, OrderType, Side, TimeInForce, MAX_VENUES,
};
pub use price::Price;
pub use quantity::Quantity;
pub use symbol::Symbol;
pub use timestamp::Timestamp;
