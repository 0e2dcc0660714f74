//! Order-related types: venue identifiers, side, order type, time in force,
//! status, and the cache-line-padded [`Order`] record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::price::Price;
use super::quantity::Quantity;
use super::symbol::Symbol;
use super::timestamp::Timestamp;

/// Maximum number of venues addressable by [`ExchangeId`].
pub const MAX_VENUES: usize = 16;

/// Supported venues. Discriminants index fixed-size per-venue arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ExchangeId {
    Unknown = 0,
    Binance = 1,
    Bybit = 2,
    Okx = 3,
    Coinbase = 4,
    Kraken = 5,
    Kucoin = 6,
    Huobi = 7,
    Gate = 8,
}

impl ExchangeId {
    /// Index into `MAX_VENUES`-sized arrays.
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Venue name in lowercase, matching configuration spelling.
    pub const fn name(&self) -> &'static str {
        match self {
            ExchangeId::Unknown => "unknown",
            ExchangeId::Binance => "binance",
            ExchangeId::Bybit => "bybit",
            ExchangeId::Okx => "okx",
            ExchangeId::Coinbase => "coinbase",
            ExchangeId::Kraken => "kraken",
            ExchangeId::Kucoin => "kucoin",
            ExchangeId::Huobi => "huobi",
            ExchangeId::Gate => "gate",
        }
    }

    /// All addressable venues, in discriminant order.
    pub const ALL: [ExchangeId; 8] = [
        ExchangeId::Binance,
        ExchangeId::Bybit,
        ExchangeId::Okx,
        ExchangeId::Coinbase,
        ExchangeId::Kraken,
        ExchangeId::Kucoin,
        ExchangeId::Huobi,
        ExchangeId::Gate,
    ];
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when an exchange name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownExchange(pub String);

impl fmt::Display for UnknownExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown exchange: {}", self.0)
    }
}

impl std::error::Error for UnknownExchange {}

impl FromStr for ExchangeId {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "bybit" => Ok(ExchangeId::Bybit),
            "okx" => Ok(ExchangeId::Okx),
            "coinbase" => Ok(ExchangeId::Coinbase),
            "kraken" => Ok(ExchangeId::Kraken),
            "kucoin" => Ok(ExchangeId::Kucoin),
            "huobi" => Ok(ExchangeId::Huobi),
            "gate" => Ok(ExchangeId::Gate),
            other => Err(UnknownExchange(other.to_string())),
        }
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// The opposite side, used for hedging and covering.
    #[inline]
    pub const fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderType {
    /// Limit order at a specified price.
    Limit = 0,
    /// Market order, fills at the best available price.
    Market = 1,
    /// Post-only limit order, rejected if it would take liquidity.
    LimitMaker = 2,
    /// Immediate-or-cancel.
    Ioc = 3,
    /// Fill-or-kill.
    Fok = 4,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimeInForce {
    /// Good till cancel.
    Gtc = 0,
    /// Immediate or cancel.
    Ioc = 1,
    /// Fill or kill.
    Fok = 2,
    /// Good till crossing (post-only).
    Gtx = 3,
}

/// Order lifecycle status as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    New = 0,
    PartiallyFilled = 1,
    Filled = 2,
    Canceled = 3,
    Rejected = 4,
    Expired = 5,
}

impl OrderStatus {
    /// `true` while the order can still trade.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// Opaque 64-bit order identifier. Client ids are assigned monotonically by
/// the engine; exchange ids by the venue adapter. Zero means "none".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    pub const NONE: OrderId = OrderId(0);

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An order record, padded to a cache-line multiple so it never straddles a
/// line inside a ring slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(C, align(64))]
pub struct Order {
    /// Exchange-assigned identifier (zero until acknowledged).
    pub id: OrderId,
    /// Engine-assigned monotonic client identifier.
    pub client_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub filled_qty: Quantity,
    pub timestamp: Timestamp,
    pub symbol: Symbol,
    pub exchange: ExchangeId,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub tif: TimeInForce,
}

// Layout guard: the record must tile exactly onto cache lines.
const _: () = assert!(std::mem::size_of::<Order>() % 64 == 0);
const _: () = assert!(std::mem::align_of::<Order>() == 64);

impl Order {
    /// Build a fresh limit order in the `New` state.
    pub fn limit(
        symbol: Symbol,
        exchange: ExchangeId,
        side: Side,
        price: Price,
        quantity: Quantity,
        tif: TimeInForce,
    ) -> Self {
        Self {
            id: OrderId::NONE,
            client_id: OrderId::NONE,
            price,
            quantity,
            filled_qty: Quantity::ZERO,
            timestamp: Timestamp::now(),
            symbol,
            exchange,
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::New,
            tif,
        }
    }

    /// Unfilled remainder: `quantity - filled_qty`.
    #[inline]
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled_qty
    }

    /// `true` while the order can still trade.
    #[inline]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
