//! Market data records: top-of-book ticks and execution reports.
//!
//! Both types are `Copy` and padded to cache-line multiples; they are copied
//! by value into ring slots on the ingestion path, never aliased.

use serde::{Deserialize, Serialize};

use super::order::{ExchangeId, OrderId, Side};
use super::price::Price;
use super::quantity::Quantity;
use super::timestamp::Timestamp;

/// Top-of-book tick from a single venue.
///
/// Carries both the venue-reported time (`exchange_ts`) and the local
/// ingestion time (`local_ts`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(C, align(64))]
pub struct Tick {
    pub bid: Price,
    pub ask: Price,
    pub bid_qty: Quantity,
    pub ask_qty: Quantity,
    pub last_price: Price,
    pub last_qty: Quantity,
    /// Venue-reported event time.
    pub exchange_ts: Timestamp,
    /// Local ingestion time.
    pub local_ts: Timestamp,
    /// Venue sequence number; totally orders updates from one venue.
    pub sequence: u64,
    pub exchange: ExchangeId,
}

const _: () = assert!(std::mem::size_of::<Tick>() % 64 == 0);
const _: () = assert!(std::mem::align_of::<Tick>() == 64);

impl Tick {
    /// Midpoint of bid and ask, truncating toward zero.
    #[inline]
    pub const fn mid_price(&self) -> Price {
        Price::midpoint(self.bid, self.ask)
    }

    /// Quoted spread: `ask - bid`.
    #[inline]
    pub fn spread(&self) -> Price {
        self.ask - self.bid
    }

    /// A tick is valid when both sides are positive and not crossed.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.bid.raw() > 0 && self.ask.raw() > 0 && self.bid.raw() < self.ask.raw()
    }
}

/// An execution report for one of our orders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(C, align(64))]
pub struct Trade {
    /// Exchange order id the fill belongs to.
    pub order_id: OrderId,
    /// Venue-assigned trade id.
    pub trade_id: u64,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
    pub exchange: ExchangeId,
    pub side: Side,
    /// `true` when our order was the resting (maker) side.
    pub is_maker: bool,
}

const _: () = assert!(std::mem::size_of::<Trade>() % 64 == 0);
