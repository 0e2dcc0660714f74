//! # xmm-book
//!
//! Order book state for the XMM engine: a per-venue L2/L3 [`OrderBook`] and
//! the multi-venue [`ConsolidatedBook`] with NBBO, per-level venue
//! attribution, and cross-venue arbitrage signals.

pub mod consolidated;
pub mod orderbook;

pub use consolidated::{
    ArbitrageOpportunity, ConsolidatedBook, ConsolidatedBookManager, ConsolidatedLevel,
    Contribution, ExchangeBook, Nbbo,
};
pub use orderbook::{BookError, OrderBook, PriceLevel};
