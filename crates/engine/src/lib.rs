//! # xmm-engine
//!
//! The engine binds market-data ingress, strategy evaluation, order egress,
//! and risk monitoring onto independent worker threads coordinated only
//! through lock-free rings. Venue connectivity is abstracted behind the
//! synchronous [`ExchangeClient`] capability; [`PaperClient`] provides an
//! in-process simulator for paper trading and tests.

pub mod builder;
pub mod client;
pub mod engine;
pub mod paper;

pub use builder::EngineBuilder;
pub use client::{
    CancelRequest, CancelResponse, ExchangeCallbacks, ExchangeClient, OrderRequest, OrderResponse,
};
pub use engine::{Engine, EngineError, EngineSettings};
pub use paper::PaperClient;
