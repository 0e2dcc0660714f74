//! # xmm-core
//!
//! Shared types and utilities for the XMM cross-exchange market-making
//! engine.
//!
//! This crate provides the foundational building blocks used across the
//! workspace: fixed-point price/quantity types at a single 10^8 scale,
//! monotonic nanosecond timestamps, the inline symbol type, order and market
//! data records sized for the lock-free rings, layered configuration, and
//! tracing initialization.

pub mod config;
pub mod logging;
pub mod types;
