//! # xmm-arb
//!
//! Arbitrage detection over the consolidated book: the cross-venue
//! [`ArbScanner`] and the single-venue [`TriangularScanner`].

pub mod scanner;
pub mod triangular;

pub use scanner::{ArbConfig, ArbScanner};
pub use triangular::{TriangularConfig, TriangularOpportunity, TriangularScanner};
