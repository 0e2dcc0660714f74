//! # xmm-transport
//!
//! Inter-thread transport for the XMM hot path: bounded single-producer/
//! single-consumer and multi-producer/multi-consumer rings, and a
//! fixed-capacity slab pool.
//!
//! All three primitives share the same failure discipline: a full ring or an
//! exhausted pool reports "not admitted" through the return value. Nothing
//! here blocks, allocates after construction, or panics on the steady state.

pub mod mpmc;
pub mod slab;
pub mod spsc;

pub use mpmc::MpmcRing;
pub use slab::{PoolRef, SlabPool};
pub use spsc::SpscRing;
