//! The strategy family: basic, inventory-adjusted, Avellaneda–Stoikov, and
//! cross-venue quoters, all composed over [`QuoterCore`](crate::QuoterCore).

pub mod basic;
pub mod cross_venue;
pub mod inventory;
pub mod stoikov;
