//! # xmm-strategy
//!
//! Market-making quote generation: the [`Quoter`] capability, the shared
//! [`QuoterCore`] state, and the strategy family built on it (basic,
//! inventory-adjusted, Avellaneda–Stoikov, and cross-venue).

pub mod quoters;
pub mod signal;
pub mod traits;

pub use quoters::basic::BasicQuoter;
pub use quoters::cross_venue::{
    CrossVenueDecision, CrossVenueParams, CrossVenuePosition, CrossVenueQuoter, VenueQuote,
};
pub use quoters::inventory::InventoryQuoter;
pub use quoters::stoikov::{StoikovParams, StoikovQuoter};
pub use signal::{Ema, Signal};
pub use traits::{DeclineReason, QuoteDecision, Quoter, QuoterCore, QuoterParams};
