//! Baseline market maker: symmetric quotes around the mid with linear
//! inventory skew.

use xmm_book::OrderBook;
use xmm_core::types::Quantity;

use crate::signal::Signal;
use crate::traits::{QuoteDecision, Quoter, QuoterCore, QuoterParams};

/// Quotes `mid ± half_spread`, shifted by the linear inventory skew.
pub struct BasicQuoter {
    core: QuoterCore,
}

impl BasicQuoter {
    pub fn new(params: QuoterParams) -> Self {
        Self {
            core: QuoterCore::new(params),
        }
    }
}

impl Quoter for BasicQuoter {
    fn core(&self) -> &QuoterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut QuoterCore {
        &mut self.core
    }

    fn compute_quotes(
        &mut self,
        book: &OrderBook,
        position: Quantity,
        signal: &Signal,
    ) -> QuoteDecision {
        let skew = self.core.linear_skew(position);
        self.core.quote_around_mid(book, position, signal, skew)
    }

    fn name(&self) -> &'static str {
        "basic_mm"
    }
}
