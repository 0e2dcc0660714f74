//! Strategy input signal and small signal-processing helpers.

use xmm_core::types::Timestamp;

/// Snapshot of market and inventory state handed to a quoter on each
/// evaluation. Synthesized by the strategy thread; all fields are unitless
/// or in quote currency.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signal {
    /// Estimated fair value (quote currency).
    pub fair_value: f64,
    /// Recent volatility estimate, as a fraction (0.01 = 1%).
    pub volatility: f64,
    /// Directional momentum in [-1, 1].
    pub momentum: f64,
    /// Inventory pressure: position / max position, in [-1, 1].
    pub inventory_pressure: f64,
    /// Urgency to reduce inventory, in [0, 1].
    pub urgency: f64,
    pub timestamp: Timestamp,
}

/// Exponential moving average over an update span.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    /// `span` is the effective averaging window: `alpha = 2 / (span + 1)`.
    pub fn new(span: usize) -> Self {
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            value: None,
        }
    }

    /// EMA with an explicit smoothing factor in (0, 1].
    pub fn with_alpha(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    /// Fold in a sample and return the updated average. The first sample
    /// seeds the average directly.
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    /// Current average, if any sample has been folded in.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds() {
        let mut ema = Ema::new(10);
        assert!(ema.value().is_none());
        assert_eq!(ema.update(5.0), 5.0);
        assert_eq!(ema.value(), Some(5.0));
    }

    #[test]
    fn test_converges_toward_constant_input() {
        let mut ema = Ema::new(10);
        ema.update(0.0);
        for _ in 0..200 {
            ema.update(10.0);
        }
        assert!((ema.value().unwrap() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_explicit_alpha() {
        let mut ema = Ema::with_alpha(0.5);
        ema.update(0.0);
        assert_eq!(ema.update(10.0), 5.0);
        assert_eq!(ema.update(10.0), 7.5);
    }

    #[test]
    fn test_reset() {
        let mut ema = Ema::new(5);
        ema.update(3.0);
        ema.reset();
        assert!(ema.value().is_none());
        assert_eq!(ema.update(7.0), 7.0);
    }

    #[test]
    fn test_signal_default_is_neutral() {
        let signal = Signal::default();
        assert_eq!(signal.volatility, 0.0);
        assert_eq!(signal.inventory_pressure, 0.0);
    }
}
