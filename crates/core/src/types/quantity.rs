//! Fixed-point quantity type.
//!
//! [`Quantity`] mirrors [`super::Price`]: a signed 64-bit integer scaled by
//! 10^8. The sign carries position direction, so a short position is simply
//! a negative quantity.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Number of raw units per whole quantity unit (8 decimal places).
pub const QTY_SCALE: i64 = 100_000_000;

/// A fixed-point quantity at scale 10^8. Negative values represent short
/// positions.
///
/// # Examples
///
/// ```
/// use xmm_core::types::Quantity;
///
/// let q = Quantity::from_f64(0.001);
/// assert_eq!(q.raw(), 100_000);
/// assert!(!q.is_negative());
/// ```
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    /// Zero quantity.
    pub const ZERO: Quantity = Quantity(0);

    /// Construct from a raw scaled value.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Construct from an `f64`, truncating toward zero at the 10^8 scale.
    ///
    /// Not for hot-path use.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self((value * QTY_SCALE as f64) as i64)
    }

    /// The raw scaled value.
    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Convert to `f64`. Not for hot-path use.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / QTY_SCALE as f64
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// Checked addition on the raw value.
    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Checked subtraction on the raw value.
    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quantity({})", self)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / QTY_SCALE;
        let frac = (self.0 % QTY_SCALE).abs();
        if self.0 < 0 && whole == 0 {
            write!(f, "-0.{:08}", frac)
        } else {
            write!(f, "{}.{:08}", whole, frac)
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    /// Add two quantities. Panics on overflow.
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.checked_add(rhs.0).expect("Quantity::add overflow"))
    }
}

impl Sub for Quantity {
    type Output = Self;

    /// Subtract two quantities. Panics on overflow.
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.checked_sub(rhs.0).expect("Quantity::sub overflow"))
    }
}

impl Mul<i64> for Quantity {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: i64) -> Self {
        Self(self.0.checked_mul(rhs).expect("Quantity::mul overflow"))
    }
}

impl Div<i64> for Quantity {
    type Output = Self;

    /// Truncating division by an integer scalar.
    #[inline]
    fn div(self, rhs: i64) -> Self {
        assert!(rhs != 0, "Quantity::div division by zero");
        Self(self.0 / rhs)
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}
