//! Fixed-point price type for the hot path.
//!
//! [`Price`] stores a signed 64-bit integer scaled by 10^8, so one unit of
//! the raw value is 0.00000001. All hot-path arithmetic stays in integer
//! space; `f64` conversions exist for configuration, analytics, and display
//! only and truncate toward zero.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Number of raw units per whole price unit (8 decimal places).
pub const PRICE_SCALE: i64 = 100_000_000;

/// A fixed-point price at scale 10^8.
///
/// # Examples
///
/// ```
/// use xmm_core::types::Price;
///
/// let p = Price::from_f64(50_000.5);
/// assert_eq!(p.raw(), 5_000_050_000_000);
/// assert_eq!(p.to_f64(), 50_000.5);
/// ```
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Zero price.
    pub const ZERO: Price = Price(0);

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
        Self((value * PRICE_SCALE as f64) as i64)
    }

    /// The raw scaled value.
    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Convert to `f64`. Not for hot-path use.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / PRICE_SCALE as f64
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

    /// Midpoint of two prices, truncating toward zero.
    #[inline]
    pub const fn midpoint(a: Self, b: Self) -> Self {
        Self((a.0 + b.0) / 2)
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

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({})", self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PRICE_SCALE;
        let frac = (self.0 % PRICE_SCALE).abs();
        if self.0 < 0 && whole == 0 {
            write!(f, "-0.{:08}", frac)
        } else {
            write!(f, "{}.{:08}", whole, frac)
        }
    }
}

impl Add for Price {
    type Output = Self;

    /// Add two prices. Panics on overflow.
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.checked_add(rhs.0).expect("Price::add overflow"))
    }
}

impl Sub for Price {
    type Output = Self;

    /// Subtract two prices. Panics on overflow.
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.checked_sub(rhs.0).expect("Price::sub overflow"))
    }
}

impl Mul<i64> for Price {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: i64) -> Self {
        Self(self.0.checked_mul(rhs).expect("Price::mul overflow"))
    }
}

impl Div<i64> for Price {
    type Output = Self;

    /// Truncating division by an integer scalar.
    #[inline]
    fn div(self, rhs: i64) -> Self {
        assert!(rhs != 0, "Price::div division by zero");
        Self(self.0 / rhs)
    }
}

impl Neg for Price {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}
