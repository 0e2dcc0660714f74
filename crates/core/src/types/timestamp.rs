//! Monotonic nanosecond timestamps.
//!
//! [`Timestamp`] wraps a `u64` of nanoseconds since the steady-clock epoch
//! (`CLOCK_MONOTONIC`), so it is immune to NTP steps and wall-clock
//! adjustments. Two flavors are tracked per tick: the venue-reported time
//! and the local ingestion time; both use this type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nanoseconds since the steady-clock epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The zero timestamp, used as "never".
    pub const ZERO: Timestamp = Timestamp(0);

    /// Capture the current steady-clock time.
    ///
    /// Uses `clock_gettime(CLOCK_MONOTONIC)` where available; the syscall is
    /// vDSO-backed on Linux and costs tens of nanoseconds.
    #[inline]
    pub fn now() -> Self {
        Self(monotonic_nanos())
    }

    #[inline]
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    #[inline]
    pub const fn from_micros(us: u64) -> Self {
        Self(us * 1_000)
    }

    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    #[inline]
    pub const fn from_secs(s: u64) -> Self {
        Self(s * 1_000_000_000)
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0 / 1_000
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000_000
    }

    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000_000
    }

    /// Nanoseconds elapsed from `earlier` to `self`, saturating at zero if
    /// `earlier` is in the future.
    #[inline]
    pub const fn nanos_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Nanoseconds elapsed from this timestamp to now.
    #[inline]
    pub fn elapsed_nanos(&self) -> u64 {
        Self::now().nanos_since(*self)
    }

    /// Advance by `ns` nanoseconds, saturating at `u64::MAX`.
    #[inline]
    pub const fn saturating_add_nanos(&self, ns: u64) -> Self {
        Self(self.0.saturating_add(ns))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
#[inline]
fn monotonic_nanos() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec on the stack.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
#[inline]
fn monotonic_nanos() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}
