//! Bounded single-producer/single-consumer ring.
//!
//! Each slot carries a monotonic sequence counter. A slot is writable when
//! its sequence equals the producer's position, and readable when it equals
//! the consumer's position plus one; popping re-arms the slot for the next
//! lap by advancing its sequence a full capacity ahead. The release store on
//! the slot sequence paired with the acquire load on the other side
//! establishes happens-before for the payload without any ordering on the
//! head and tail counters themselves.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

struct Slot<T> {
    sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded SPSC ring with power-of-two capacity `N`.
///
/// # Contract
///
/// The ring itself is allocation-free and wait-free, but the discipline is
/// the caller's: at most one thread may call [`try_push`] and at most one
/// (other) thread may call [`try_pop`] at any time. Sharing an
/// `Arc<SpscRing<_, N>>` between exactly one producer and one consumer
/// satisfies this.
///
/// [`try_push`]: SpscRing::try_push
/// [`try_pop`]: SpscRing::try_pop
pub struct SpscRing<T, const N: usize> {
    slots: Box<[CachePadded<Slot<T>>]>,
    /// Consumer position.
    head: CachePadded<AtomicU64>,
    /// Producer position.
    tail: CachePadded<AtomicU64>,
}

// SAFETY: the per-slot sequence protocol transfers ownership of each payload
// from the single producer to the single consumer with release/acquire
// pairing; the value cells are never accessed concurrently.
unsafe impl<T: Send, const N: usize> Send for SpscRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscRing<T, N> {}

impl<T, const N: usize> SpscRing<T, N> {
    const MASK: u64 = N as u64 - 1;

    /// Create an empty ring. `N` must be a power of two and at least 2.
    pub fn new() -> Self {
        assert!(N.is_power_of_two() && N >= 2, "capacity must be a power of two >= 2");
        let slots = (0..N as u64)
            .map(|i| {
                CachePadded::new(Slot {
                    sequence: AtomicU64::new(i),
                    value: UnsafeCell::new(MaybeUninit::uninit()),
                })
            })
            .collect();
        Self {
            slots,
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Attempt to push a value. Returns the value back when the ring is
    /// full; never blocks.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let pos = self.tail.load(Ordering::Relaxed);
        let slot = &self.slots[(pos & Self::MASK) as usize];

        if slot.sequence.load(Ordering::Acquire) != pos {
            return Err(value);
        }

        // SAFETY: the sequence check above proves the consumer has vacated
        // this slot for the current lap, and only this (single) producer
        // writes it before the release store below publishes it.
        unsafe {
            (*slot.value.get()).write(value);
        }
        slot.sequence.store(pos + 1, Ordering::Release);
        self.tail.store(pos + 1, Ordering::Relaxed);
        Ok(())
    }

    /// Attempt to pop the oldest value. Returns `None` when the ring is
    /// empty; never blocks.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let pos = self.head.load(Ordering::Relaxed);
        let slot = &self.slots[(pos & Self::MASK) as usize];

        if slot.sequence.load(Ordering::Acquire) != pos + 1 {
            return None;
        }

        // SAFETY: the sequence check above proves the producer published a
        // value into this slot, and only this (single) consumer moves it out
        // before the release store re-arms the slot for the next lap.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.sequence.store(pos + N as u64, Ordering::Release);
        self.head.store(pos + 1, Ordering::Relaxed);
        Some(value)
    }

    /// Approximate number of queued items. Not authoritative for concurrent
    /// observers.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    /// Approximate emptiness. Not authoritative for concurrent observers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for SpscRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscRing<T, N> {
    fn drop(&mut self) {
        // Drain undelivered payloads so their destructors run.
        while self.try_pop().is_some() {}
    }
}
