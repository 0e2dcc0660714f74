//! Bounded multi-producer/multi-consumer ring.
//!
//! Same per-slot sequence protocol as [`crate::spsc`], with positions
//! reserved by compare-and-swap so any number of producers and consumers can
//! race for slots. A negative sequence-position difference means the ring is
//! full (producers) or empty (consumers); a positive one means another
//! thread won the position and the loop reloads.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

struct Slot<T> {
    sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded MPMC ring with power-of-two capacity `N`.
///
/// Unlike [`SpscRing`](crate::SpscRing) there is no caller discipline: any
/// number of threads may push and pop concurrently.
pub struct MpmcRing<T, const N: usize> {
    slots: Box<[CachePadded<Slot<T>>]>,
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
}

// SAFETY: a slot's payload is only written by the producer that won the CAS
// on `tail` for that position, and only read by the consumer that won the
// CAS on `head`; the sequence release/acquire pairing orders the two.
unsafe impl<T: Send, const N: usize> Send for MpmcRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MpmcRing<T, N> {}

impl<T, const N: usize> MpmcRing<T, N> {
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
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[(pos & Self::MASK) as usize];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as i64 - pos as i64;

            if diff == 0 {
                match self
                    .tail
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                {
                    Ok(_) => {
                        // SAFETY: winning the CAS grants exclusive write
                        // access to this slot for this lap.
                        unsafe {
                            (*slot.value.get()).write(value);
                        }
                        slot.sequence.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempt to pop a value. Returns `None` when the ring is empty; never
    /// blocks.
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[(pos & Self::MASK) as usize];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as i64 - (pos + 1) as i64;

            if diff == 0 {
                match self
                    .head
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                {
                    Ok(_) => {
                        // SAFETY: winning the CAS grants exclusive read
                        // access to this slot's published payload.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence.store(pos + N as u64, Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Approximate number of queued items.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    /// Approximate emptiness.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for MpmcRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for MpmcRing<T, N> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}
