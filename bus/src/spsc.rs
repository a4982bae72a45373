//! Single-producer single-consumer ring queue

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded lock-free SPSC queue over `Copy` elements.
///
/// Capacity is rounded up to a power of two at construction. Correctness
/// relies on exactly one producer and one consumer: the producer alone writes
/// `head`, the consumer alone writes `tail`. Publication uses release stores,
/// observation acquire loads. The cursors live on separate cache lines so the
/// two sides do not false-share.
pub struct SpscQueue<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Written by the producer, read by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Written by the consumer, read by the producer.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: the single-producer/single-consumer contract means a slot is only
// ever accessed by one side at a time, gated by the acquire/release cursors.
unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T: Copy> SpscQueue<T> {
    /// Create a queue holding at least `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = capacity.next_power_of_two().max(2);
        let mut buf = Vec::with_capacity(cap);
        for _ in 0..cap {
            buf.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            buf: buf.into_boxed_slice(),
            mask: cap - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueue `value`. Returns `false` when the ring is full.
    ///
    /// Producer side only.
    #[inline]
    pub fn try_push(&self, value: T) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) > self.mask {
            return false;
        }
        let slot = &self.buf[head & self.mask];
        // SAFETY: `head` has not been published yet, so the consumer cannot
        // touch this slot; the producer is the only other accessor.
        unsafe {
            (*slot.get()).write(value);
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Dequeue the oldest element, if any.
    ///
    /// Consumer side only.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let slot = &self.buf[tail & self.mask];
        // SAFETY: head > tail guarantees the slot was published with release
        // ordering; the producer will not reuse it until `tail` advances.
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Copy the oldest element without consuming it.
    ///
    /// Consumer side only. Pair with [`SpscQueue::consume_one`] for drain
    /// loops that must stop mid-queue (batch buffer full).
    #[inline]
    pub fn peek(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let slot = &self.buf[tail & self.mask];
        // SAFETY: as in `try_pop`; the element is copied, not moved, so the
        // slot stays valid until consumed.
        Some(unsafe { (*slot.get()).assume_init_read() })
    }

    /// Drop the oldest element. Returns `false` when the ring is empty.
    ///
    /// Consumer side only.
    #[inline]
    pub fn consume_one(&self) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return false;
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Approximate number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Whether the queue is (approximately) empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity of the ring.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}
