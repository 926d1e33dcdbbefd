//! The shared substrate under all four endpoints: the cell array, the
//! power-of-two mask, and the padded `head`/`tail` cursors.
//!
//! A cell's sequence number encodes its lap and its occupancy in one word:
//! the cursor value is carried in the upper bits and the low bit marks the
//! slot published. Cell `i` starts at [`free_at`]`(i)`; across lap `k`,
//! [`free_at`]`(i + k·capacity)` means the slot is free for the producer
//! whose `tail` equals `i + k·capacity`, and [`published_at`] of the same
//! cursor means the slot holds that lap's element for the consumer. Keeping
//! free states even and published states odd means the two can never
//! collide, so the protocol is sound down to capacity 1. All arithmetic
//! wraps; the cursors are wide enough that a wrap is never observed in
//! practice.
//!
//! The payload itself is unsynchronized. A producer writes the value before
//! its release store of the sequence; a consumer loads the sequence with
//! acquire before reading the value. That release/acquire pair carries the
//! ordering for every payload access, so the endpoints never need a second
//! synchronization point.

use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::QueueError;
use crate::sync::{AtomicUsize, Ordering, UnsafeCell};

/// Sequence value marking the slot at `cursor` free for its lap's producer.
#[inline]
pub(crate) fn free_at(cursor: usize) -> usize {
    cursor << 1
}

/// Sequence value marking the slot at `cursor` published for its lap's
/// consumer.
#[inline]
pub(crate) fn published_at(cursor: usize) -> usize {
    (cursor << 1) | 1
}

/// One slot of the ring: a lap-encoded sequence number and the payload.
pub(crate) struct Cell<T> {
    /// Slot state. See the module docs for the encoding.
    pub(crate) sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Cell<T> {
    fn new(index: usize) -> Self {
        Self {
            sequence: AtomicUsize::new(free_at(index)),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Write the payload into the slot.
    ///
    /// # Safety
    ///
    /// The caller must have claimed the slot for the current lap (observed
    /// the slot free at its cursor and, on shared endpoints, won the `tail`
    /// CAS) and must publish with a release store of `sequence` afterwards.
    #[inline]
    pub(crate) unsafe fn write(&self, value: T) {
        self.value.with_mut(|slot| unsafe { (*slot).write(value) });
    }

    /// Move the payload out of the slot.
    ///
    /// # Safety
    ///
    /// The caller must hold exclusive consume rights for the current lap
    /// (observed the slot published at its cursor and, on shared endpoints,
    /// won the `head` CAS) and must free the slot with a release store of
    /// `sequence` afterwards. The moved-out value must not be read again
    /// from the slot.
    #[inline]
    pub(crate) unsafe fn take(&self) -> T {
        self.value.with(|slot| unsafe { (*slot).assume_init_read() })
    }

    /// Borrow the payload in place.
    ///
    /// # Safety
    ///
    /// The slot must stay published for the duration of the closure; only a
    /// sole consumer can guarantee that.
    #[inline]
    pub(crate) unsafe fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.value.with(|slot| f(unsafe { (*slot).assume_init_ref() }))
    }

    /// Bitwise snapshot of the slot without asserting initialization.
    ///
    /// Used by the best-effort peek on multi-consumer endpoints: the caller
    /// copies the bytes, re-validates the sequence, and only then treats
    /// them as a `T`. The read is volatile so a torn copy cannot be folded
    /// away; a copy that fails validation is discarded untouched.
    #[inline]
    pub(crate) fn snapshot(&self) -> MaybeUninit<T> {
        self.value.with(|slot| unsafe { std::ptr::read_volatile(slot) })
    }
}

/// The fixed cell array plus the shared cursors. Immutable after
/// construction; never resized.
pub(crate) struct Ring<T> {
    /// Next slot a consumer will attempt to read.
    pub(crate) head: CachePadded<AtomicUsize>,
    /// Next slot a producer will attempt to claim.
    pub(crate) tail: CachePadded<AtomicUsize>,
    buffer: Box<[Cell<T>]>,
    mask: usize,
}

// Safety: the payload cells are synchronized by the sequence protocol, so
// sharing the ring across threads only requires the payload to be Send.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Allocate a ring for `requested` elements, rounded up to the next
    /// power of two.
    pub(crate) fn with_capacity(requested: usize) -> Result<Self, QueueError> {
        if requested == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        let capacity = requested
            .checked_next_power_of_two()
            .ok_or(QueueError::InvalidCapacity)?;

        let buffer = (0..capacity).map(Cell::new).collect();

        Ok(Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer,
            mask: capacity - 1,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// The cell addressed by a cursor value.
    #[inline]
    pub(crate) fn cell(&self, cursor: usize) -> &Cell<T> {
        &self.buffer[cursor & self.mask]
    }

    /// Emptiness probe against the head cell's sequence, not the cursors:
    /// the queue is non-empty exactly when the slot at `head` is published.
    pub(crate) fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let sequence = self.cell(head).sequence.load(Ordering::Acquire);
        sequence != published_at(head)
    }

    /// Approximate occupancy from a racy cursor snapshot, clamped to
    /// `[0, capacity]`. Monitoring only.
    pub(crate) fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let diff = tail.wrapping_sub(head) as isize;
        if diff <= 0 {
            0
        } else {
            (diff as usize).min(self.capacity())
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Exclusive access: release every element still published.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);

        let mut cursor = head;
        while cursor != tail {
            let cell = self.cell(cursor);
            if cell.sequence.load(Ordering::Relaxed) == published_at(cursor) {
                drop(unsafe { cell.take() });
            }
            cursor = cursor.wrapping_add(1);
        }
    }
}
