//! Single-producer single-consumer endpoint.
//!
//! Both operations are wait-free: no CAS anywhere. `tail` is written only
//! by the producer and `head` only by the consumer, so each side advances
//! its own cursor with a plain store; cross-thread visibility of every
//! element rides on the release/acquire pair on the cell's sequence.
//!
//! Cardinality is enforced by the handles: neither [`Producer`] nor
//! [`Consumer`] is `Clone`, and the mutating operations take `&mut self`.
//! Handing a handle to another thread is fine (the hand-off synchronizes
//! through the move); aliasing one is not possible.
//!
//! # Examples
//!
//! ```
//! use quatre::spsc;
//!
//! # fn main() -> Result<(), quatre::QueueError> {
//! let (mut producer, mut consumer) = spsc::channel::<u32>(4)?;
//!
//! producer.offer(1).map_err(|(_, e)| e)?;
//! producer.offer(2).map_err(|(_, e)| e)?;
//! assert_eq!(consumer.poll()?, 1);
//! assert_eq!(consumer.poll()?, 2);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::QueueError;
use crate::ring::{Ring, free_at, published_at};
use crate::sync::Ordering;
use crate::traits::{QueueConsumer, QueueDrain, QueueProducer};

/// Create a single-producer single-consumer queue with at least the
/// requested capacity (rounded up to a power of two).
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), QueueError> {
    let ring = Arc::new(Ring::with_capacity(capacity)?);
    Ok((
        Producer {
            ring: Arc::clone(&ring),
        },
        Consumer { ring },
    ))
}

/// The producing half. Not `Clone`: exactly one producer exists per queue.
pub struct Producer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Producer<T> {
    /// Attempt to enqueue without blocking. On a full queue the value is
    /// handed back untouched.
    pub fn offer(&mut self, value: T) -> Result<(), (T, QueueError)> {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let cell = ring.cell(tail);

        if cell.sequence.load(Ordering::Acquire) != free_at(tail) {
            // The slot still holds an unconsumed element from the previous
            // lap.
            return Err((value, QueueError::Full));
        }

        unsafe { cell.write(value) };
        cell.sequence.store(published_at(tail), Ordering::Release);
        ring.tail.store(tail.wrapping_add(1), Ordering::Relaxed);
        Ok(())
    }

    /// The fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Approximate number of queued elements.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the queue appears empty.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// The consuming half. Not `Clone`: exactly one consumer exists per queue.
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Consumer<T> {
    /// Dequeue the next element without blocking.
    pub fn poll(&mut self) -> Result<T, QueueError> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let cell = ring.cell(head);

        if cell.sequence.load(Ordering::Acquire) != published_at(head) {
            return Err(QueueError::Empty);
        }

        let value = unsafe { cell.take() };
        // Free the slot for the producer one lap ahead.
        cell.sequence
            .store(free_at(head.wrapping_add(ring.capacity())), Ordering::Release);
        ring.head.store(head.wrapping_add(1), Ordering::Relaxed);
        Ok(value)
    }

    /// Clone the head element without removing it.
    ///
    /// Exact: the sole consumer owns the published slot, so nothing can
    /// recycle it during the read.
    pub fn peek(&self) -> Result<T, QueueError>
    where
        T: Clone,
    {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let cell = ring.cell(head);

        if cell.sequence.load(Ordering::Acquire) != published_at(head) {
            return Err(QueueError::Empty);
        }

        Ok(unsafe { cell.peek_with(Clone::clone) })
    }

    /// Dequeue up to `max_items` elements into `consumer`, stopping early
    /// when the queue is empty. Returns the number drained.
    ///
    /// Each element is removed from the queue before the callback sees it;
    /// a panicking callback does not roll its element back.
    pub fn drain<F>(&mut self, mut consumer: F, max_items: usize) -> usize
    where
        F: FnMut(T),
    {
        let ring = &*self.ring;
        let mut drained = 0;

        while drained < max_items {
            let head = ring.head.load(Ordering::Relaxed);
            let cell = ring.cell(head);

            if cell.sequence.load(Ordering::Acquire) != published_at(head) {
                break;
            }

            let value = unsafe { cell.take() };
            cell.sequence
                .store(free_at(head.wrapping_add(ring.capacity())), Ordering::Release);
            ring.head.store(head.wrapping_add(1), Ordering::Relaxed);

            consumer(value);
            drained += 1;
        }
        drained
    }

    /// Whether the queue appears empty.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Approximate number of queued elements.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// The fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> QueueProducer<T> for Producer<T> {
    fn offer(&mut self, value: T) -> Result<(), (T, QueueError)> {
        Producer::offer(self, value)
    }
}

impl<T> QueueConsumer<T> for Consumer<T> {
    fn poll(&mut self) -> Result<T, QueueError> {
        Consumer::poll(self)
    }

    fn peek(&self) -> Result<T, QueueError>
    where
        T: Clone,
    {
        Consumer::peek(self)
    }

    fn is_empty(&self) -> bool {
        Consumer::is_empty(self)
    }

    fn len(&self) -> usize {
        Consumer::len(self)
    }

    fn capacity(&self) -> usize {
        Consumer::capacity(self)
    }
}

impl<T> QueueDrain<T> for Consumer<T> {
    fn drain<F>(&mut self, consumer: F, max_items: usize) -> usize
    where
        F: FnMut(T),
    {
        Consumer::drain(self, consumer, max_items)
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("spsc::Producer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("spsc::Consumer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}
