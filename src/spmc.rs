//! Single-producer multi-consumer endpoint.
//!
//! The producer publishes without CAS, exactly like the SPSC producer.
//! Consumers race for slots with a CAS on `head`: a consumer that observes
//! a published sequence claims the slot by advancing the cursor, and only
//! the winner moves the value out. A failed claim means another consumer
//! dequeued; the loser retries at the new cursor, so the poll loop is
//! lock-free.
//!
//! # Examples
//!
//! ```
//! use quatre::spmc;
//! use std::thread;
//!
//! # fn main() -> Result<(), quatre::QueueError> {
//! let (mut producer, consumer) = spmc::channel::<u32>(16)?;
//!
//! for i in 0..4 {
//!     producer.offer(i).map_err(|(_, e)| e)?;
//! }
//!
//! let workers: Vec<_> = (0..2)
//!     .map(|_| {
//!         let consumer = consumer.clone();
//!         thread::spawn(move || {
//!             let mut taken = Vec::new();
//!             while let Ok(value) = consumer.poll() {
//!                 taken.push(value);
//!             }
//!             taken
//!         })
//!     })
//!     .collect();
//!
//! let mut all: Vec<u32> = workers
//!     .into_iter()
//!     .flat_map(|w| w.join().unwrap())
//!     .collect();
//! all.sort_unstable();
//! assert_eq!(all, vec![0, 1, 2, 3]);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::QueueError;
use crate::ring::{Ring, free_at, published_at};
use crate::sync::{Ordering, spin_hint};
use crate::traits::{QueueConsumer, QueueProducer};

/// Create a single-producer multi-consumer queue with at least the
/// requested capacity (rounded up to a power of two).
///
/// Clone the [`Consumer`] once per consuming thread.
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

/// A consuming handle. Cloneable: every clone polls the same queue.
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Consumer<T> {
    /// Dequeue the next element without blocking.
    pub fn poll(&self) -> Result<T, QueueError> {
        let ring = &*self.ring;
        loop {
            let head = ring.head.load(Ordering::Relaxed);
            let cell = ring.cell(head);

            if cell.sequence.load(Ordering::Acquire) != published_at(head) {
                return Err(QueueError::Empty);
            }

            match ring.head.compare_exchange_weak(
                head,
                head.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let value = unsafe { cell.take() };
                    cell.sequence
                        .store(free_at(head.wrapping_add(ring.capacity())), Ordering::Release);
                    return Ok(value);
                }
                // Another consumer claimed the slot; retry at the new head.
                Err(_) => spin_hint(),
            }
        }
    }

    /// Clone the head element without removing it.
    ///
    /// Best-effort under concurrency: the returned element may be dequeued
    /// by another consumer at any moment, and the validated snapshot this
    /// method takes is intended for cheap, `Copy`-like payloads. Never a
    /// synchronization point.
    pub fn peek(&self) -> Result<T, QueueError>
    where
        T: Clone,
    {
        let ring = &*self.ring;
        loop {
            let head = ring.head.load(Ordering::Acquire);
            let cell = ring.cell(head);

            if cell.sequence.load(Ordering::Acquire) != published_at(head) {
                return Err(QueueError::Empty);
            }

            let snapshot = cell.snapshot();
            if cell.sequence.load(Ordering::Acquire) == published_at(head) {
                // The slot was not recycled while the bytes were copied,
                // so they are a valid `T`. Clone from the copy; the copy
                // itself is never dropped.
                return Ok(unsafe { snapshot.assume_init_ref() }.clone());
            }
            // The slot was recycled mid-copy; chase the new head.
            spin_hint();
        }
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

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
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

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("spmc::Producer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("spmc::Consumer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}
