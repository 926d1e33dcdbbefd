//! Multi-producer multi-consumer endpoint.
//!
//! The full two-sided protocol: producers claim slots with a CAS on `tail`
//! (the MPSC producer loop), consumers claim slots with a CAS on `head`
//! (the SPMC consumer loop) with one refinement: a consumer that observes a
//! sequence ahead of its slot's published state knows another consumer
//! already took that slot, so it chases the new head instead of reporting
//! empty.
//!
//! Both classifications are stable against concurrency: a producer reports
//! full only when the probed slot still holds the previous lap's element
//! (concurrent producers only make it "more full"), and a consumer reports
//! empty only when the probed slot is at most at its free state.
//!
//! # Examples
//!
//! ```
//! use quatre::mpmc;
//!
//! # fn main() -> Result<(), quatre::QueueError> {
//! let (producer, consumer) = mpmc::channel::<u32>(8)?;
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
use crate::sync::{Ordering, spin_hint};
use crate::traits::{QueueConsumer, QueueProducer};

/// Create a multi-producer multi-consumer queue with at least the
/// requested capacity (rounded up to a power of two).
///
/// Clone each handle once per participating thread.
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), QueueError> {
    let ring = Arc::new(Ring::with_capacity(capacity)?);
    Ok((
        Producer {
            ring: Arc::clone(&ring),
        },
        Consumer { ring },
    ))
}

/// A producing handle. Cloneable: every clone offers into the same queue.
pub struct Producer<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Producer<T> {
    /// Attempt to enqueue without blocking. On a full queue the value is
    /// handed back untouched.
    pub fn offer(&self, value: T) -> Result<(), (T, QueueError)> {
        let ring = &*self.ring;
        let mut tail = ring.tail.load(Ordering::Relaxed);

        loop {
            let cell = ring.cell(tail);
            let sequence = cell.sequence.load(Ordering::Acquire);
            let lag = sequence.wrapping_sub(free_at(tail)) as isize;

            if lag == 0 {
                match ring.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { cell.write(value) };
                        cell.sequence.store(published_at(tail), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => tail = current,
                }
            } else if lag < 0 {
                return Err((value, QueueError::Full));
            } else {
                // Another producer already advanced past this slot.
                spin_hint();
                tail = ring.tail.load(Ordering::Relaxed);
            }
        }
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

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
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
        let mut head = ring.head.load(Ordering::Relaxed);

        loop {
            let cell = ring.cell(head);
            let sequence = cell.sequence.load(Ordering::Acquire);
            let lag = sequence.wrapping_sub(published_at(head)) as isize;

            if lag == 0 {
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
                    Err(current) => head = current,
                }
            } else if lag < 0 {
                // The slot has not been published for this lap.
                return Err(QueueError::Empty);
            } else {
                // Another consumer already took this slot; chase the head.
                spin_hint();
                head = ring.head.load(Ordering::Relaxed);
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
        f.debug_struct("mpmc::Producer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("mpmc::Consumer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}
