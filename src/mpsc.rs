//! Multi-producer single-consumer endpoint.
//!
//! Producers race for slots with a CAS on `tail`: a producer probes the
//! sequence of the slot at its observed `tail`, and only the producer that
//! wins the CAS writes and publishes. Losing producers retry at the new
//! cursor; the loop is lock-free because every failed CAS means another
//! producer enqueued. The single consumer runs the wait-free no-CAS poll.
//!
//! FIFO holds per producer; across producers the published order is the
//! order in which they won the `tail` claim.
//!
//! # Examples
//!
//! ```
//! use quatre::mpsc;
//! use std::thread;
//!
//! # fn main() -> Result<(), quatre::QueueError> {
//! let (producer, mut consumer) = mpsc::channel::<u64>(64)?;
//!
//! let workers: Vec<_> = (0..3)
//!     .map(|id| {
//!         let producer = producer.clone();
//!         thread::spawn(move || {
//!             while producer.offer(id).is_err() {
//!                 std::hint::spin_loop();
//!             }
//!         })
//!     })
//!     .collect();
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//!
//! let mut total = 0;
//! while let Ok(value) = consumer.poll() {
//!     total += value;
//! }
//! assert_eq!(total, 0 + 1 + 2);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::QueueError;
use crate::ring::{Ring, free_at, published_at};
use crate::sync::{Ordering, spin_hint};
use crate::traits::{QueueConsumer, QueueDrain, QueueProducer};

/// Create a multi-producer single-consumer queue with at least the
/// requested capacity (rounded up to a power of two).
///
/// Clone the [`Producer`] once per producing thread.
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
                // The slot is free for this cursor; try to claim it.
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
                    // Another producer won the slot; retry at its cursor.
                    Err(current) => tail = current,
                }
            } else if lag < 0 {
                // The slot still holds an unconsumed element from the
                // previous lap.
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
        cell.sequence
            .store(free_at(head.wrapping_add(ring.capacity())), Ordering::Release);
        ring.head.store(head.wrapping_add(1), Ordering::Relaxed);
        Ok(value)
    }

    /// Clone the head element without removing it.
    ///
    /// Exact: the sole consumer owns the published slot.
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
    /// when no published element remains. Returns the number drained.
    ///
    /// Each element is removed before the callback sees it; a panicking
    /// callback does not roll its element back.
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
        f.debug_struct("mpsc::Producer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("mpsc::Consumer")
            .field("capacity", &self.ring.capacity())
            .field("len", &self.ring.len())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn single_thread_fifo() {
        let (producer, mut consumer) = channel::<u32>(8).unwrap();

        for i in 0..8 {
            producer.offer(i).unwrap();
        }
        assert_eq!(producer.offer(99), Err((99, QueueError::Full)));

        for i in 0..8 {
            assert_eq!(consumer.poll(), Ok(i));
        }
        assert_eq!(consumer.poll(), Err(QueueError::Empty));
    }

    #[test]
    fn full_is_reported_only_when_previous_lap_pending() {
        let (producer, mut consumer) = channel::<u32>(2).unwrap();

        producer.offer(1).unwrap();
        producer.offer(2).unwrap();
        assert!(producer.offer(3).is_err());

        assert_eq!(consumer.poll(), Ok(1));
        producer.offer(3).unwrap();
        assert!(producer.offer(4).is_err());
    }

    #[test]
    fn drain_consumes_in_publication_order() {
        let (producer, mut consumer) = channel::<u32>(16).unwrap();

        for i in 0..10 {
            producer.offer(i).unwrap();
        }

        let mut seen = Vec::new();
        assert_eq!(consumer.drain(|v| seen.push(v), 10), 10);
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn peek_does_not_consume() {
        let (producer, consumer) = channel::<u32>(4).unwrap();

        assert_eq!(consumer.peek(), Err(QueueError::Empty));
        producer.offer(42).unwrap();
        assert_eq!(consumer.peek(), Ok(42));
        assert_eq!(consumer.peek(), Ok(42));
        assert_eq!(consumer.len(), 1);
    }

    #[test]
    fn producers_preserve_their_own_order() {
        use std::collections::HashMap;
        use std::thread;

        const PRODUCERS: u64 = 4;
        const ITEMS: u64 = 10_000;

        let (producer, mut consumer) = channel::<u64>(64).unwrap();

        let workers: Vec<_> = (0..PRODUCERS)
            .map(|id| {
                let producer = producer.clone();
                thread::spawn(move || {
                    for i in 0..ITEMS {
                        let value = (id << 32) | i;
                        while producer.offer(value).is_err() {
                            std::hint::spin_loop();
                        }
                    }
                })
            })
            .collect();

        let mut last_seen: HashMap<u64, u64> = HashMap::new();
        let mut received = 0;
        while received < PRODUCERS * ITEMS {
            match consumer.poll() {
                Ok(value) => {
                    let id = value >> 32;
                    let seq = value & 0xffff_ffff;
                    if let Some(prev) = last_seen.insert(id, seq) {
                        assert!(seq > prev, "producer {id} reordered: {prev} then {seq}");
                    }
                    received += 1;
                }
                Err(QueueError::Empty) => std::hint::spin_loop(),
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(consumer.poll(), Err(QueueError::Empty));
    }
}
