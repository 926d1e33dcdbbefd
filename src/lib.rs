//! # Quatre: Bounded Lock-Free Ring Queues
//!
//! Quatre is a family of bounded, array-backed, lock-free queues built on a
//! single substrate: a per-cell sequence-number protocol (a variant of the
//! Vyukov bounded-queue design) over a power-of-two ring. The four endpoints
//! differ only in how they advance the `head` and `tail` cursors:
//!
//! | Endpoint | `offer` | `poll` |
//! |---|---|---|
//! | [`spsc`] | wait-free | wait-free |
//! | [`mpsc`] | lock-free (CAS on `tail`) | wait-free |
//! | [`spmc`] | wait-free | lock-free (CAS on `head`) |
//! | [`mpmc`] | lock-free | lock-free |
//!
//! ## Features
//!
//! - **No locks, no parking**: a full queue rejects the element immediately
//!   and an empty queue reports empty immediately; contention is resolved by
//!   CAS retry only
//! - **No allocation after construction**: one cell array, fixed for the
//!   queue's lifetime
//! - **Typed endpoint cardinality**: handles that must be unique are not
//!   `Clone`; shared handles are. A second SPSC producer is a compile
//!   error, not a data race
//! - **Batched consumption**: the single-consumer endpoints expose a
//!   [`drain`](traits::QueueDrain::drain) fast path
//! - **Cache-line isolation**: `head` and `tail` live on separate padded
//!   cache lines to defeat false sharing
//!
//! ## Quick start
//!
//! Each endpoint module exposes a `channel` constructor returning a
//! producer/consumer handle pair:
//!
//! ```rust
//! use quatre::spsc;
//!
//! # fn main() -> Result<(), quatre::QueueError> {
//! let (mut producer, mut consumer) = spsc::channel::<u64>(1024)?;
//!
//! producer.offer(42).map_err(|(_, e)| e)?;
//! assert_eq!(consumer.poll()?, 42);
//! # Ok(())
//! # }
//! ```
//!
//! Shared endpoints hand out cloneable handles, one per thread:
//!
//! ```rust
//! use quatre::mpmc;
//! use std::thread;
//!
//! # fn main() -> Result<(), quatre::QueueError> {
//! let (producer, consumer) = mpmc::channel::<u64>(256)?;
//!
//! let workers: Vec<_> = (0..4)
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
//! let mut sum = 0;
//! while let Ok(value) = consumer.poll() {
//!     sum += value;
//! }
//! assert_eq!(sum, 0 + 1 + 2 + 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Elements from any single producer are consumed in the order that
//!   producer offered them. Across producers, the published order is the
//!   order in which producers won the `tail` claim.
//! - Every element's producing write happens-before its consuming read,
//!   carried by a release/acquire pair on the cell's sequence number.
//! - [`len`](traits::QueueConsumer::len) and
//!   [`peek`](traits::QueueConsumer::peek) are monitoring aids, not
//!   synchronization points; both are racy snapshots under concurrency.
//!
//! ## Capacity
//!
//! Requested capacities are rounded up to the next power of two (minimum 1)
//! so slot selection is a single mask. A requested capacity of zero fails
//! with [`QueueError::InvalidCapacity`].
#![deny(
    missing_docs,
    unused_imports,
    unused_variables,
    unreachable_code,
    unused_must_use
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::cast_possible_wrap
)]

/// Single-producer single-consumer endpoint. Both operations are wait-free.
pub mod spsc;

/// Multi-producer single-consumer endpoint. Producers claim slots with a CAS
/// on `tail`; the consumer runs the wait-free single-consumer poll.
pub mod mpsc;

/// Single-producer multi-consumer endpoint. The producer publishes without
/// CAS; consumers claim slots with a CAS on `head`.
pub mod spmc;

/// Multi-producer multi-consumer endpoint. The full two-sided protocol.
pub mod mpmc;

/// Capability traits shared by every endpoint: [`QueueProducer`],
/// [`QueueConsumer`], and the single-consumer [`QueueDrain`].
///
/// [`QueueProducer`]: traits::QueueProducer
/// [`QueueConsumer`]: traits::QueueConsumer
/// [`QueueDrain`]: traits::QueueDrain
pub mod traits;

mod ring;
mod sync;

use thiserror::Error;

/// Errors reported by queue construction and operations.
///
/// Full and empty are conditions, not failures: they arrive through the
/// return values of [`offer`](traits::QueueProducer::offer) and
/// [`poll`](traits::QueueConsumer::poll) and carry no state change. An
/// offer that reports [`Full`](QueueError::Full) hands the element back
/// untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has reached its fixed capacity.
    ///
    /// The slot at the producer's cursor still holds an unconsumed element
    /// from the previous lap of the ring. The rejected element travels back
    /// to the caller in the `Err` payload of
    /// [`offer`](traits::QueueProducer::offer).
    #[error("queue is full")]
    Full,

    /// The queue holds no published element at the consumer's cursor.
    #[error("queue is empty")]
    Empty,

    /// The requested capacity was zero, or too large to round up to a
    /// power of two.
    #[error("invalid capacity: must be at least 1")]
    InvalidCapacity,
}
