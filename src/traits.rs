use crate::QueueError;

/// Trait for queue producers that can offer elements into a queue.
///
/// Implemented by every endpoint's producing half. Exclusive producers
/// (SPSC, SPMC) are not `Clone`, so the `&mut self` receiver is what makes
/// a second concurrent producer unrepresentable; shared producers (MPSC,
/// MPMC) are `Clone` and also expose `&self` inherent methods.
pub trait QueueProducer<T> {
    /// Attempt to enqueue a value without blocking.
    ///
    /// # Arguments
    /// * `value` - The value to enqueue
    ///
    /// # Returns
    /// `Ok(())` on success. `Err((value, QueueError::Full))` when the queue
    /// is at capacity; the rejected value is handed back and no state
    /// changed.
    fn offer(&mut self, value: T) -> Result<(), (T, QueueError)>;
}

/// Trait for queue consumers that can poll elements from a queue.
///
/// Implemented by every endpoint's consuming half. Exclusive consumers
/// (SPSC, MPSC) are not `Clone`; shared consumers (SPMC, MPMC) are.
pub trait QueueConsumer<T> {
    /// Dequeue the next element without blocking.
    ///
    /// # Returns
    /// The element on success, or `QueueError::Empty` when no element is
    /// published at the consumer's cursor.
    fn poll(&mut self) -> Result<T, QueueError>;

    /// Clone the head element without removing it.
    ///
    /// A monitoring aid, not a synchronization point. On single-consumer
    /// endpoints the result is exact; on multi-consumer endpoints it is
    /// best-effort and may return an element another consumer dequeues
    /// concurrently.
    ///
    /// # Returns
    /// A clone of the head element, or `QueueError::Empty`.
    fn peek(&self) -> Result<T, QueueError>
    where
        T: Clone;

    /// Check whether the queue appears empty.
    ///
    /// Probes the sequence of the slot at `head`; racy under concurrency.
    fn is_empty(&self) -> bool;

    /// Approximate number of queued elements, clamped to
    /// `[0, capacity]`.
    ///
    /// A snapshot of two independently-moving cursors; monitoring only.
    fn len(&self) -> usize;

    /// The fixed, post-rounding capacity of the queue.
    fn capacity(&self) -> usize;
}

/// Batched consumption for the single-consumer endpoints (SPSC, MPSC).
///
/// Multi-consumer endpoints do not implement this trait: a batched take
/// without a per-element `head` claim would race with other consumers.
pub trait QueueDrain<T>: QueueConsumer<T> {
    /// Dequeue up to `max_items` elements, delivering each to `consumer`.
    ///
    /// Equivalent to up to `max_items` successful [`poll`]s feeding their
    /// results to the callback, stopping early when the queue is empty.
    /// The callback runs on the calling thread after the element has
    /// already been removed, so a panicking callback does not roll the
    /// element back. The callback must not re-enter the same queue
    /// expecting prior-state semantics.
    ///
    /// # Arguments
    /// * `consumer` - Invoked once per drained element
    /// * `max_items` - Upper bound on elements to drain; `0` drains nothing
    ///
    /// # Returns
    /// The number of elements drained (`<= max_items`).
    ///
    /// [`poll`]: QueueConsumer::poll
    fn drain<F>(&mut self, consumer: F, max_items: usize) -> usize
    where
        F: FnMut(T);
}
