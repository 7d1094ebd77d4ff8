//! # Lock-Free Message Queue
//!
//! Fixed-capacity single-producer/single-consumer ring buffer with monotonic
//! `head`/`tail` cursors. The queue is split into a [`Producer`] and a
//! [`Consumer`] half at construction; both halves take `&mut self`, so the
//! single-producer/single-consumer discipline is enforced by ownership.
//! Callers that need several producers must serialize them externally (the
//! actor mailbox does so with a mutex around the producer).
//!
//! ## Memory Ordering
//! - The producer writes the slot, then publishes `tail` with `Release`;
//!   the consumer loads `tail` with `Acquire` before reading the slot.
//! - The consumer reads the slot, then publishes `head` with `Release`;
//!   the producer loads `head` with `Acquire` before reusing the slot.
//!
//! Cursors grow without bound and wrap on overflow; the slot index is
//! `cursor & mask`, which is why the capacity must be a power of two.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::QueueError;

/// Shared storage of a split ring buffer.
pub struct MessageQueue<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Slots are only touched by the single producer (before publishing `tail`)
// or the single consumer (before publishing `head`).
unsafe impl<T: Send> Send for MessageQueue<T> {}
unsafe impl<T: Send> Sync for MessageQueue<T> {}

impl<T> MessageQueue<T> {
    /// Create a queue of `capacity` slots and split it into its two halves.
    pub fn with_capacity(capacity: usize) -> Result<(Producer<T>, Consumer<T>), QueueError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(QueueError::InvalidCapacity(capacity));
        }

        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let ring = Arc::new(Self {
            buffer,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        });

        Ok((
            Producer { ring: ring.clone() },
            Consumer { ring },
        ))
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of queued messages (snapshot in time).
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for MessageQueue<T> {
    fn drop(&mut self) {
        let tail = *self.tail.get_mut();
        let mut head = *self.head.get_mut();
        while head != tail {
            // Slots in [head, tail) hold initialized values.
            unsafe { self.buffer[head & self.mask].get_mut().assume_init_drop() };
            head = head.wrapping_add(1);
        }
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Writing half of a [`MessageQueue`].
pub struct Producer<T> {
    ring: Arc<MessageQueue<T>>,
}

impl<T> Producer<T> {
    /// Append a message, handing it back when the queue is full.
    ///
    /// A full queue is a capacity signal, not an error: the caller decides
    /// whether to drop, retry or divert the message.
    pub fn enqueue(&mut self, msg: T) -> Result<(), T> {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) == ring.capacity() {
            return Err(msg);
        }

        unsafe { (*ring.buffer[tail & ring.mask].get()).write(msg) };
        ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.ring.len() == self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Producer").field(&self.ring).finish()
    }
}

/// Reading half of a [`MessageQueue`].
pub struct Consumer<T> {
    ring: Arc<MessageQueue<T>>,
}

impl<T> Consumer<T> {
    /// Take the oldest message, or `None` when the queue is empty.
    pub fn dequeue(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let msg = unsafe { (*ring.buffer[head & ring.mask].get()).assume_init_read() };
        ring.head.store(head.wrapping_add(1), Ordering::Release);
        Some(msg)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Consumer").field(&self.ring).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_rejects_invalid_capacity() {
        assert_eq!(
            MessageQueue::<u32>::with_capacity(0).unwrap_err(),
            QueueError::InvalidCapacity(0)
        );
        assert_eq!(
            MessageQueue::<u32>::with_capacity(6).unwrap_err(),
            QueueError::InvalidCapacity(6)
        );
    }

    #[test]
    fn test_exactly_capacity_enqueues_before_full() {
        let (mut producer, mut consumer) = MessageQueue::with_capacity(8).unwrap();
        for i in 0..8 {
            assert!(producer.enqueue(i).is_ok(), "enqueue {} should succeed", i);
        }
        assert!(producer.is_full());
        assert_eq!(producer.enqueue(8), Err(8));

        // One dequeue frees exactly one slot
        assert_eq!(consumer.dequeue(), Some(0));
        assert!(producer.enqueue(8).is_ok());
        assert_eq!(producer.enqueue(9), Err(9));
    }

    #[test]
    fn test_dequeue_empty() {
        let (_producer, mut consumer) = MessageQueue::<String>::with_capacity(4).unwrap();
        assert!(consumer.is_empty());
        assert_eq!(consumer.dequeue(), None);
    }

    #[test]
    fn test_fifo_across_wraparound() {
        let (mut producer, mut consumer) = MessageQueue::with_capacity(4).unwrap();
        let mut expected = 0;
        for round in 0..10 {
            for i in 0..3 {
                producer.enqueue(round * 3 + i).unwrap();
            }
            while let Some(value) = consumer.dequeue() {
                assert_eq!(value, expected);
                expected += 1;
            }
        }
        assert_eq!(expected, 30);
    }

    #[test]
    fn test_len_tracks_cursors() {
        let (mut producer, mut consumer) = MessageQueue::with_capacity(16).unwrap();
        producer.enqueue("a").unwrap();
        producer.enqueue("b").unwrap();
        assert_eq!(producer.len(), 2);
        consumer.dequeue();
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.capacity(), 16);
    }

    #[test]
    fn test_remaining_messages_dropped_with_queue() {
        let tracker = Arc::new(());
        {
            let (mut producer, mut consumer) = MessageQueue::with_capacity(4).unwrap();
            for _ in 0..3 {
                producer.enqueue(tracker.clone()).unwrap();
            }
            drop(consumer.dequeue());
            assert_eq!(Arc::strong_count(&tracker), 3);
        }
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_spsc_across_threads() {
        const COUNT: usize = 100_000;
        let (mut producer, mut consumer) = MessageQueue::with_capacity(64).unwrap();

        let writer = thread::spawn(move || {
            let mut next = 0;
            while next < COUNT {
                if producer.enqueue(next).is_ok() {
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut expected = 0;
        while expected < COUNT {
            match consumer.dequeue() {
                Some(value) => {
                    assert_eq!(value, expected);
                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }
        writer.join().unwrap();
        assert!(consumer.is_empty());
    }
}
