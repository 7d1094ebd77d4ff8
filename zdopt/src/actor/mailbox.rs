use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{MailboxError, QueueError};
use crate::queue::{Consumer, MessageQueue, Producer};

struct Signal {
    notify: Notify,
    closed: AtomicBool,
}

impl Signal {
    /// Holding the producer lock orders the flag after any in-flight push.
    fn close<M>(&self, producer: &Mutex<Producer<M>>) {
        let _producer = producer.lock();
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Bounded actor mailbox over a [`MessageQueue`].
///
/// Senders are serialized by a mutex around the producer half, which keeps
/// the queue single-producer. The consumer half is handed out once, to the
/// actor's processing task, through [`Mailbox::take_receiver`].
///
/// `Notify::notify_one` stores a permit when nobody is waiting, so a message
/// pushed between the receiver's last empty poll and its next wait is never
/// missed.
pub struct Mailbox<M> {
    producer: Arc<Mutex<Producer<M>>>,
    receiver: Mutex<Option<MailboxReceiver<M>>>,
    signal: Arc<Signal>,
    capacity: usize,
}

impl<M> Mailbox<M> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        let (producer, consumer) = MessageQueue::with_capacity(capacity)?;
        let producer = Arc::new(Mutex::new(producer));
        let signal = Arc::new(Signal {
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        Ok(Self {
            producer: producer.clone(),
            receiver: Mutex::new(Some(MailboxReceiver {
                consumer,
                producer,
                signal: signal.clone(),
            })),
            signal,
            capacity,
        })
    }

    /// Enqueue without blocking.
    pub fn push(&self, msg: M) -> Result<(), MailboxError> {
        let mut producer = self.producer.lock();
        if self.signal.closed.load(Ordering::Acquire) {
            return Err(MailboxError::Closed);
        }
        producer
            .enqueue(msg)
            .map_err(|_| MailboxError::Full { capacity: self.capacity })?;
        drop(producer);

        self.signal.notify.notify_one();
        Ok(())
    }

    /// Reject every later push and wake the receiver.
    ///
    /// Messages already queued stay readable.
    pub fn close(&self) {
        self.signal.close(&self.producer);
    }

    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::Acquire)
    }

    /// The consumer side. `None` after the first call.
    pub fn take_receiver(&self) -> Option<MailboxReceiver<M>> {
        self.receiver.lock().take()
    }

    pub fn len(&self) -> usize {
        self.producer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consumer side of a [`Mailbox`].
pub struct MailboxReceiver<M> {
    consumer: Consumer<M>,
    producer: Arc<Mutex<Producer<M>>>,
    signal: Arc<Signal>,
}

impl<M> MailboxReceiver<M> {
    pub fn try_recv(&mut self) -> Option<M> {
        self.consumer.dequeue()
    }

    /// Wait until a sender signals a new message or the mailbox closes.
    pub async fn ready(&self) {
        self.signal.notify.notified().await
    }

    pub fn is_closed(&self) -> bool {
        self.signal.closed.load(Ordering::Acquire)
    }

    /// Close from the consuming side. Every push that succeeded before this
    /// call is visible to the next `try_recv`.
    pub fn close(&self) {
        self.signal.close(&self.producer);
    }
}
