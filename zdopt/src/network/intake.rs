use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use crossbeam_queue::SegQueue;
use flume::{Receiver, Sender, TrySendError};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn, Instrument};

use zdopt_api::Session;

use super::message::{NetMessage, NET_MESSAGE_POOL};
use crate::config::IntakeConfig;
use crate::context::ServerContext;
use crate::error::IntakeError;
use crate::pool::{GenericPool, Pooled};

/// Opens transport sessions on demand.
#[async_trait]
pub trait SessionSource: Send + Sync + 'static {
    type Session: Session;

    async fn open(&self) -> io::Result<Self::Session>;
}

/// Counters of a running intake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    /// Messages delivered on the channel.
    pub received: u64,
    /// Messages returned to the pool because the channel was full.
    pub dropped: u64,
    pub read_errors: u64,
    pub open_errors: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    dropped: AtomicU64,
    read_errors: AtomicU64,
    open_errors: AtomicU64,
}

struct Shared<S: SessionSource> {
    source: S,
    sessions: SegQueue<S::Session>,
    pool: Arc<GenericPool<NetMessage>>,
    sender: Sender<Pooled<NetMessage>>,
    config: IntakeConfig,
    counters: Counters,
}

/// Reads datagrams from pooled sessions and delivers them as pooled messages.
///
/// Every reader takes an idle session (opening one when none is idle), reads
/// once, and puts the session back. Delivery never waits: when the channel
/// is full the message goes straight back to the pool and is counted as
/// dropped.
pub struct NetworkIntake<S: SessionSource> {
    shared: Arc<Shared<S>>,
    receiver: Receiver<Pooled<NetMessage>>,
    token: CancellationToken,
    started: AtomicBool,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: SessionSource> NetworkIntake<S> {
    /// Intake bound to the context's root token and message pool.
    pub fn new(ctx: &ServerContext, source: S) -> Result<Self, IntakeError> {
        let hot_capacity = ctx.config().pool.hot_capacity;
        let pool = ctx.pools().get_or_register(NET_MESSAGE_POOL, || {
            GenericPool::new(NET_MESSAGE_POOL, NetMessage::default, hot_capacity)
        })?;
        let config = ctx.config().intake.clone();
        let (sender, receiver) = flume::bounded(config.channel_capacity);

        Ok(Self {
            shared: Arc::new(Shared {
                source,
                sessions: SegQueue::new(),
                pool,
                sender,
                config,
                counters: Counters::default(),
            }),
            receiver,
            token: ctx.token().child_token(),
            started: AtomicBool::new(false),
            readers: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the read workers. Only the first call starts anything.
    pub fn start(&self) -> Result<(), IntakeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(IntakeError::AlreadyStarted);
        }

        let count = self.shared.config.readers;
        let mut readers = self.readers.lock();
        for reader in 0..count {
            let span = tracing::debug_span!("intake_reader", reader);
            let run = read_loop(self.shared.clone(), self.token.clone());
            readers.push(tokio::spawn(run.instrument(span)));
        }
        info!(readers = count, buffer = self.shared.config.read_buffer_size, "network intake started");
        Ok(())
    }

    /// Channel the parsed messages arrive on.
    pub fn receiver(&self) -> Receiver<Pooled<NetMessage>> {
        self.receiver.clone()
    }

    /// Hand an already open session to the readers.
    pub fn add_session(&self, session: S::Session) {
        self.shared.sessions.push(session);
    }

    /// Sessions currently waiting for a reader.
    pub fn idle_sessions(&self) -> usize {
        self.shared.sessions.len()
    }

    pub fn pool(&self) -> &Arc<GenericPool<NetMessage>> {
        &self.shared.pool
    }

    pub fn stats(&self) -> IntakeStats {
        let c = &self.shared.counters;
        IntakeStats {
            received: c.received.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            read_errors: c.read_errors.load(Ordering::Relaxed),
            open_errors: c.open_errors.load(Ordering::Relaxed),
        }
    }

    /// Cancel the readers and wait for them to exit.
    pub async fn stop(&self) {
        self.token.cancel();
        let readers: Vec<_> = self.readers.lock().drain(..).collect();
        for result in join_all(readers).await {
            if let Err(e) = result {
                error!(error = %e, "intake reader failed");
            }
        }
        info!(stats = ?self.stats(), "network intake stopped");
    }
}

impl<S: SessionSource> Drop for NetworkIntake<S> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<S: SessionSource> fmt::Debug for NetworkIntake<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkIntake")
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("idle_sessions", &self.idle_sessions())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S: SessionSource> Shared<S> {
    async fn acquire(&self, token: &CancellationToken) -> Option<S::Session> {
        loop {
            if let Some(session) = self.sessions.pop() {
                return Some(session);
            }

            let opened = tokio::select! {
                _ = token.cancelled() => return None,
                opened = self.source.open() => opened,
            };
            match opened {
                Ok(session) => {
                    debug!(peer = %session.peer(), "session opened");
                    return Some(session);
                }
                Err(e) => {
                    self.counters.open_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, backoff = ?self.config.reconnect_backoff, "failed to open session");
                    if !self.back_off(token).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep for the reconnect backoff. `false` when cancelled meanwhile.
    async fn back_off(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.config.reconnect_backoff) => true,
        }
    }

    fn deliver(&self, bytes: &[u8]) {
        let mut msg = self.pool.get();
        msg.parse(bytes);

        match self.sender.try_send(msg) {
            Ok(()) => {
                self.counters.received.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(msg)) | Err(TrySendError::Disconnected(msg)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(len = msg.len(), "intake channel full, message dropped");
                if let Err(e) = self.pool.release_obj(msg) {
                    warn!(error = %e, "failed to release dropped message");
                }
            }
        }
    }
}

async fn read_loop<S: SessionSource>(shared: Arc<Shared<S>>, token: CancellationToken) {
    let mut buf = vec![0u8; shared.config.read_buffer_size];

    while let Some(session) = shared.acquire(&token).await {
        let read = tokio::select! {
            _ = token.cancelled() => None,
            read = session.read(&mut buf) => Some(read),
        };

        match read {
            Some(Ok(n)) => shared.deliver(&buf[..n]),
            Some(Err(e)) => {
                shared.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                debug!(peer = %session.peer(), error = %e, "session read failed");
                // A session failing on every read must not spin the reader
                shared.sessions.push(session);
                if !shared.back_off(&token).await {
                    break;
                }
                continue;
            }
            None => {
                shared.sessions.push(session);
                break;
            }
        }
        shared.sessions.push(session);
    }
    debug!("intake reader exited");
}
