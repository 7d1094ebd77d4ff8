use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument};

use zdopt_api::{Actor, ActorError, ActorId, ActorResult, ActorState, BoxedFuture, Message, MessageKind};

use super::mailbox::{Mailbox, MailboxReceiver};
use crate::config::ActorConfig;
use crate::error::{ConfigError, MailboxError};
use crate::{actor_span, log_lifecycle};

/// Message handler registered for one message kind.
pub type Handler<M> = Arc<dyn Fn(M) -> BoxedFuture<'static, ActorResult<()>> + Send + Sync>;

type Registry<M> = RwLock<HashMap<<M as Message>::Kind, Handler<M>>>;

/// Mailbox-driven actor core.
///
/// `BaseActor` owns a bounded mailbox, a registry of handlers keyed by
/// message kind, and one processing task started by [`Actor::init`]. The task
/// collects messages into batches of at most `batch_size`; a batch is
/// dispatched when it is full or when the mailbox is momentarily empty. Every
/// message of a batch runs on its own task and the whole batch completes
/// before the next one is collected.
///
/// Concrete actors embed a `BaseActor` and delegate their lifecycle to it.
pub struct BaseActor<M: Message> {
    id: ActorId,
    name: String,
    config: ActorConfig,
    mailbox: Mailbox<M>,
    handlers: Arc<Registry<M>>,
    state: Arc<AtomicU8>,
    token: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
    processed: Arc<AtomicU64>,
}

impl<M: Message> BaseActor<M> {
    pub fn new(name: impl Into<String>, config: ActorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mailbox = Mailbox::new(config.mailbox_capacity).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            id: ActorId::new(),
            name: name.into(),
            config,
            mailbox,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            state: Arc::new(AtomicU8::new(ActorState::Created.as_u8())),
            token: Mutex::new(None),
            task: Mutex::new(None),
            processed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Register the handler for `kind`. A later registration replaces an earlier one.
    pub fn register<F, Fut>(&self, kind: M::Kind, handler: F)
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActorResult<()>> + Send + 'static,
    {
        let handler: Handler<M> =
            Arc::new(move |msg| -> BoxedFuture<'static, ActorResult<()>> { Box::pin(handler(msg)) });
        if self.handlers.write().insert(kind, handler).is_some() {
            debug!(actor = %self.name, kind = kind.name(), "handler replaced");
        }
    }

    /// Message kinds of `M` that have no handler yet.
    pub fn missing_handlers(&self) -> Vec<M::Kind> {
        let handlers = self.handlers.read();
        M::Kind::all()
            .iter()
            .copied()
            .filter(|kind| !handlers.contains_key(kind))
            .collect()
    }

    /// Enqueue a message without blocking.
    ///
    /// Messages sent before `init` are buffered and processed once the actor runs.
    pub fn tell(&self, msg: M) -> Result<(), MailboxError> {
        self.mailbox.push(msg)
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    /// Messages waiting in the mailbox.
    pub fn pending(&self) -> usize {
        self.mailbox.len()
    }

    /// Messages handed to a handler so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Cancellation token of the processing task, once running.
    pub fn token(&self) -> Option<CancellationToken> {
        self.token.lock().clone()
    }

    fn transition(&self, from: ActorState, to: ActorState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn start(&self, parent: &CancellationToken) {
        if !self.transition(ActorState::Created, ActorState::Running) {
            debug!(actor = %self.name, id = %self.id, "init on a started actor ignored");
            return;
        }

        let Some(receiver) = self.mailbox.take_receiver() else {
            warn!(actor = %self.name, "mailbox receiver already taken");
            return;
        };

        let token = parent.child_token();
        let run = ProcessingLoop {
            receiver,
            handlers: self.handlers.clone(),
            state: self.state.clone(),
            token: token.clone(),
            batch_size: self.config.batch_size,
            processed: self.processed.clone(),
        };
        let span = actor_span!(self.name.as_str(), self.id);
        let handle = tokio::spawn(run.run().instrument(span));

        *self.token.lock() = Some(token);
        *self.task.lock() = Some(handle);
        log_lifecycle!(self.name.as_str(), self.id, "started");
    }

    /// Idempotent. Also reaps a processing task that already exited on
    /// parent cancellation.
    pub(crate) async fn shutdown(&self) {
        let previous = ActorState::from_u8(self.state.swap(ActorState::Stopped.as_u8(), Ordering::AcqRel));

        self.mailbox.close();
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(actor = %self.name, id = %self.id, error = %e, "processing task failed");
            }
        }
        if previous != ActorState::Stopped {
            log_lifecycle!(self.name.as_str(), self.id, "stopped", processed = self.processed());
        }
    }
}

#[async_trait]
impl<M: Message> Actor for BaseActor<M> {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, token: &CancellationToken) {
        self.start(token);
    }

    async fn update(&self, _delta: Duration) {}

    async fn stop(&self) {
        self.shutdown().await;
    }

    fn state(&self) -> ActorState {
        ActorState::from_u8(self.state.load(Ordering::Acquire))
    }
}

impl<M: Message> fmt::Debug for BaseActor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseActor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

struct ProcessingLoop<M: Message> {
    receiver: MailboxReceiver<M>,
    handlers: Arc<Registry<M>>,
    state: Arc<AtomicU8>,
    token: CancellationToken,
    batch_size: usize,
    processed: Arc<AtomicU64>,
}

impl<M: Message> ProcessingLoop<M> {
    async fn run(mut self) {
        let mut batch = Vec::with_capacity(self.batch_size);

        loop {
            self.fill(&mut batch);
            if !batch.is_empty() {
                self.dispatch(&mut batch).await;
                continue;
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = self.receiver.ready() => {}
            }
        }

        // Senders get Closed from here on; everything accepted before is flushed
        self.receiver.close();
        self.state.store(ActorState::Stopped.as_u8(), Ordering::Release);
        loop {
            self.fill(&mut batch);
            if batch.is_empty() {
                break;
            }
            self.dispatch(&mut batch).await;
        }
        debug!("mailbox drained");
    }

    fn fill(&mut self, batch: &mut Vec<M>) {
        while batch.len() < self.batch_size {
            match self.receiver.try_recv() {
                Some(msg) => batch.push(msg),
                None => break,
            }
        }
    }

    async fn dispatch(&self, batch: &mut Vec<M>) {
        let mut tasks = JoinSet::new();
        {
            let handlers = self.handlers.read();
            for msg in batch.drain(..) {
                let kind = msg.kind();
                match handlers.get(&kind) {
                    Some(handler) => {
                        let handler = handler.clone();
                        tasks.spawn(async move {
                            (handler(msg).await, kind)
                        });
                    }
                    None => debug!(kind = kind.name(), "no handler registered, message dropped"),
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.processed.fetch_add(1, Ordering::Relaxed);
            match joined {
                Ok((Ok(()), _)) => {}
                Ok((Err(e), kind)) => warn!(kind = kind.name(), error = %e, "handler failed"),
                Err(e) if e.is_panic() => {
                    let err = ActorError::HandlerPanicked(panic_message(e.into_panic()));
                    error!(error = %err, "handler panicked");
                }
                Err(e) => warn!(error = %e, "handler task cancelled"),
            }
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
