use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::actor::base::panic_message;

/// Unit of work accepted by the balancer.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Counters shared by every worker of one balancer.
#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
}

/// One worker with its own bounded inbox.
///
/// The worker is an async loop on the runtime, but the tasks it receives are
/// plain closures that may block. Each one is handed to the runtime's
/// blocking pool and awaited there, so a slow task holds up only its own
/// worker and never an executor thread shared with actors and group ticks.
///
/// ## Ordering
///
/// Tasks run one at a time, in arrival order, until the token is cancelled.
/// Tasks still queued at cancellation are dropped. A task already running
/// when the token fires finishes before the loop exits.
///
/// ### Panics
///
/// A panicking task is caught on the blocking thread and counted in
/// [`WorkerCounters::panicked`]; the worker keeps serving its inbox.
pub(crate) struct Worker {
    id: usize,
    sender: flume::Sender<Task>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(
        id: usize,
        inbox_capacity: usize,
        runtime: &Handle,
        parent: &CancellationToken,
        counters: Arc<WorkerCounters>,
    ) -> Self {
        let (sender, receiver) = flume::bounded(inbox_capacity);
        let token = parent.child_token();
        let handle = runtime.spawn(run(id, receiver, token.clone(), counters));

        Self {
            id,
            sender,
            token,
            handle: Some(handle),
        }
    }

    /// Non-blocking enqueue; hands the task back when the inbox is full or closed.
    pub fn try_send(&self, task: Task) -> Result<(), Task> {
        self.sender.try_send(task).map_err(|e| e.into_inner())
    }

    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("queued", &self.queued())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

async fn run(
    id: usize,
    inbox: flume::Receiver<Task>,
    token: CancellationToken,
    counters: Arc<WorkerCounters>,
) {
    trace!(worker = id, "worker started");
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            received = inbox.recv_async() => match received {
                Ok(task) => execute(id, task, &counters).await,
                Err(_) => break,
            },
        }
    }
    trace!(worker = id, dropped = inbox.len(), "worker stopped");
}

async fn execute(id: usize, task: Task, counters: &WorkerCounters) {
    let outcome = tokio::task::spawn_blocking(move || panic::catch_unwind(AssertUnwindSafe(task))).await;
    match outcome {
        Ok(Ok(())) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(payload)) => {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            error!(worker = id, panic = %panic_message(payload), "task panicked");
        }
        Err(e) => error!(worker = id, error = %e, "blocking task was not run"),
    }
}
