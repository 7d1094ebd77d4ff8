//! # Worker Balancer
//!
//! Elastic pool of worker tasks fed round-robin. Each worker owns a bounded
//! inbox; when the selected inbox is full the balancer adds one worker and
//! hands the task to it, so a submission never waits for a busy worker.
//!
//! The pool only grows, up to `max_workers`. Past that bound a submission
//! that finds its inbox full is rejected with [`BalancerError::Saturated`],
//! and the [`SubmitError`] hands the task back to the caller.
//! [`Balancer::metrics`] exposes the counters an external policy would need
//! to decide on contraction; the balancer itself never removes a worker.
//!
//! ## Execution
//!
//! Tasks are synchronous closures. Workers await each one on tokio's
//! blocking pool, so a task may sleep or do blocking I/O without holding an
//! executor thread that actors and group ticks depend on.
//!
//! ## Shutdown
//!
//! [`Balancer::shutdown`] (or cancelling the parent token) stops every
//! worker after its current task. Queued tasks are dropped and later
//! submissions fail with [`BalancerError::ShuttingDown`].

mod worker;

pub use worker::Task;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::BalancerConfig;
use crate::error::{BalancerError, ConfigError, SubmitError};
use crate::log_balancer;
use worker::{Worker, WorkerCounters};

/// Snapshot of balancer counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancerMetrics {
    pub workers: usize,
    pub max_workers: usize,
    /// Workers added after construction.
    pub expansions: usize,
    /// Tasks waiting in inboxes.
    pub queued: usize,
    pub completed: u64,
    pub panicked: u64,
}

/// Round-robin dispatcher over a growing set of workers.
///
/// The worker list sits behind a read-write lock: submissions take the read
/// side, expansion takes the write side and rechecks the bound.
pub struct Balancer {
    config: BalancerConfig,
    runtime: Handle,
    token: CancellationToken,
    workers: RwLock<Vec<Worker>>,
    cursor: AtomicUsize,
    expansions: AtomicUsize,
    counters: Arc<WorkerCounters>,
}

impl Balancer {
    /// Start `config.initial_workers` workers on `runtime`, cancelled with `parent`.
    pub fn new(config: BalancerConfig, runtime: Handle, parent: &CancellationToken) -> Result<Self, ConfigError> {
        config.validate()?;

        let token = parent.child_token();
        let counters = Arc::new(WorkerCounters::default());
        let workers = (0..config.initial_workers)
            .map(|id| Worker::spawn(id, config.inbox_capacity, &runtime, &token, counters.clone()))
            .collect();

        log_balancer!("started", workers = config.initial_workers, inbox = config.inbox_capacity);

        Ok(Self {
            config,
            runtime,
            token,
            workers: RwLock::new(workers),
            cursor: AtomicUsize::new(0),
            expansions: AtomicUsize::new(0),
            counters,
        })
    }

    /// Queue `task` on the next worker in round-robin order.
    ///
    /// Never blocks. A full inbox grows the pool by one worker, which takes
    /// the task.
    pub fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let task: Task = Box::new(task);
        if self.token.is_cancelled() {
            return Err(SubmitError::new(BalancerError::ShuttingDown, task));
        }

        let task = {
            let workers = self.workers.read();
            let next = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            match workers[next % workers.len()].try_send(task) {
                Ok(()) => return Ok(()),
                Err(task) => task,
            }
        };

        self.expand_with(task)
    }

    fn expand_with(&self, task: Task) -> Result<(), SubmitError> {
        let mut workers = self.workers.write();
        let current = workers.len();
        if current >= self.config.max_workers {
            log_balancer!("saturated", workers = current);
            return Err(SubmitError::new(BalancerError::Saturated { workers: current }, task));
        }

        let worker = Worker::spawn(
            current,
            self.config.inbox_capacity,
            &self.runtime,
            &self.token,
            self.counters.clone(),
        );
        // A fresh inbox always has room unless the balancer is shutting down
        if let Err(task) = worker.try_send(task) {
            worker.cancel();
            return Err(SubmitError::new(BalancerError::ShuttingDown, task));
        }
        workers.push(worker);
        self.expansions.fetch_add(1, Ordering::Relaxed);

        let target = (current + (current * self.config.growth_percent / 100).max(1)).min(self.config.max_workers);
        info!(workers = current + 1, target, max = self.config.max_workers, "balancer expanded");
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.read().len()
    }

    pub fn metrics(&self) -> BalancerMetrics {
        let workers = self.workers.read();
        BalancerMetrics {
            workers: workers.len(),
            max_workers: self.config.max_workers,
            expansions: self.expansions.load(Ordering::Relaxed),
            queued: workers.iter().map(Worker::queued).sum(),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel every worker and wait for their loops to exit.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let handles: Vec<_> = self.workers.write().iter_mut().filter_map(Worker::take_handle).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "balancer worker failed");
            }
        }
        log_balancer!("stopped");
    }
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer").field("metrics", &self.metrics()).finish()
    }
}
