use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::balancer::Task;

/// Errors raised when building a message queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue capacity must be a non-zero power of two (got {0})")]
    InvalidCapacity(usize),
}

/// Errors related to Mailbox operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("Mailbox is full (capacity: {capacity})")]
    Full { capacity: usize },
    #[error("Mailbox is closed")]
    Closed,
}

/// Errors related to object pools and the pool registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool name already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Pool not found: {0}")]
    NotFound(String),
    #[error("Object does not belong to pool {0}")]
    ForeignObject(String),
    #[error("Pool {pool} stores {stored}, not {requested}")]
    TypeMismatch {
        pool: String,
        stored: &'static str,
        requested: &'static str,
    },
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

/// Errors related to the worker balancer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalancerError {
    #[error("Balancer saturated: {workers} workers at the configured maximum")]
    Saturated { workers: usize },
    #[error("Balancer is shutting down")]
    ShuttingDown,
}

/// A rejected balancer submission. The task is handed back so the caller
/// can retry it later or run it elsewhere.
#[derive(Error)]
#[error("{reason}")]
pub struct SubmitError {
    reason: BalancerError,
    // Only taken by `into_task`; the lock makes the error Sync
    task: Mutex<Task>,
}

impl SubmitError {
    pub(crate) fn new(reason: BalancerError, task: Task) -> Self {
        Self {
            reason,
            task: Mutex::new(task),
        }
    }

    pub fn reason(&self) -> &BalancerError {
        &self.reason
    }

    pub fn into_task(self) -> Task {
        self.task.into_inner()
    }
}

impl fmt::Debug for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitError").field("reason", &self.reason).finish_non_exhaustive()
    }
}

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must be a power of two (got {value})")]
    NotPowerOfTwo { field: &'static str, value: usize },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors related to the message codec.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message type {0} is not registered")]
    Unregistered(&'static str),
    #[error("Serialize failed for {type_name}: {source}")]
    Serialize {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Deserialize failed for {type_name}: {source}")]
    Deserialize {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors related to keyframe timers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimerError {
    #[error("Timer already running")]
    AlreadyRunning,
    #[error("No key frames added")]
    NoKeyFrames,
    #[error("Invalid timer offset (must be > 0, got {0})")]
    InvalidOffset(f32),
    #[error("Invalid keyframe time (must be > 0, got {0})")]
    InvalidTime(f32),
    #[error("Timer actor is not running")]
    NotRunning,
    #[error("Timer mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
    #[error("Timer actor configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Keyframe pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errors related to network intake.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Network intake already started")]
    AlreadyStarted,
    #[error("Failed to open session: {0}")]
    Open(#[from] std::io::Error),
    #[error("Message pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errors related to the Actor System itself.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Actor system is already shutting down")]
    ShuttingDown,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Internal system error: {0}")]
    Other(#[from] anyhow::Error),
}
