use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Actor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Created,
    Running,
    Stopped,
}

impl ActorState {
    /// Encode for storage in an atomic.
    pub fn as_u8(self) -> u8 {
        match self {
            ActorState::Created => 0,
            ActorState::Running => 1,
            ActorState::Stopped => 2,
        }
    }

    /// Decode a value written by [`ActorState::as_u8`]. Unknown values read as stopped.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ActorState::Created,
            1 => ActorState::Running,
            _ => ActorState::Stopped,
        }
    }
}

/// Unique identifier of an actor.
///
/// Uses UUID v4 so identifiers never collide between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Core Actor trait
///
/// Actors are shared as `Arc<dyn Actor>` between their group (which ticks
/// them) and the system (which stops them), so every method takes `&self`
/// and implementations keep their mutable state behind their own locks.
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Identity of this actor
    fn id(&self) -> ActorId;

    /// Human readable name used in logs
    fn name(&self) -> &str {
        "actor"
    }

    /// Start the actor's processing task, bound to a child of `token`.
    ///
    /// Calling `init` on an actor that is already running is a no-op.
    async fn init(&self, token: &CancellationToken);

    /// Advance the actor by one tick of its group.
    async fn update(&self, delta: Duration);

    /// Stop the actor. Buffered messages are processed before this returns.
    async fn stop(&self);

    /// Get Actor state
    fn state(&self) -> ActorState;
}
