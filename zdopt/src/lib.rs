//! # zdopt runtime
//!
//! Concurrent actor runtime for game and application servers. Actors are
//! ticked in groups on a fixed cadence and fed through bounded lock-free
//! mailboxes; arbitrary work goes to a self-expanding worker balancer; and
//! transient objects (keyframes, network messages) come from two-tier pools.
//!
//! ```rust,ignore
//! use zdopt::{ActorSystem, RuntimeConfig};
//!
//! let system = ActorSystem::start(RuntimeConfig::default())?;
//! system.add_group_actors(1, vec![Box::new(|ctx| make_player(ctx))]).await?;
//! system.stop().await;
//! ```

pub mod actor;
pub mod balancer;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod logging;
pub mod monitor;
pub mod network;
pub mod pool;
pub mod queue;
pub mod system;
pub mod timer;

// Re-export commonly used types
pub use actor::BaseActor;
pub use balancer::{Balancer, BalancerMetrics, Task};
pub use codec::{Codec, JsonCodec, WireMessage};
pub use config::{
    ActorConfig, ActorOverrides, BalancerConfig, GroupConfig, IntakeConfig, MonitorConfig, PoolConfig,
    RuntimeConfig, TickPolicy,
};
pub use context::ServerContext;
pub use error::{
    BalancerError, CodecError, ConfigError, IntakeError, MailboxError, PoolError, QueueError, SubmitError,
    SystemError, TimerError,
};
pub use group::{Group, GroupId};
pub use monitor::RuntimeMetrics;
pub use network::{NetMessage, NetworkIntake, SessionSource, UdpSessionSource};
pub use pool::{GenericPool, ObjectPool, PoolManager, PoolStats, Pooled};
pub use system::{ActorFactory, ActorSystem};
pub use timer::{KeyFrame, KeyframeTimer, TimerMsg};

pub use zdopt_api::{
    Actor, ActorError, ActorId, ActorResult, ActorState, BoxedActor, BoxedFuture, Message, MessageKind, Poolable,
    Session,
};
