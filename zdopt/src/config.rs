use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_WORKER_INBOX_CAPACITY: usize = 1024;
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(33);
pub const DEFAULT_HOT_CAPACITY: usize = 100;
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

// --- Configuration Enums ---

/// What a group does when an actor's previous update is still running at the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickPolicy {
    /// Skip that actor for this tick. Other actors are still updated.
    SkipIfBusy,
    /// Dispatch anyway, so updates of one actor may overlap.
    Overlap,
}

// --- Component Configuration ---

/// Configuration for an actor's mailbox and batch dispatch.
#[derive(Clone, Debug)]
pub struct ActorConfig {
    /// Capacity of the mailbox ring buffer, a power of two.
    pub mailbox_capacity: usize,

    /// Maximum number of messages dispatched together.
    pub batch_size: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Per-actor overrides, merged over the runtime defaults.
#[derive(Clone, Debug, Default)]
pub struct ActorOverrides {
    pub mailbox_capacity: Option<usize>,
    pub batch_size: Option<usize>,
}

/// Configuration for the worker balancer.
#[derive(Clone, Debug)]
pub struct BalancerConfig {
    /// Workers started at construction.
    pub initial_workers: usize,

    /// Bounded inbox capacity of every worker.
    pub inbox_capacity: usize,

    /// Upper bound the pool may grow to.
    pub max_workers: usize,

    /// Growth target per expansion, as a percentage of the current pool.
    pub growth_percent: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            initial_workers: cpus,
            inbox_capacity: DEFAULT_WORKER_INBOX_CAPACITY,
            max_workers: cpus * 10,
            growth_percent: 10,
        }
    }
}

/// Configuration for tick groups.
#[derive(Clone, Debug)]
pub struct GroupConfig {
    /// Interval between two ticks.
    pub tick_period: Duration,

    /// Behavior when an actor is still updating at the next tick.
    pub tick_policy: TickPolicy,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            tick_policy: TickPolicy::SkipIfBusy,
        }
    }
}

/// Defaults applied to pools created by the runtime.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Capacity of the lock-free hot cache.
    pub hot_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            hot_capacity: DEFAULT_HOT_CAPACITY,
        }
    }
}

/// Configuration for network intake.
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// Number of concurrent read workers.
    pub readers: usize,

    /// Size of the buffer every read lands in.
    pub read_buffer_size: usize,

    /// Capacity of the channel parsed messages are delivered on.
    pub channel_capacity: usize,

    /// Pause after a session could not be opened.
    pub reconnect_backoff: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            readers: num_cpus::get(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            channel_capacity: 1024,
            reconnect_backoff: Duration::from_millis(100),
        }
    }
}

/// Configuration for the periodic runtime monitor.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(5),
        }
    }
}

// --- Runtime Configuration ---

/// Configuration for the whole runtime.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub actor: ActorConfig,
    pub balancer: BalancerConfig,
    pub group: GroupConfig,
    pub pool: PoolConfig,
    pub intake: IntakeConfig,
    pub monitor: MonitorConfig,
}

impl RuntimeConfig {
    /// Reject configurations the runtime cannot honor, before anything is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.actor.validate()?;
        self.balancer.validate()?;

        if self.group.tick_period.is_zero() {
            return Err(ConfigError::Zero { field: "group.tick_period" });
        }
        if self.pool.hot_capacity == 0 {
            return Err(ConfigError::Zero { field: "pool.hot_capacity" });
        }
        if self.intake.readers == 0 {
            return Err(ConfigError::Zero { field: "intake.readers" });
        }
        if self.intake.read_buffer_size == 0 {
            return Err(ConfigError::Zero { field: "intake.read_buffer_size" });
        }
        if self.intake.channel_capacity == 0 {
            return Err(ConfigError::Zero { field: "intake.channel_capacity" });
        }
        if self.monitor.enabled && self.monitor.interval.is_zero() {
            return Err(ConfigError::Zero { field: "monitor.interval" });
        }
        Ok(())
    }

    /// Merge runtime defaults with actor-specific overrides.
    pub fn merge_with_actor_config(&self, overrides: &ActorOverrides) -> ActorConfig {
        ActorConfig {
            mailbox_capacity: overrides.mailbox_capacity.unwrap_or(self.actor.mailbox_capacity),
            batch_size: overrides.batch_size.unwrap_or(self.actor.batch_size),
        }
    }
}

impl ActorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Zero { field: "actor.mailbox_capacity" });
        }
        if !self.mailbox_capacity.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "actor.mailbox_capacity",
                value: self.mailbox_capacity,
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Zero { field: "actor.batch_size" });
        }
        Ok(())
    }
}

impl BalancerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_workers == 0 {
            return Err(ConfigError::Zero { field: "balancer.initial_workers" });
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Zero { field: "balancer.inbox_capacity" });
        }
        if self.max_workers < self.initial_workers {
            return Err(ConfigError::Invalid(format!(
                "balancer.max_workers ({}) is below balancer.initial_workers ({})",
                self.max_workers, self.initial_workers
            )));
        }
        Ok(())
    }
}
