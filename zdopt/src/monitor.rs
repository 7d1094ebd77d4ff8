//! Periodic runtime snapshots.
//!
//! The monitor only observes: it logs a [`RuntimeMetrics`] snapshot every
//! interval and never resizes anything. Policies that react to load (for
//! example contracting the balancer) can poll the same snapshot through
//! `ActorSystem::metrics`.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::balancer::BalancerMetrics;
use crate::pool::PoolStats;
use crate::system::ActorSystem;

/// Point-in-time view of the whole runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMetrics {
    pub groups: usize,
    pub actors: usize,
    /// Updates skipped across all groups because an actor was still busy.
    pub skipped_updates: u64,
    pub balancer: BalancerMetrics,
    pub pools: Vec<PoolStats>,
}

impl RuntimeMetrics {
    /// Objects checked out across every registered pool.
    pub fn pooled_in_use(&self) -> usize {
        self.pools.iter().map(|p| p.in_use).sum()
    }
}

/// Log a snapshot of `system` every `interval` until `token` is cancelled.
///
/// Holds the system weakly, so a dropped system also ends the monitor.
pub fn spawn(system: Weak<ActorSystem>, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(system) = system.upgrade() else { break };
                    report(&system.metrics());
                }
            }
        }
    })
}

fn report(metrics: &RuntimeMetrics) {
    info!(
        groups = metrics.groups,
        actors = metrics.actors,
        skipped_updates = metrics.skipped_updates,
        workers = metrics.balancer.workers,
        expansions = metrics.balancer.expansions,
        queued = metrics.balancer.queued,
        completed = metrics.balancer.completed,
        panicked = metrics.balancer.panicked,
        pooled_in_use = metrics.pooled_in_use(),
        "runtime metrics"
    );
}
