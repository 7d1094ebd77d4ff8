use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use zdopt_api::{Actor, BoxedActor};

use crate::actor::base::panic_message;
use crate::config::{GroupConfig, TickPolicy};

/// Identifier of a tick group.
pub type GroupId = u32;

struct Member {
    actor: BoxedActor,
    busy: Arc<AtomicBool>,
}

/// # Tick Group
///
/// Collection of actors ticked together on a fixed period.
///
/// ## Key Responsibilities
/// - Holding the member actors of one group id
/// - Driving `update(delta)` on every member once per period
/// - Keeping a slow member from delaying the others
///
/// ## Implementation Details
/// ### Tick Loop
/// 1. Wait for the next interval deadline (missed deadlines are skipped, not burst)
/// 2. Snapshot the members under the lock
/// 3. Spawn one `update` per member, passing the group period as the delta
/// 4. Repeat until the token handed to [`Group::start_update`] is cancelled
///
/// ### Overlap Policy
/// With [`TickPolicy::SkipIfBusy`] an actor whose previous update has not
/// finished is left out of the tick and counted in
/// [`Group::skipped_updates`]. With [`TickPolicy::Overlap`] updates of the
/// same actor may run concurrently.
///
/// ### Safety Considerations
/// - A panicking `update` is caught and logged; the member stays in the group
/// - The member lock is never held across an await
pub struct Group {
    id: GroupId,
    period: Duration,
    policy: TickPolicy,
    members: Mutex<Vec<Member>>,
    ticks: AtomicU64,
    skipped: AtomicU64,
}

impl Group {
    pub fn new(id: GroupId, config: &GroupConfig) -> Self {
        Self {
            id,
            period: config.tick_period,
            policy: config.tick_policy,
            members: Mutex::new(Vec::with_capacity(64)),
            ticks: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn add_actor(&self, actor: BoxedActor) {
        self.members.lock().push(Member {
            actor,
            busy: Arc::new(AtomicBool::new(false)),
        });
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the member actors.
    pub fn actors(&self) -> Vec<BoxedActor> {
        self.members.lock().iter().map(|m| m.actor.clone()).collect()
    }

    /// Updates skipped because the actor was still busy.
    pub fn skipped_updates(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Dispatch one update per member and return how many were dispatched.
    ///
    /// Does not wait for the updates to finish.
    pub fn tick(&self) -> usize {
        let snapshot: Vec<_> = self
            .members
            .lock()
            .iter()
            .map(|m| (m.actor.clone(), m.busy.clone()))
            .collect();

        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut dispatched = 0;
        for (actor, busy) in snapshot {
            if self.policy == TickPolicy::SkipIfBusy && busy.swap(true, Ordering::AcqRel) {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                trace!(group = self.id, actor = %actor.id(), "update still running, skipped");
                continue;
            }

            let delta = self.period;
            let group = self.id;
            tokio::spawn(async move {
                let result = AssertUnwindSafe(actor.update(delta)).catch_unwind().await;
                busy.store(false, Ordering::Release);
                if let Err(payload) = result {
                    error!(
                        group,
                        actor = %actor.id(),
                        panic = %panic_message(payload),
                        "actor update panicked"
                    );
                }
            });
            dispatched += 1;
        }
        dispatched
    }

    /// Tick every period until `token` is cancelled.
    ///
    /// The first tick happens one period after the call. Late ticks are
    /// skipped rather than bunched up.
    pub fn start_update(self: &Arc<Self>, token: &CancellationToken) -> JoinHandle<()> {
        let group = self.clone();
        let token = token.clone();

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + group.period, group.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(group = group.id, period = ?group.period, "group ticking");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        group.tick();
                    }
                }
            }
            debug!(group = group.id, ticks = group.ticks(), "group stopped ticking");
        })
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("period", &self.period)
            .field("policy", &self.policy)
            .field("actors", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use zdopt_api::{ActorId, ActorState};

    struct Ticker {
        id: ActorId,
        updates: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    impl Ticker {
        fn new(updates: Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self { id: ActorId::new(), updates, gate: None })
        }
    }

    #[async_trait]
    impl Actor for Ticker {
        fn id(&self) -> ActorId {
            self.id
        }

        async fn init(&self, _token: &CancellationToken) {}

        async fn update(&self, _delta: Duration) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }

        async fn stop(&self) {}

        fn state(&self) -> ActorState {
            ActorState::Running
        }
    }

    struct Exploding;

    #[async_trait]
    impl Actor for Exploding {
        fn id(&self) -> ActorId {
            ActorId::default()
        }

        async fn init(&self, _token: &CancellationToken) {}

        async fn update(&self, _delta: Duration) {
            panic!("update failed");
        }

        async fn stop(&self) {}

        fn state(&self) -> ActorState {
            ActorState::Running
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_one_tick_updates_every_actor_once() {
        let group = Group::new(1, &GroupConfig::default());
        let updates = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            group.add_actor(Ticker::new(updates.clone()));
        }

        assert_eq!(group.tick(), 3);
        settle().await;
        assert_eq!(updates.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_busy_actor_skipped() {
        let group = Group::new(2, &GroupConfig::default());
        let updates = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        group.add_actor(Arc::new(Ticker {
            id: ActorId::new(),
            updates: updates.clone(),
            gate: Some(gate.clone()),
        }));
        group.add_actor(Ticker::new(updates.clone()));

        assert_eq!(group.tick(), 2);
        settle().await;
        // The gated actor is still inside its first update
        assert_eq!(group.tick(), 1);
        assert_eq!(group.skipped_updates(), 1);

        gate.notify_waiters();
        settle().await;
        assert_eq!(group.tick(), 2);
        settle().await;
        gate.notify_waiters();
        assert_eq!(updates.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_overlap_policy_dispatches_busy_actor() {
        let config = GroupConfig {
            tick_policy: TickPolicy::Overlap,
            ..GroupConfig::default()
        };
        let group = Group::new(3, &config);
        let updates = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        group.add_actor(Arc::new(Ticker {
            id: ActorId::new(),
            updates: updates.clone(),
            gate: Some(gate.clone()),
        }));

        assert_eq!(group.tick(), 1);
        settle().await;
        assert_eq!(group.tick(), 1);
        settle().await;
        assert_eq!(updates.load(Ordering::SeqCst), 2);
        gate.notify_waiters();
    }

    #[tokio::test]
    async fn test_panicking_update_clears_busy_flag() {
        let group = Group::new(4, &GroupConfig::default());
        group.add_actor(Arc::new(Exploding));

        assert_eq!(group.tick(), 1);
        settle().await;
        assert_eq!(group.tick(), 1);
        assert_eq!(group.skipped_updates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_update_ticks_on_period() {
        let config = GroupConfig {
            tick_period: Duration::from_millis(10),
            ..GroupConfig::default()
        };
        let group = Arc::new(Group::new(5, &config));
        let updates = Arc::new(AtomicUsize::new(0));
        group.add_actor(Ticker::new(updates.clone()));

        let token = CancellationToken::new();
        let handle = group.start_update(&token);

        time::sleep(Duration::from_millis(35)).await;
        settle().await;
        assert_eq!(updates.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
        assert_eq!(group.ticks(), 3);
    }
}
