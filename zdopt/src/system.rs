use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use zdopt_api::{Actor, ActorId, BoxedActor};

use crate::config::RuntimeConfig;
use crate::context::ServerContext;
use crate::error::SystemError;
use crate::group::{Group, GroupId};
use crate::log_system;
use crate::monitor::{self, RuntimeMetrics};

/// Builds one actor from the shared context.
pub type ActorFactory = Box<dyn FnOnce(&Arc<ServerContext>) -> BoxedActor + Send>;

/// # Actor System
///
/// Owner of every group and the actors in them.
///
/// ## Key Responsibilities
/// - Creating groups on first reference and starting their tick loops
/// - Building actors from factories and initializing them with the root token
/// - Running the optional metrics monitor
/// - Coordinated shutdown of actors, balancer and background tasks
///
/// ## Shutdown Sequence
/// 1. Cancel the root token of the [`ServerContext`]; tick loops end and
///    every actor's processing task closes its mailbox and drains it
/// 2. Call `stop` on every actor concurrently
/// 3. Shut the balancer down and wait for its workers
/// 4. Await the group and monitor tasks
///
/// Cancelling the root token directly has the same effect on actors as
/// step 1. [`ActorSystem::stop`] is idempotent; [`ActorSystem::stop_with_timeout`]
/// bounds it.
pub struct ActorSystem {
    context: Arc<ServerContext>,
    groups: RwLock<HashMap<GroupId, Arc<Group>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl ActorSystem {
    /// Start a system on the current tokio runtime.
    pub fn start(config: RuntimeConfig) -> Result<Arc<Self>, SystemError> {
        let context = ServerContext::from_current(config)?;
        Ok(Self::with_context(context))
    }

    /// Start a system around an existing context.
    pub fn with_context(context: Arc<ServerContext>) -> Arc<Self> {
        let system = Arc::new(Self {
            context,
            groups: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        });

        let monitor_config = &system.context.config().monitor;
        if monitor_config.enabled {
            let handle = monitor::spawn(
                Arc::downgrade(&system),
                monitor_config.interval,
                system.context.token().child_token(),
            );
            system.tasks.lock().push(handle);
        }

        log_system!("system_start", "completed");
        system
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Build actors with `factories`, initialize them, and add them to group `group_id`.
    pub async fn add_group_actors(
        &self,
        group_id: GroupId,
        factories: Vec<ActorFactory>,
    ) -> Result<Vec<ActorId>, SystemError> {
        if self.is_stopped() {
            return Err(SystemError::ShuttingDown);
        }

        let group = self.get_or_create_group(group_id);
        let mut ids = Vec::with_capacity(factories.len());
        for factory in factories {
            let actor = factory(&self.context);
            actor.init(self.context.token()).await;
            ids.push(actor.id());
            group.add_actor(actor);
        }

        debug!(group = group_id, added = ids.len(), total = group.len(), "actors added");
        Ok(ids)
    }

    /// Existing group, or a new one that starts ticking right away.
    pub fn get_or_create_group(&self, group_id: GroupId) -> Arc<Group> {
        if let Some(group) = self.groups.read().get(&group_id) {
            return group.clone();
        }

        let mut groups = self.groups.write();
        if let Some(group) = groups.get(&group_id) {
            return group.clone();
        }

        let group = Arc::new(Group::new(group_id, &self.context.config().group));
        let handle = group.start_update(self.context.token());
        self.tasks.lock().push(handle);
        groups.insert(group_id, group.clone());

        log_system!("group_created", "completed", group = group_id, period = ?group.period());
        group
    }

    pub fn group(&self, group_id: GroupId) -> Option<Arc<Group>> {
        self.groups.read().get(&group_id).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    fn all_actors(&self) -> Vec<BoxedActor> {
        self.groups.read().values().flat_map(|g| g.actors()).collect()
    }

    /// Cancel the root token, stop every actor and wait for background tasks.
    ///
    /// Only the first call does any work.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!("actor system already stopped");
            return;
        }
        log_system!("shutdown", "started");

        self.context.token().cancel();

        let actors = self.all_actors();
        let count = actors.len();
        join_all(actors.iter().map(|actor| actor.stop())).await;

        self.context.balancer().shutdown().await;

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!(error = %e, "background task failed during shutdown");
            }
        }

        log_system!("shutdown", "completed", actors = count);
    }

    /// [`ActorSystem::stop`], bounded by `timeout`.
    pub async fn stop_with_timeout(&self, timeout: Duration) -> Result<(), SystemError> {
        match tokio::time::timeout(timeout, self.stop()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(?timeout, "actor system shutdown timed out");
                Err(SystemError::Timeout(timeout))
            }
        }
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        let groups = self.groups.read();
        RuntimeMetrics {
            groups: groups.len(),
            actors: groups.values().map(|g| g.len()).sum(),
            skipped_updates: groups.values().map(|g| g.skipped_updates()).sum(),
            balancer: self.context.balancer().metrics(),
            pools: self.context.pools().stats(),
        }
    }
}

impl Drop for ActorSystem {
    fn drop(&mut self) {
        if !self.stopped.load(Ordering::Acquire) {
            info!("actor system dropped without stop, cancelling root token");
            self.context.token().cancel();
        }
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("groups", &self.group_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::BaseActor;
    use crate::config::ActorConfig;
    use zdopt_api::{ActorState, Message};

    #[derive(Message, Debug)]
    enum Ping {
        Ping,
    }

    fn ping_factory() -> ActorFactory {
        Box::new(|_ctx: &Arc<ServerContext>| -> BoxedActor {
            Arc::new(BaseActor::<Ping>::new("ping", ActorConfig::default()).unwrap())
        })
    }

    #[tokio::test]
    async fn test_groups_created_once() {
        let system = ActorSystem::start(RuntimeConfig::default()).unwrap();
        system.add_group_actors(7, vec![ping_factory(), ping_factory()]).await.unwrap();
        system.add_group_actors(7, vec![ping_factory()]).await.unwrap();
        system.add_group_actors(8, vec![ping_factory()]).await.unwrap();

        assert_eq!(system.group_count(), 2);
        assert_eq!(system.group(7).unwrap().len(), 3);

        let metrics = system.metrics();
        assert_eq!(metrics.groups, 2);
        assert_eq!(metrics.actors, 4);
        system.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_reference_creates_one_group() {
        let system = ActorSystem::start(RuntimeConfig::default()).unwrap();
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let system = system.clone();
                tokio::spawn(async move { system.get_or_create_group(42) })
            })
            .collect();

        let mut groups = Vec::new();
        for task in tasks {
            groups.push(task.await.unwrap());
        }
        assert!(groups.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(system.group_count(), 1);
        system.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let system = ActorSystem::start(RuntimeConfig::default()).unwrap();
        system.add_group_actors(1, vec![ping_factory()]).await.unwrap();
        let actor = system.group(1).unwrap().actors()[0].clone();
        assert_eq!(actor.state(), ActorState::Running);

        system.stop().await;
        system.stop().await;
        assert_eq!(actor.state(), ActorState::Stopped);
        assert!(system.context().token().is_cancelled());

        assert!(matches!(
            system.add_group_actors(1, vec![ping_factory()]).await,
            Err(SystemError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_stop_with_timeout() {
        let system = ActorSystem::start(RuntimeConfig::default()).unwrap();
        system.add_group_actors(1, vec![ping_factory()]).await.unwrap();
        system.stop_with_timeout(Duration::from_secs(5)).await.unwrap();
    }
}
