use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use zdopt_api::{Actor, ActorId, ActorState, BoxedActor};

/// Minimal actor keeping its lifecycle in an atomic.
struct Lamp {
    id: ActorId,
    state: AtomicU8,
    ticks: AtomicUsize,
}

impl Lamp {
    fn new() -> Self {
        Self {
            id: ActorId::new(),
            state: AtomicU8::new(ActorState::Created.as_u8()),
            ticks: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Actor for Lamp {
    fn id(&self) -> ActorId {
        self.id
    }

    async fn init(&self, _token: &CancellationToken) {
        let _ = self.state.compare_exchange(
            ActorState::Created.as_u8(),
            ActorState::Running.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    async fn update(&self, _delta: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    async fn stop(&self) {
        self.state.store(ActorState::Stopped.as_u8(), Ordering::Release);
    }

    fn state(&self) -> ActorState {
        ActorState::from_u8(self.state.load(Ordering::Acquire))
    }
}

#[test]
fn test_state_encoding() {
    for state in [ActorState::Created, ActorState::Running, ActorState::Stopped] {
        assert_eq!(ActorState::from_u8(state.as_u8()), state);
    }
    assert_eq!(ActorState::from_u8(200), ActorState::Stopped);
}

#[test]
fn test_actor_ids_are_unique() {
    let ids: HashSet<ActorId> = (0..1000).map(|_| ActorId::new()).collect();
    assert_eq!(ids.len(), 1000);
    let id = ActorId::new();
    assert_eq!(id.to_string(), id.as_uuid().to_string());
}

#[tokio::test]
async fn test_lifecycle_through_trait_object() {
    let actor: BoxedActor = Arc::new(Lamp::new());
    assert_eq!(actor.name(), "actor");
    assert_eq!(actor.state(), ActorState::Created);

    let token = CancellationToken::new();
    actor.init(&token).await;
    actor.init(&token).await;
    actor.update(Duration::from_millis(33)).await;
    assert_eq!(actor.state(), ActorState::Running);

    actor.stop().await;
    assert_eq!(actor.state(), ActorState::Stopped);
}
