use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use zdopt::actor::BaseActor;
use zdopt::context::ServerContext;
use zdopt::system::{ActorFactory, ActorSystem};
use zdopt::timer::{KeyframeTimer, KEYFRAME_POOL};
use zdopt::{Actor, ActorId, ActorState, BoxedActor, Message};

use test_helpers::{fast_config, wait_until};

#[derive(Message, Debug)]
enum PlayerMsg {
    Move(i64),
    Teleport(i64),
}

/// Actor with its own state, fed by messages and ticked by its group.
struct Player {
    base: BaseActor<PlayerMsg>,
    position: Arc<AtomicI64>,
    updates: AtomicUsize,
}

impl Player {
    fn new(ctx: &ServerContext) -> Arc<Self> {
        let base = BaseActor::new("player", ctx.config().actor.clone()).unwrap();
        let position = Arc::new(AtomicI64::new(0));

        let pos = position.clone();
        base.register(PlayerMsgKind::Move, move |msg| {
            let pos = pos.clone();
            async move {
                if let PlayerMsg::Move(dx) = msg {
                    pos.fetch_add(dx, Ordering::SeqCst);
                }
                Ok(())
            }
        });
        let pos = position.clone();
        base.register(PlayerMsgKind::Teleport, move |msg| {
            let pos = pos.clone();
            async move {
                if let PlayerMsg::Teleport(x) = msg {
                    pos.store(x, Ordering::SeqCst);
                }
                Ok(())
            }
        });

        Arc::new(Self {
            base,
            position,
            updates: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Actor for Player {
    fn id(&self) -> ActorId {
        self.base.id()
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    async fn init(&self, token: &CancellationToken) {
        self.base.init(token).await;
    }

    async fn update(&self, _delta: Duration) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.base.stop().await;
    }

    fn state(&self) -> ActorState {
        self.base.state()
    }
}

fn player_factory(players: Arc<Mutex<Vec<Arc<Player>>>>) -> ActorFactory {
    Box::new(move |ctx: &Arc<ServerContext>| -> BoxedActor {
        let player = Player::new(ctx);
        players.lock().push(player.clone());
        player
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_players_are_ticked_and_fed() -> anyhow::Result<()> {
    let system = ActorSystem::start(fast_config())?;
    let players = Arc::new(Mutex::new(Vec::new()));
    let ids = system
        .add_group_actors(1, (0..3).map(|_| player_factory(players.clone())).collect())
        .await?;
    assert_eq!(ids.len(), 3);

    let players: Vec<_> = players.lock().clone();
    for player in &players {
        for _ in 0..10 {
            player.base.tell(PlayerMsg::Move(2))?;
        }
    }

    assert!(
        wait_until(|| players.iter().all(|p| p.updates.load(Ordering::SeqCst) >= 3)).await,
        "group did not tick every player"
    );
    assert!(wait_until(|| players.iter().all(|p| p.position.load(Ordering::SeqCst) == 20)).await);

    system.stop().await;
    assert!(players.iter().all(|p| p.state() == ActorState::Stopped));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_messages_queued_before_stop_are_processed() -> anyhow::Result<()> {
    let system = ActorSystem::start(fast_config())?;
    let players = Arc::new(Mutex::new(Vec::new()));
    system.add_group_actors(3, vec![player_factory(players.clone())]).await?;
    let player = players.lock()[0].clone();

    player.base.tell(PlayerMsg::Teleport(100))?;
    for _ in 0..50 {
        player.base.tell(PlayerMsg::Move(1))?;
    }
    system.stop().await;

    // Messages of one batch run concurrently, so the teleport may land anywhere among the moves
    let position = player.position.load(Ordering::SeqCst);
    assert!((100..=150).contains(&position), "unexpected position {}", position);
    assert_eq!(player.base.processed(), 51);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timer_driven_by_group_ticks() -> anyhow::Result<()> {
    let system = ActorSystem::start(fast_config())?;
    let fired = Arc::new(AtomicUsize::new(0));
    let timer_slot: Arc<Mutex<Option<Arc<KeyframeTimer>>>> = Arc::new(Mutex::new(None));

    let factory: ActorFactory = {
        let fired = fired.clone();
        let timer_slot = timer_slot.clone();
        Box::new(move |ctx: &Arc<ServerContext>| -> BoxedActor {
            let timer = KeyframeTimer::new(ctx, 0.01).unwrap();
            for time in [0.05, 0.1] {
                let fired = fired.clone();
                timer
                    .add_key_frame(time, move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
            *timer_slot.lock() = Some(timer.clone());
            timer
        })
    };
    system.add_group_actors(2, vec![factory]).await?;

    let timer = timer_slot.lock().clone().unwrap();
    timer.start()?;

    assert!(wait_until(|| fired.load(Ordering::SeqCst) == 2).await, "keyframes did not fire");
    // A one-shot timer stops by itself past its last keyframe
    assert!(wait_until(|| !timer.is_running()).await);

    let metrics = system.metrics();
    let keyframes = metrics.pools.iter().find(|p| p.name == KEYFRAME_POOL).unwrap();
    assert_eq!(keyframes.in_use, 0);

    system.stop().await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_balancer_shared_through_context() -> anyhow::Result<()> {
    let system = ActorSystem::start(fast_config())?;
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let done = done.clone();
        system.context().balancer().submit(move || {
            done.fetch_add(1, Ordering::SeqCst);
        })?;
    }
    assert!(wait_until(|| done.load(Ordering::SeqCst) == 200).await);
    assert!(wait_until(|| system.metrics().balancer.completed == 200).await);

    let metrics = system.metrics();
    assert!(metrics.balancer.workers >= 2);
    assert!(metrics.balancer.workers <= 8);

    system.stop_with_timeout(Duration::from_secs(5)).await?;
    assert!(system.context().balancer().submit(|| {}).is_err());
    Ok(())
}

#[tokio::test]
async fn test_monitor_runs_until_stop() -> anyhow::Result<()> {
    let mut config = fast_config();
    config.monitor.enabled = true;
    config.monitor.interval = Duration::from_millis(10);
    let system = ActorSystem::start(config)?;
    system.add_group_actors(1, vec![player_factory(Arc::new(Mutex::new(Vec::new())))]).await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(system.metrics().actors, 1);
    system.stop_with_timeout(Duration::from_secs(5)).await?;
    Ok(())
}
