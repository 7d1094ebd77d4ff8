//! Keyframe timers.
//!
//! A [`KeyframeTimer`] is an actor that owns a [`Timeline`] of pooled
//! [`KeyFrame`]s. Group ticks are turned into `TimerMsg::Tick` messages, so
//! the timeline only ever moves inside the actor's own processing task.

mod keyframe;
mod timeline;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use zdopt_api::{Actor, ActorId, ActorState, Message};

use crate::actor::base::panic_message;
use crate::actor::BaseActor;
use crate::context::ServerContext;
use crate::error::{MailboxError, TimerError};

pub use keyframe::{keyframe_pool, KeyFrame, KeyFrameAction, KEYFRAME_POOL};
pub use timeline::{Advance, Timeline};

/// Messages handled by a [`KeyframeTimer`].
#[derive(Message)]
pub enum TimerMsg {
    /// Advance the timeline by this many seconds.
    Tick(f32),
    Stop(oneshot::Sender<Result<(), TimerError>>),
    Reset(oneshot::Sender<()>),
}

/// Actor firing keyframe actions as its timeline advances.
pub struct KeyframeTimer {
    base: BaseActor<TimerMsg>,
    timeline: Arc<Mutex<Timeline>>,
}

impl KeyframeTimer {
    /// Timer whose keyframes fire `offset` seconds ahead of their time.
    ///
    /// Keyframes come from the context's shared keyframe pool.
    pub fn new(ctx: &ServerContext, offset: f32) -> Result<Arc<Self>, TimerError> {
        let pool = keyframe_pool(ctx.pools(), ctx.config().pool.hot_capacity)?;
        let timeline = Arc::new(Mutex::new(Timeline::new(pool, offset)?));
        let base = BaseActor::new("keyframe_timer", ctx.config().actor.clone())?;

        let tl = timeline.clone();
        base.register(TimerMsgKind::Tick, move |msg| {
            let timeline = tl.clone();
            async move {
                if let TimerMsg::Tick(delta) = msg {
                    let advance = timeline.lock().advance(delta);
                    match advance {
                        Advance::Fired(actions) => actions.into_iter().for_each(fire),
                        Advance::Finished => debug!("timeline finished"),
                        Advance::Looped | Advance::Idle => {}
                    }
                }
                Ok(())
            }
        });

        let tl = timeline.clone();
        base.register(TimerMsgKind::Stop, move |msg| {
            let timeline = tl.clone();
            async move {
                if let TimerMsg::Stop(ack) = msg {
                    let result = timeline.lock().stop();
                    let _ = ack.send(result);
                }
                Ok(())
            }
        });

        let tl = timeline.clone();
        base.register(TimerMsgKind::Reset, move |msg| {
            let timeline = tl.clone();
            async move {
                if let TimerMsg::Reset(ack) = msg {
                    timeline.lock().reset();
                    let _ = ack.send(());
                }
                Ok(())
            }
        });

        Ok(Arc::new(Self { base, timeline }))
    }

    pub fn set_looping(&self, looping: bool) {
        self.timeline.lock().set_looping(looping);
    }

    /// Add a keyframe `time` seconds into the timeline. Not allowed while running.
    pub fn add_key_frame<F>(&self, time: f32, action: F) -> Result<(), TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.timeline.lock().add(time, Arc::new(action))
    }

    /// Start the timeline from zero. The actor itself must be running.
    pub fn start(&self) -> Result<(), TimerError> {
        if self.base.state() != ActorState::Running {
            return Err(TimerError::NotRunning);
        }
        self.timeline.lock().start()
    }

    /// Stop the timeline and release its keyframes.
    ///
    /// The request goes through the mailbox, so ticks from earlier batches
    /// have been applied. A tick in the same batch may run on either side of
    /// the stop; one that lands after it finds the timeline idle.
    pub async fn stop_timer(&self) -> Result<(), TimerError> {
        let (tx, rx) = oneshot::channel();
        self.base.tell(TimerMsg::Stop(tx))?;
        rx.await.map_err(|_| TimerError::NotRunning)?
    }

    /// Rewind the timeline to zero and re-arm every keyframe.
    ///
    /// Same ordering as [`KeyframeTimer::stop_timer`]: a tick sharing the
    /// batch may be applied before or after the rewind.
    pub async fn reset(&self) -> Result<(), TimerError> {
        let (tx, rx) = oneshot::channel();
        self.base.tell(TimerMsg::Reset(tx))?;
        rx.await.map_err(|_| TimerError::NotRunning)
    }

    pub fn is_running(&self) -> bool {
        self.timeline.lock().is_running()
    }

    pub fn progress(&self) -> f32 {
        self.timeline.lock().progress()
    }

    pub fn current_time(&self) -> f32 {
        self.timeline.lock().current()
    }
}

fn fire(action: KeyFrameAction) {
    tokio::spawn(async move {
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| action())) {
            error!(panic = %panic_message(payload), "keyframe action panicked");
        }
    });
}

#[async_trait]
impl Actor for KeyframeTimer {
    fn id(&self) -> ActorId {
        self.base.id()
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    async fn init(&self, token: &CancellationToken) {
        self.base.init(token).await;
    }

    async fn update(&self, delta: Duration) {
        if !self.is_running() {
            return;
        }
        match self.base.tell(TimerMsg::Tick(delta.as_secs_f32())) {
            Ok(()) => {}
            Err(MailboxError::Full { capacity }) => trace!(capacity, "timer tick dropped"),
            Err(MailboxError::Closed) => {}
        }
    }

    async fn stop(&self) {
        self.base.stop().await;
        if let Err(e) = self.timeline.lock().stop() {
            error!(id = %self.base.id(), error = %e, "releasing keyframes failed");
        }
    }

    fn state(&self) -> ActorState {
        self.base.state()
    }
}

impl fmt::Debug for KeyframeTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeline = self.timeline.lock();
        f.debug_struct("KeyframeTimer")
            .field("id", &self.base.id())
            .field("running", &timeline.is_running())
            .field("keyframes", &timeline.len())
            .field("current", &timeline.current())
            .finish()
    }
}
