use std::fmt;
use std::sync::Arc;

use zdopt_api::Poolable;

use crate::error::PoolError;
use crate::pool::{GenericPool, PoolManager};

/// Name the keyframe pool is registered under.
pub const KEYFRAME_POOL: &str = "keyframe_pool";

/// Callback fired when a keyframe is reached. Looping timers fire it repeatedly.
pub type KeyFrameAction = Arc<dyn Fn() + Send + Sync>;

/// A timed callback on a timer's timeline.
#[derive(Default)]
pub struct KeyFrame {
    /// Seconds from the start of the timeline.
    pub time: f32,
    pub action: Option<KeyFrameAction>,
    pub triggered: bool,
}

impl KeyFrame {
    pub fn set(&mut self, time: f32, action: KeyFrameAction) {
        self.time = time;
        self.action = Some(action);
        self.triggered = false;
    }

    /// Mark as triggered and return the action to run, unless already triggered.
    pub fn trigger(&mut self) -> Option<KeyFrameAction> {
        if self.triggered {
            return None;
        }
        self.triggered = true;
        self.action.clone()
    }

    pub fn reset(&mut self) {
        self.triggered = false;
    }
}

impl Poolable for KeyFrame {
    fn on_get(&mut self) {
        self.triggered = false;
    }

    fn on_release(&mut self) {
        self.time = 0.0;
        self.action = None;
        self.triggered = false;
    }
}

impl fmt::Debug for KeyFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFrame")
            .field("time", &self.time)
            .field("has_action", &self.action.is_some())
            .field("triggered", &self.triggered)
            .finish()
    }
}

/// The shared keyframe pool of `pools`, registered on first use.
pub fn keyframe_pool(pools: &PoolManager, hot_capacity: usize) -> Result<Arc<GenericPool<KeyFrame>>, PoolError> {
    pools.get_or_register(KEYFRAME_POOL, || GenericPool::new(KEYFRAME_POOL, KeyFrame::default, hot_capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_trigger_once_until_reset() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let mut frame = KeyFrame::default();
        frame.set(1.5, Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        frame.trigger().unwrap()();
        assert!(frame.trigger().is_none());
        frame.reset();
        frame.trigger().unwrap()();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_clears_action() {
        let pools = PoolManager::new();
        let pool = keyframe_pool(&pools, 4).unwrap();

        let mut frame = pool.get();
        frame.set(2.0, Arc::new(|| {}));
        frame.triggered = true;
        pool.release_obj(frame).unwrap();

        let frame = pool.get();
        assert_eq!(frame.time, 0.0);
        assert!(frame.action.is_none());
        assert!(!frame.triggered);
    }

    #[test]
    fn test_pool_registered_once() {
        let pools = PoolManager::new();
        let first = keyframe_pool(&pools, 4).unwrap();
        let second = keyframe_pool(&pools, 16).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.hot_capacity(), 4);
    }
}
