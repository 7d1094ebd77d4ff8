use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

use zdopt_api::Poolable;

use super::object::{Hook, PooledObject};
use crate::error::PoolError;
use crate::log_pool;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Factory producing fresh pool values.
pub type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Point-in-time counters of one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    /// Idle slots in the hot cache.
    pub hot_idle: usize,
    /// Idle slots in the overflow tier.
    pub overflow_idle: usize,
    /// Slots currently checked out.
    pub in_use: usize,
    /// Values produced by the factory since construction.
    pub created: usize,
}

/// Two-tier object pool.
///
/// Idle slots live first in a bounded lock-free hot cache, then in a
/// mutex-guarded overflow list that is never bounded. A checkout that finds
/// both tiers empty creates a new slot through the factory, so `get_obj`
/// never blocks and never fails.
pub struct GenericPool<T: Poolable> {
    id: u64,
    name: String,
    factory: Factory<T>,
    hot: ArrayQueue<Arc<PooledObject<T>>>,
    overflow: Mutex<Vec<Arc<PooledObject<T>>>>,
    created: AtomicUsize,
    in_use: AtomicUsize,
    warm: AtomicBool,
    warmed: Notify,
}

impl<T: Poolable> GenericPool<T> {
    /// Build a pool and start filling its hot cache.
    ///
    /// Inside a tokio runtime the cache is filled by a spawned task and
    /// [`GenericPool::wait_warm`] resolves once it is full; outside a runtime
    /// it is filled before this returns.
    pub fn new<F>(name: impl Into<String>, factory: F, hot_capacity: usize) -> Result<Arc<Self>, PoolError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let name = name.into();
        if hot_capacity == 0 {
            return Err(PoolError::InvalidConfig(format!(
                "pool {} needs a non-zero hot capacity",
                name
            )));
        }

        let pool = Arc::new(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            name,
            factory: Arc::new(factory),
            hot: ArrayQueue::new(hot_capacity),
            overflow: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
            warm: AtomicBool::new(false),
            warmed: Notify::new(),
        });

        match Handle::try_current() {
            Ok(handle) => {
                let warming = pool.clone();
                handle.spawn(async move { warming.warm_up() });
            }
            Err(_) => pool.warm_up(),
        }

        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hot_capacity(&self) -> usize {
        self.hot.capacity()
    }

    fn new_slot(&self) -> Arc<PooledObject<T>> {
        self.created.fetch_add(1, Ordering::Relaxed);
        Arc::new(PooledObject::new((self.factory)()))
    }

    fn warm_up(&self) {
        let mut filled = 0;
        while self.hot.len() < self.hot.capacity() {
            if self.hot.push(self.new_slot()).is_err() {
                break;
            }
            filled += 1;
        }
        self.warm.store(true, Ordering::Release);
        self.warmed.notify_waiters();
        log_pool!(self.name.as_str(), "warmed", objects = filled);
    }

    pub fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Acquire)
    }

    /// Resolve once the hot cache has been filled.
    pub async fn wait_warm(&self) {
        loop {
            let notified = self.warmed.notified();
            if self.is_warm() {
                return;
            }
            notified.await;
        }
    }

    fn take_idle(&self) -> Option<Arc<PooledObject<T>>> {
        self.hot.pop().or_else(|| self.overflow.lock().pop())
    }

    /// Check out a value with per-checkout hooks.
    ///
    /// `T::on_get` runs first, then `on_acquire`. On return `on_release` runs
    /// first, then `T::on_release`.
    pub fn get_obj<A, R>(self: &Arc<Self>, mut on_acquire: A, mut on_release: R) -> Pooled<T>
    where
        A: FnMut(&mut T) + Send + 'static,
        R: FnMut(&mut T) + Send + 'static,
    {
        let acquire: Hook<T> = Box::new(move |value: &mut T| {
            value.on_get();
            on_acquire(value);
        });
        let release: Hook<T> = Box::new(move |value: &mut T| {
            on_release(value);
            value.on_release();
        });

        let mut hooks = (acquire, release);
        let (slot, value) = loop {
            let slot = match self.take_idle() {
                Some(slot) => slot,
                None => {
                    debug!(pool = %self.name, "hot cache and overflow empty, creating object");
                    self.new_slot()
                }
            };
            match slot.checkout(hooks.0, hooks.1) {
                Ok(value) => break (slot, value),
                Err(returned) => {
                    warn!(pool = %self.name, "idle slot was still checked out, discarding it");
                    hooks = returned;
                }
            }
        };

        self.in_use.fetch_add(1, Ordering::Relaxed);
        Pooled {
            value: Some(value),
            slot: Some(slot),
            pool: Arc::downgrade(self),
            pool_id: self.id,
        }
    }

    /// Check out a value with no extra hooks.
    pub fn get(self: &Arc<Self>) -> Pooled<T> {
        self.get_obj(|_| {}, |_| {})
    }

    /// Return a lease to this pool.
    ///
    /// A lease from another pool is rejected with [`PoolError::ForeignObject`]
    /// and goes back to the pool it came from.
    pub fn release_obj(&self, mut pooled: Pooled<T>) -> Result<(), PoolError> {
        if pooled.pool_id != self.id {
            return Err(PoolError::ForeignObject(self.name.clone()));
        }
        if let (Some(slot), Some(value)) = (pooled.slot.take(), pooled.value.take()) {
            self.put_back(slot, value);
        }
        Ok(())
    }

    fn put_back(&self, slot: Arc<PooledObject<T>>, value: T) {
        if slot.release_obj(value).is_err() {
            warn!(pool = %self.name, "released slot was not checked out, dropping value");
            return;
        }
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        if let Err(slot) = self.hot.push(slot) {
            self.overflow.lock().push(slot);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            name: self.name.clone(),
            hot_idle: self.hot.len(),
            overflow_idle: self.overflow.lock().len(),
            in_use: self.in_use.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
        }
    }
}

impl<T: Poolable> fmt::Debug for GenericPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericPool")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A checked-out pool value.
///
/// Dropping a lease that was not released returns it to its pool.
pub struct Pooled<T: Poolable> {
    value: Option<T>,
    slot: Option<Arc<PooledObject<T>>>,
    pool: Weak<GenericPool<T>>,
    pool_id: u64,
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("lease value is present until the lease is consumed"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("lease value is present until the lease is consumed"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let (Some(slot), Some(value)) = (self.slot.take(), self.value.take()) {
            if let Some(pool) = self.pool.upgrade() {
                pool.put_back(slot, value);
            }
        }
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Buffer {
        data: Vec<u8>,
        gets: usize,
        releases: usize,
    }

    impl Poolable for Buffer {
        fn on_get(&mut self) {
            self.gets += 1;
        }

        fn on_release(&mut self) {
            self.releases += 1;
            self.data.clear();
        }
    }

    #[test]
    fn test_warms_synchronously_without_runtime() {
        let pool = GenericPool::new("sync", Buffer::default, 8).unwrap();
        assert!(pool.is_warm());
        assert_eq!(pool.stats().hot_idle, 8);
        assert_eq!(pool.stats().created, 8);
    }

    #[test]
    fn test_zero_hot_capacity_rejected() {
        assert!(matches!(
            GenericPool::new("empty", Buffer::default, 0),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_warm_checkouts_do_not_allocate() {
        let pool = GenericPool::new("warm", Buffer::default, 16).unwrap();
        pool.wait_warm().await;

        let leases: Vec<_> = (0..16).map(|_| pool.get()).collect();
        assert_eq!(pool.stats().created, 16);
        assert_eq!(pool.stats().in_use, 16);

        // The next checkout misses both tiers
        let extra = pool.get();
        assert_eq!(pool.stats().created, 17);

        drop(leases);
        drop(extra);
        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.hot_idle, 16);
        assert_eq!(stats.overflow_idle, 1);
    }

    #[test]
    fn test_lifecycle_hooks_on_every_cycle() {
        let pool = GenericPool::new("hooks", Buffer::default, 1).unwrap();

        let mut lease = pool.get_obj(|b| b.data.push(7), |b| b.data.push(8));
        assert_eq!(lease.gets, 1);
        assert_eq!(lease.data, vec![7]);
        lease.data.push(42);
        pool.release_obj(lease).unwrap();

        // Caller hook ran before on_release cleared the data
        let lease = pool.get();
        assert_eq!(lease.gets, 2);
        assert_eq!(lease.releases, 1);
        assert!(lease.data.is_empty());
    }

    #[test]
    fn test_release_to_foreign_pool_rejected() {
        let first = GenericPool::new("first", Buffer::default, 2).unwrap();
        let second = GenericPool::new("second", Buffer::default, 2).unwrap();

        let lease = first.get();
        assert_eq!(
            second.release_obj(lease),
            Err(PoolError::ForeignObject("second".to_string()))
        );

        // The rejected lease went home
        assert_eq!(first.stats().in_use, 0);
        assert_eq!(first.stats().hot_idle, 2);
        assert_eq!(second.stats().hot_idle, 2);
    }

    #[test]
    fn test_lease_outliving_pool_is_dropped() {
        let pool = GenericPool::new("short", Buffer::default, 1).unwrap();
        let lease = pool.get();
        drop(pool);
        drop(lease);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts() {
        let pool = GenericPool::new("shared", Buffer::default, 4).unwrap();
        pool.wait_warm().await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    for i in 0..200u8 {
                        let mut lease = pool.get();
                        assert!(lease.data.is_empty());
                        lease.data.push(i);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.hot_idle + stats.overflow_idle, stats.created);
    }
}
