use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use downcast_rs::{impl_downcast, DowncastSync};
use parking_lot::RwLock;

use zdopt_api::Poolable;

use super::generic::{GenericPool, PoolStats};
use crate::error::PoolError;
use crate::log_pool;

/// Type-erased view of a pool, as stored in the [`PoolManager`].
pub trait ObjectPool: DowncastSync {
    fn name(&self) -> &str;

    /// Name of the stored value type.
    fn value_type(&self) -> &'static str;

    fn stats(&self) -> PoolStats;
}
impl_downcast!(sync ObjectPool);

impl<T: Poolable> ObjectPool for GenericPool<T> {
    fn name(&self) -> &str {
        GenericPool::name(self)
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn stats(&self) -> PoolStats {
        GenericPool::stats(self)
    }
}

/// Registry of named pools.
///
/// Registration is append-only: a name, once taken, keeps its pool for the
/// lifetime of the manager.
#[derive(Default)]
pub struct PoolManager {
    pools: RwLock<HashMap<String, Arc<dyn ObjectPool>>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pool(&self, name: impl Into<String>, pool: Arc<dyn ObjectPool>) -> Result<(), PoolError> {
        let name = name.into();
        let mut pools = self.pools.write();
        if pools.contains_key(&name) {
            return Err(PoolError::AlreadyRegistered(name));
        }
        log_pool!(name.as_str(), "registered", value_type = pool.value_type());
        pools.insert(name, pool);
        Ok(())
    }

    pub fn get_pool(&self, name: &str) -> Result<Arc<dyn ObjectPool>, PoolError> {
        self.pools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::NotFound(name.to_string()))
    }

    /// Look up a pool and recover its concrete type.
    pub fn get_typed<T: Poolable>(&self, name: &str) -> Result<Arc<GenericPool<T>>, PoolError> {
        let pool = self.get_pool(name)?;
        let stored = pool.value_type();
        pool.downcast_arc::<GenericPool<T>>()
            .map_err(|_| PoolError::TypeMismatch {
                pool: name.to_string(),
                stored,
                requested: type_name::<T>(),
            })
    }

    /// Return the pool registered under `name`, registering the one built by
    /// `create` when the name is free.
    ///
    /// Lookup and registration happen under one write lock, so concurrent
    /// callers observe a single pool.
    pub fn get_or_register<T, F>(&self, name: &str, create: F) -> Result<Arc<GenericPool<T>>, PoolError>
    where
        T: Poolable,
        F: FnOnce() -> Result<Arc<GenericPool<T>>, PoolError>,
    {
        let mut pools = self.pools.write();
        if let Some(existing) = pools.get(name) {
            let stored = existing.value_type();
            return existing
                .clone()
                .downcast_arc::<GenericPool<T>>()
                .map_err(|_| PoolError::TypeMismatch {
                    pool: name.to_string(),
                    stored,
                    requested: type_name::<T>(),
                });
        }

        let pool = create()?;
        log_pool!(name, "registered", value_type = type_name::<T>());
        pools.insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Statistics of every registered pool, sorted by name.
    pub fn stats(&self) -> Vec<PoolStats> {
        let mut stats: Vec<_> = self.pools.read().values().map(|pool| pool.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.pools.read().keys().cloned().collect();
        f.debug_struct("PoolManager").field("pools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Packet(Vec<u8>);

    impl Poolable for Packet {
        fn on_get(&mut self) {}
        fn on_release(&mut self) {
            self.0.clear();
        }
    }

    #[derive(Default)]
    struct Frame(u32);

    impl Poolable for Frame {
        fn on_get(&mut self) {}
        fn on_release(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let manager = PoolManager::new();
        let first = GenericPool::new("packets", Packet::default, 2).unwrap();
        let second = GenericPool::new("packets", Packet::default, 2).unwrap();

        manager.register_pool("packets", first.clone()).unwrap();
        assert_eq!(
            manager.register_pool("packets", second),
            Err(PoolError::AlreadyRegistered("packets".to_string()))
        );

        // The original registration is untouched
        let stored = manager.get_typed::<Packet>("packets").unwrap();
        assert!(Arc::ptr_eq(&stored, &first));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_unknown_name() {
        let manager = PoolManager::new();
        assert!(matches!(manager.get_pool("missing"), Err(PoolError::NotFound(name)) if name == "missing"));
    }

    #[test]
    fn test_typed_lookup_mismatch() {
        let manager = PoolManager::new();
        manager
            .register_pool("frames", GenericPool::new("frames", Frame::default, 1).unwrap())
            .unwrap();

        match manager.get_typed::<Packet>("frames") {
            Err(PoolError::TypeMismatch { pool, stored, requested }) => {
                assert_eq!(pool, "frames");
                assert!(stored.ends_with("Frame"));
                assert!(requested.ends_with("Packet"));
            }
            other => panic!("expected type mismatch, got {:?}", other.map(|_| ())),
        }

        let frames = manager.get_typed::<Frame>("frames").unwrap();
        let mut lease = frames.get();
        lease.0 = 7;
    }

    #[test]
    fn test_get_or_register_creates_once() {
        let manager = PoolManager::new();
        let mut builds = 0;
        let first = manager
            .get_or_register("packets", || {
                builds += 1;
                GenericPool::new("packets", Packet::default, 2)
            })
            .unwrap();
        let second = manager
            .get_or_register::<Packet, _>("packets", || unreachable!("pool already registered"))
            .unwrap();

        assert_eq!(builds, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(
            manager.get_or_register("packets", || GenericPool::new("frames", Frame::default, 1)),
            Err(PoolError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_stats_sorted_by_name() {
        let manager = PoolManager::new();
        manager.register_pool("b", GenericPool::new("b", Frame::default, 1).unwrap()).unwrap();
        manager.register_pool("a", GenericPool::new("a", Packet::default, 3).unwrap()).unwrap();

        let stats = manager.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "a");
        assert_eq!(stats[0].hot_idle, 3);
        assert_eq!(stats[1].name, "b");
    }
}
