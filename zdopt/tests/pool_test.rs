use std::sync::Arc;

use zdopt::error::PoolError;
use zdopt::network::{NetMessage, NET_MESSAGE_POOL};
use zdopt::pool::{GenericPool, PoolManager};
use zdopt::timer::{keyframe_pool, KeyFrame, KEYFRAME_POOL};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pools_shared_across_tasks() -> anyhow::Result<()> {
    let pools = Arc::new(PoolManager::new());
    let frames = keyframe_pool(&pools, 32)?;
    frames.wait_warm().await;

    let tasks: Vec<_> = (0..8)
        .map(|task| {
            let pools = pools.clone();
            tokio::spawn(async move {
                let frames = pools.get_typed::<KeyFrame>(KEYFRAME_POOL).unwrap();
                for i in 0..500 {
                    let mut frame = frames.get();
                    frame.set((task * 1000 + i + 1) as f32, Arc::new(|| {}));
                    assert!(!frame.triggered);
                    if i % 2 == 0 {
                        frames.release_obj(frame).unwrap();
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for task in tasks {
        task.await?;
    }

    let stats = frames.stats();
    assert_eq!(stats.in_use, 0);
    // At most one frame per task was out at any time beyond the warm cache
    assert!(stats.created <= 32 + 8, "created {}", stats.created);
    assert_eq!(stats.hot_idle + stats.overflow_idle, stats.created);
    Ok(())
}

#[tokio::test]
async fn test_one_registry_many_types() -> anyhow::Result<()> {
    let pools = PoolManager::new();
    keyframe_pool(&pools, 4)?;
    pools.register_pool(
        NET_MESSAGE_POOL,
        GenericPool::new(NET_MESSAGE_POOL, NetMessage::default, 4)?,
    )?;

    assert_eq!(pools.len(), 2);
    let names: Vec<_> = pools.stats().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec![KEYFRAME_POOL.to_string(), NET_MESSAGE_POOL.to_string()]);

    assert!(matches!(
        pools.get_typed::<NetMessage>(KEYFRAME_POOL),
        Err(PoolError::TypeMismatch { .. })
    ));
    assert!(matches!(
        pools.register_pool(KEYFRAME_POOL, GenericPool::new(KEYFRAME_POOL, KeyFrame::default, 4)?),
        Err(PoolError::AlreadyRegistered(_))
    ));
    Ok(())
}

#[test]
fn test_lease_from_other_pool_rejected() {
    let first = GenericPool::new("first", NetMessage::default, 2).unwrap();
    let second = GenericPool::new("second", NetMessage::default, 2).unwrap();

    let lease = first.get();
    assert_eq!(second.release_obj(lease), Err(PoolError::ForeignObject("second".to_string())));
    // The rejected lease went back to the pool it came from
    assert_eq!(first.stats().in_use, 0);
}
