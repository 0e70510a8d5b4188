// Integration tests for workers::config

use std::sync::Arc;
use std::time::Duration;

use workers::config::*;
use workers::{Pool, Registry};

#[test]
fn test_worker_config_defaults() {
    let config = WorkerConfig::default();

    assert!(config.queue.is_none());
    assert!(config.on_exception.is_none());
    assert!(config.die_on_exception);
    assert!(config.handler.is_none());
    assert!(config.thread_name.is_none());
    assert!(config.on_death.is_none());
}

#[test]
fn test_pool_config_defaults() {
    let config = PoolConfig::default();

    assert_eq!(config.size, DEFAULT_POOL_SIZE);
    assert_eq!(config.size, 20);
    assert!(!config.die_on_exception);
    assert_eq!(config.thread_name_prefix, "pool-worker");
}

#[test]
fn test_task_options_defaults() {
    assert_eq!(TaskOptions::default().max_tries, 1);
    assert_eq!(TaskOptions::default().with_max_tries(4).max_tries, 4);
}

#[test]
fn test_timer_config_builder() {
    let config = TimerConfig::new(Duration::from_millis(250)).with_repeat(true);

    assert_eq!(config.delay, Duration::from_millis(250));
    assert!(config.repeat);
    assert!(config.scheduler.is_none());
}

#[test]
fn test_actor_config_builders() {
    let registry = Arc::new(Registry::new());
    let config = ActorConfig::dedicated().with_name("worker").with_registry(registry.clone());

    assert!(config.dedicated);
    assert_eq!(config.name.as_deref(), Some("worker"));
    assert!(Arc::ptr_eq(config.registry.as_ref().unwrap(), &registry));
    assert!(!ActorConfig::default().dedicated);
}

#[test]
fn test_scheduler_config_with_pool() {
    let pool = Arc::new(Pool::with_size(1).unwrap());
    let config = SchedulerConfig::default().with_pool(pool.clone()).with_thread_name("ticker");

    assert_eq!(config.thread_name, "ticker");
    assert!(config.pool.is_some());
    pool.dispose(Some(Duration::from_secs(5))).unwrap();
}

#[test]
fn test_config_debug_format() {
    let worker = WorkerConfig::default().with_on_exception(Arc::new(|_: &anyhow::Error| {}));
    let pool = PoolConfig::default();

    assert!(format!("{:?}", worker).contains("on_exception: true"));
    assert!(format!("{:?}", pool).contains("thread_name_prefix"));
    assert!(format!("{:?}", BucketSchedulerConfig::default()).contains("bucket_count: 100"));
}
