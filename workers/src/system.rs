//! # Process-wide Defaults
//!
//! Components that are not handed a pool, scheduler or registry fall back to
//! the shared instances kept here. Each is created on first use.
//!
//! Replacing a default with one of the `set_*` functions disposes the previous
//! instance after the accessor lock has been released, so a slow disposal never
//! blocks other threads looking up a default.

use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::warn;

use workers_api::{GroupError, PoolError, SchedulerError};

use crate::actor::Registry;
use crate::config::{PoolConfig, SchedulerConfig};
use crate::pool::Pool;
use crate::scheduler::{Schedule, Scheduler};
use crate::task::TaskGroup;

#[derive(Default)]
struct Defaults {
    pool: Option<Arc<Pool>>,
    scheduler: Option<Arc<Scheduler>>,
    registry: Option<Arc<Registry>>,
}

lazy_static! {
    static ref DEFAULTS: Mutex<Defaults> = Mutex::new(Defaults::default());
}

/// The shared pool, created with [`PoolConfig::default`] on first use.
pub fn pool() -> Result<Arc<Pool>, PoolError> {
    let mut defaults = DEFAULTS.lock();
    if let Some(pool) = &defaults.pool {
        return Ok(pool.clone());
    }

    let pool = Arc::new(Pool::new(PoolConfig::default())?);
    defaults.pool = Some(pool.clone());
    Ok(pool)
}

/// The shared scheduler, created on first use with its own default pool.
pub fn scheduler() -> Result<Arc<Scheduler>, SchedulerError> {
    let mut defaults = DEFAULTS.lock();
    if let Some(scheduler) = &defaults.scheduler {
        return Ok(scheduler.clone());
    }

    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::default().with_thread_name("default-scheduler"),
    )?);
    defaults.scheduler = Some(scheduler.clone());
    Ok(scheduler)
}

pub fn registry() -> Arc<Registry> {
    DEFAULTS
        .lock()
        .registry
        .get_or_insert_with(|| Arc::new(Registry::new()))
        .clone()
}

/// Installs `pool` as the shared pool and disposes the previous one.
pub fn set_pool(pool: Arc<Pool>) {
    let previous = DEFAULTS.lock().pool.replace(pool);
    if let Some(previous) = previous {
        if let Err(err) = previous.dispose(None) {
            warn!(error = %err, "failed to dispose previous default pool");
        }
    }
}

/// Installs `scheduler` as the shared scheduler and disposes the previous one.
pub fn set_scheduler(scheduler: Arc<Scheduler>) {
    let previous = DEFAULTS.lock().scheduler.replace(scheduler);
    if let Some(previous) = previous {
        if let Err(err) = previous.dispose() {
            warn!(error = %err, "failed to dispose previous default scheduler");
        }
    }
}

/// Installs `registry` as the shared registry and clears the previous one.
pub fn set_registry(registry: Arc<Registry>) {
    let previous = DEFAULTS.lock().registry.replace(registry);
    if let Some(previous) = previous {
        previous.dispose();
    }
}

/// Runs `f` over `inputs` on the shared pool and returns the results in input
/// order. See [`TaskGroup::map`].
pub fn map<I, O, F>(inputs: impl IntoIterator<Item = I>, f: F) -> Result<Vec<O>, GroupError>
where
    I: fmt::Debug + Send + 'static,
    O: Send + 'static,
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
{
    TaskGroup::new()?.map(inputs, f)
}
