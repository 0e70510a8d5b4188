use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use workers_api::{Command, PoolError, WorkerError, WorkerId};

use super::queue::CommandQueue;
use super::worker::{Worker, WorkerContext};
use crate::config::{PoolConfig, WorkerConfig};

/// Tracked workers, guarded by the resize lock.
#[derive(Default)]
struct PoolState {
    workers: HashMap<WorkerId, Worker>,
    /// Workers that already have a shutdown command queued for them
    retiring: usize,
}

impl PoolState {
    fn available(&self) -> usize {
        self.workers.len().saturating_sub(self.retiring)
    }
}

/// A resizable set of worker threads sharing one command queue.
///
/// # Ordering
/// Commands leave the queue in FIFO order, but with more than one worker the
/// order in which they *complete* is unspecified.
///
/// # Sizing
/// `size()` is the number of tracked workers. Contraction is asynchronous: it
/// queues shutdown commands behind the pending work, and each exiting worker
/// removes itself from the set, so `size()` drops as they are processed.
pub struct Pool {
    id: Uuid,
    queue: CommandQueue<WorkerContext>,
    state: Arc<Mutex<PoolState>>,
    template: PoolConfig,
    spawned: AtomicUsize,
}

impl Pool {
    /// Creates a pool and spawns `config.size` workers.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let pool = Self {
            id: Uuid::new_v4(),
            queue: CommandQueue::new(),
            state: Arc::new(Mutex::new(PoolState::default())),
            spawned: AtomicUsize::new(0),
            template: config,
        };

        pool.expand(pool.template.size)?;
        crate::log_lifecycle!("pool", pool.id, "started", size = pool.size());
        Ok(pool)
    }

    pub fn with_size(size: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig::default().with_size(size))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Adds `count` workers.
    pub fn expand(&self, count: usize) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        self.expand_locked(&mut state, count)
    }

    /// Queues `count` shutdown commands; each exiting worker leaves the pool.
    ///
    /// # Errors
    /// [`PoolError::OversizedContraction`] when `count` exceeds the workers not
    /// already on their way out.
    pub fn contract(&self, count: usize) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        self.contract_locked(&mut state, count)
    }

    /// Grows or shrinks to `size` workers.
    pub fn resize(&self, size: usize) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        let current = state.available();

        if size > current {
            self.expand_locked(&mut state, size - current)
        } else {
            self.contract_locked(&mut state, current - size)
        }
    }

    pub fn size(&self) -> usize {
        self.state.lock().workers.len()
    }

    /// Commands waiting for a free worker.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Runs `f` on whichever worker is free next.
    pub fn perform<F>(&self, f: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.queue.push(Command::perform(f));
    }

    pub fn enqueue(&self, command: Command<WorkerContext>) {
        self.queue.push(command);
    }

    /// Asks every worker to stop once the work queued before this call is done.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let pending = state.available();
        for _ in 0..pending {
            self.queue.push(Command::shutdown());
        }
        state.retiring = state.workers.len();
    }

    /// Like [`shutdown`](Pool::shutdown); `hook` runs on each worker as it exits.
    pub fn shutdown_with<F>(&self, hook: F)
    where
        F: Fn(&WorkerContext) + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        let mut state = self.state.lock();
        let pending = state.available();
        for _ in 0..pending {
            let hook = hook.clone();
            self.queue
                .push(Command::shutdown_with(move |ctx: &WorkerContext| hook(ctx)));
        }
        state.retiring = state.workers.len();
    }

    /// Joins every tracked worker against a single deadline and clears the set.
    ///
    /// Returns `Ok(true)` when all of them exited in time. Workers that died on
    /// a failure count as exited.
    ///
    /// # Errors
    /// [`PoolError::Worker`] with [`WorkerError::SelfJoin`] when called from one
    /// of the pool's own workers.
    pub fn join(&self, timeout: Option<Duration>) -> Result<bool, PoolError> {
        let workers = {
            let mut state = self.state.lock();
            if state.workers.values().any(Worker::is_current_thread) {
                return Err(WorkerError::SelfJoin.into());
            }
            state.retiring = 0;
            std::mem::take(&mut state.workers)
        };

        // A timeout too large for an `Instant` waits without a deadline
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut all_exited = true;

        for worker in workers.values() {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            match worker.join(remaining) {
                Ok(true) => {}
                Ok(false) => all_exited = false,
                Err(WorkerError::Died(reason)) => {
                    debug!(pool = %self.id, worker = %worker.id(), reason = %reason, "joined dead worker");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(all_exited)
    }

    /// Shutdown followed by join.
    pub fn dispose(&self, timeout: Option<Duration>) -> Result<bool, PoolError> {
        self.shutdown();
        let joined = self.join(timeout)?;
        crate::log_lifecycle!("pool", self.id, "disposed", joined = joined);
        Ok(joined)
    }

    /// [`shutdown_with`](Pool::shutdown_with) followed by join.
    pub fn dispose_with<F>(&self, hook: F, timeout: Option<Duration>) -> Result<bool, PoolError>
    where
        F: Fn(&WorkerContext) + Send + Sync + 'static,
    {
        self.shutdown_with(hook);
        let joined = self.join(timeout)?;
        crate::log_lifecycle!("pool", self.id, "disposed", joined = joined);
        Ok(joined)
    }

    fn expand_locked(&self, state: &mut PoolState, count: usize) -> Result<(), PoolError> {
        for _ in 0..count {
            let worker = Worker::new(self.worker_config())?;
            state.workers.insert(worker.id(), worker);
        }

        if count > 0 {
            debug!(pool = %self.id, added = count, size = state.workers.len(), "pool expanded");
        }
        Ok(())
    }

    fn contract_locked(&self, state: &mut PoolState, count: usize) -> Result<(), PoolError> {
        let available = state.available();
        if count > available {
            return Err(PoolError::OversizedContraction {
                requested: count,
                available,
            });
        }

        state.retiring += count;
        for _ in 0..count {
            let tracked = Arc::downgrade(&self.state);
            self.queue
                .push(Command::shutdown_with(move |ctx: &WorkerContext| retire(&tracked, ctx)));
        }

        if count > 0 {
            debug!(pool = %self.id, removing = count, "pool contracting");
        }
        Ok(())
    }

    fn worker_config(&self) -> WorkerConfig {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);

        let tracked = Arc::downgrade(&self.state);

        WorkerConfig {
            queue: Some(self.queue.clone()),
            on_exception: self.template.on_exception.clone(),
            die_on_exception: self.template.die_on_exception,
            handler: self.template.handler.clone(),
            thread_name: Some(format!("{}-{}", self.template.thread_name_prefix, n)),
            on_death: Some(Arc::new(move |ctx: &WorkerContext| bury(&tracked, ctx))),
        }
    }
}

/// Drops the exiting worker from its pool, if the pool still exists.
fn retire(state: &Weak<Mutex<PoolState>>, ctx: &WorkerContext) {
    let Some(state) = state.upgrade() else {
        return;
    };

    let removed = {
        let mut state = state.lock();
        state.retiring = state.retiring.saturating_sub(1);
        state.workers.remove(&ctx.id())
    };

    // Dropped outside the lock; this only releases the handle of the current thread.
    drop(removed);
}

/// Drops a worker that died on a failure.
///
/// `retiring` is left alone: shutdown commands queued before the death are
/// still in the queue and will retire surviving or future workers.
fn bury(state: &Weak<Mutex<PoolState>>, ctx: &WorkerContext) {
    let Some(state) = state.upgrade() else {
        return;
    };

    let removed = state.lock().workers.remove(&ctx.id());

    if removed.is_some() {
        debug!(worker = %ctx.id(), "dead worker left the pool");
    }
    drop(removed);
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("backlog", &self.backlog())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_is_relative_to_pending_removals() {
        let pool = Pool::with_size(4).unwrap();

        pool.contract(1).unwrap();
        pool.resize(1).unwrap();

        assert!(matches!(
            pool.contract(2),
            Err(PoolError::OversizedContraction {
                requested: 2,
                available: 1
            })
        ));
        assert!(pool.dispose(Some(Duration::from_secs(5))).unwrap());
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_worker_threads_use_prefix() {
        let pool = Pool::new(PoolConfig::default().with_size(1).with_thread_name_prefix("crunch")).unwrap();
        let (tx, rx) = flume::bounded(1);

        pool.perform(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).ok();
            Ok(())
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("crunch-"));
        assert!(pool.dispose(Some(Duration::from_secs(5))).unwrap());
    }
}
