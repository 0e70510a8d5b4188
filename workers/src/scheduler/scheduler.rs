use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};
use uuid::Uuid;

use workers_api::{SchedulerError, TimerId};

use super::{Schedule, Timer};
use crate::config::{PoolConfig, SchedulerConfig};
use crate::pool::Pool;

/// Pending timers ordered by deadline, ties broken by id.
#[derive(Default)]
struct Timetable {
    queue: BTreeMap<(Instant, TimerId), Timer>,
    index: HashMap<TimerId, Instant>,
    running: bool,
}

impl Timetable {
    fn insert(&mut self, timer: Timer) {
        let id = timer.id();
        let fire_at = timer.fire_at();
        if let Some(previous) = self.index.insert(id, fire_at) {
            self.queue.remove(&(previous, id));
        }
        self.queue.insert((fire_at, id), timer);
    }

    fn remove(&mut self, id: TimerId) -> Option<Timer> {
        let fire_at = self.index.remove(&id)?;
        self.queue.remove(&(fire_at, id))
    }

    fn contains(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    fn pop_overdue(&mut self, now: Instant) -> Vec<Timer> {
        let mut overdue = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (fire_at, id) = *entry.key();
            if fire_at > now {
                break;
            }
            self.index.remove(&id);
            overdue.push(entry.remove());
        }
        overdue
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(fire_at, _)| *fire_at)
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }
}

struct Shared {
    timers: Mutex<Timetable>,
    signal: Condvar,
}

/// Fires timers on a pool from one dedicated thread.
///
/// The thread sleeps until the earliest deadline, dispatches every overdue
/// timer to the pool in `(fire_at, id)` order and re-arms periodic ones.
/// Scheduling a timer wakes it so a new, earlier deadline is honored.
pub struct Scheduler {
    id: Uuid,
    shared: Arc<Shared>,
    pool: Arc<Pool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let pool = match config.pool {
            Some(pool) => pool,
            None => Arc::new(Pool::new(PoolConfig::default())?),
        };

        let id = Uuid::new_v4();
        let shared = Arc::new(Shared {
            timers: Mutex::new(Timetable {
                running: true,
                ..Default::default()
            }),
            signal: Condvar::new(),
        });

        let handle = {
            let shared = shared.clone();
            let pool = pool.clone();
            thread::Builder::new()
                .name(config.thread_name)
                .spawn(move || run(id, &shared, &pool))
                .map_err(SchedulerError::Spawn)?
        };

        crate::log_lifecycle!("scheduler", id, "started");

        Ok(Self {
            id,
            shared,
            pool,
            thread_id: handle.thread().id(),
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pool the timers fire on.
    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Timers waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.shared.timers.lock().queue.len()
    }

    fn stop(&self) {
        let mut timers = self.shared.timers.lock();
        timers.running = false;
        timers.clear();
        self.shared.signal.notify_all();
    }
}

impl Schedule for Scheduler {
    fn schedule(&self, timer: &Timer) {
        {
            let mut timers = self.shared.timers.lock();
            if !timers.running {
                crate::log_scheduler!("scheduler", "schedule_ignored", scheduler_id = %self.id, timer = %timer.id());
                return;
            }
            timers.insert(timer.clone());
        }

        crate::log_scheduler!("scheduler", "timer_scheduled", scheduler_id = %self.id, timer = %timer.id());
        self.wakeup();
    }

    fn reschedule(&self, timer: &Timer) -> bool {
        {
            let mut timers = self.shared.timers.lock();
            if !timers.running || !timers.contains(timer.id()) {
                return false;
            }
            timers.insert(timer.clone());
        }

        self.wakeup();
        true
    }

    fn unschedule(&self, timer: &Timer) {
        let removed = self.shared.timers.lock().remove(timer.id());
        if removed.is_some() {
            crate::log_scheduler!("scheduler", "timer_unscheduled", scheduler_id = %self.id, timer = %timer.id());
        }
    }

    fn wakeup(&self) {
        self.shared.signal.notify_all();
    }

    /// Disposes the pool, then stops the scheduler thread.
    ///
    /// Pending timers are dropped without firing.
    fn dispose(&self) -> Result<(), SchedulerError> {
        let pool_result = self.pool.dispose(None);
        if let Err(err) = &pool_result {
            warn!(scheduler = %self.id, error = %err, "failed to dispose scheduler pool");
        }

        self.stop();

        if thread::current().id() != self.thread_id {
            if let Some(handle) = self.thread.lock().take() {
                if handle.join().is_err() {
                    warn!(scheduler = %self.id, "scheduler thread panicked");
                }
            }
        }

        crate::log_lifecycle!("scheduler", self.id, "disposed");
        pool_result.map(|_| ()).map_err(SchedulerError::from)
    }

    fn is_alive(&self) -> bool {
        let running = self.shared.timers.lock().running;
        running
            && self
                .thread
                .lock()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .field("pool", &self.pool)
            .finish()
    }
}

fn run(id: Uuid, shared: &Shared, pool: &Pool) {
    let mut timers = shared.timers.lock();

    while timers.running {
        let overdue = timers.pop_overdue(Instant::now());
        if !overdue.is_empty() {
            trace!(scheduler = %id, count = overdue.len(), "firing timers");
        }

        for timer in overdue {
            if timer.repeats() && !timer.is_cancelled() {
                timer.reset_deadline();
                timers.insert(timer.clone());
            }
            if !timer.claim_fire() {
                trace!(scheduler = %id, timer = %timer.id(), "previous fire still pending; skipped");
                continue;
            }
            pool.perform(move || {
                timer.fire_claimed();
                Ok(())
            });
        }

        match timers.next_deadline() {
            Some(deadline) => {
                shared.signal.wait_until(&mut timers, deadline);
            }
            None => shared.signal.wait(&mut timers),
        }
    }

    trace!(scheduler = %id, "scheduler thread stopped");
}
