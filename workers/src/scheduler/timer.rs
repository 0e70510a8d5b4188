use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use workers_api::{SchedulerError, TimerId};

use super::Schedule;
use crate::config::TimerConfig;
use crate::guard;
use crate::system;

type Callback = Box<dyn FnMut() -> anyhow::Result<()> + Send + 'static>;

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `now + delay`, saturated to [`FAR_FUTURE`] for delays such as `Duration::MAX`.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

struct TimerInner {
    id: TimerId,
    delay: Duration,
    repeat: bool,
    fire_at: Mutex<Instant>,
    // Separate from `fire_at` so the scheduler never waits on a running callback
    callback: Mutex<Callback>,
    cancelled: AtomicBool,
    // Set while a fire sits in the pool queue or runs
    in_flight: AtomicBool,
    scheduler: Weak<dyn Schedule>,
}

/// A callback that fires once after `delay` on its scheduler's pool.
///
/// `Timer` is a cheap handle; clones refer to the same timer.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use workers::Timer;
///
/// let timer = Timer::new(Duration::from_secs(1), || {
///     println!("one second later");
///     Ok(())
/// })?;
/// # Ok::<(), workers::SchedulerError>(())
/// ```
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    /// Creates a one-shot timer on the process-wide scheduler.
    pub fn new<F>(delay: Duration, callback: F) -> Result<Self, SchedulerError>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self::with_config(TimerConfig::new(delay), callback)
    }

    /// Creates a timer and registers it with its scheduler.
    pub fn with_config<F>(config: TimerConfig, callback: F) -> Result<Self, SchedulerError>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let scheduler: Arc<dyn Schedule> = match config.scheduler {
            Some(scheduler) => scheduler,
            None => system::scheduler()? as Arc<dyn Schedule>,
        };

        let timer = Self {
            inner: Arc::new(TimerInner {
                id: Uuid::new_v4(),
                delay: config.delay,
                repeat: config.repeat,
                fire_at: Mutex::new(deadline_after(config.delay)),
                callback: Mutex::new(Box::new(callback)),
                cancelled: AtomicBool::new(false),
                in_flight: AtomicBool::new(false),
                scheduler: Arc::downgrade(&scheduler),
            }),
        };

        scheduler.schedule(&timer);
        Ok(timer)
    }

    pub fn id(&self) -> TimerId {
        self.inner.id
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    pub fn repeats(&self) -> bool {
        self.inner.repeat
    }

    /// Deadline of the next fire.
    pub fn fire_at(&self) -> Instant {
        *self.inner.fire_at.lock()
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.fire_at().saturating_duration_since(Instant::now())
    }

    pub fn sec_remaining(&self) -> f64 {
        self.remaining().as_secs_f64()
    }

    pub fn is_overdue(&self) -> bool {
        self.fire_at() <= Instant::now()
    }

    /// Runs the callback on the calling thread.
    ///
    /// Failures are logged and discarded. Does nothing once cancelled.
    pub fn fire(&self) {
        if self.is_cancelled() {
            return;
        }

        let mut callback = self.inner.callback.lock();
        if let Err(err) = guard::catch_unwind(|| (*callback)()) {
            debug!(timer = %self.inner.id, error = %err, "timer callback failed");
        }
    }

    /// Stops the timer from firing again.
    ///
    /// A fire already dispatched to the pool may still run.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(scheduler) = self.inner.scheduler.upgrade() {
            scheduler.unschedule(self);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Moves the deadline to `now + delay`.
    pub fn reset(&self) {
        self.reset_deadline();
        if self.is_cancelled() {
            return;
        }
        if let Some(scheduler) = self.inner.scheduler.upgrade() {
            if scheduler.reschedule(self) {
                crate::log_scheduler!("timer", "timer_reset", timer = %self.inner.id);
            }
        }
    }

    pub(crate) fn reset_deadline(&self) {
        *self.inner.fire_at.lock() = deadline_after(self.inner.delay);
    }

    /// Marks a fire as dispatched; `false` while the previous one is pending.
    pub(crate) fn claim_fire(&self) -> bool {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Fires and releases the claim taken by [`claim_fire`](Timer::claim_fire).
    pub(crate) fn fire_claimed(&self) {
        self.fire();
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Timer {}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.inner.id)
            .field("delay", &self.inner.delay)
            .field("repeat", &self.inner.repeat)
            .field("remaining", &self.remaining())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A timer that fires every `delay` until cancelled.
///
/// The next deadline is armed when a fire is dispatched, not when it ends. A
/// deadline that passes while the previous callback is still queued or running
/// is skipped, so a slow callback fires less often instead of piling up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodicTimer(Timer);

impl PeriodicTimer {
    pub fn new<F>(delay: Duration, callback: F) -> Result<Self, SchedulerError>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self::with_config(TimerConfig::new(delay), callback)
    }

    /// `config.repeat` is forced on.
    pub fn with_config<F>(config: TimerConfig, callback: F) -> Result<Self, SchedulerError>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Timer::with_config(config.with_repeat(true), callback).map(PeriodicTimer)
    }

    pub fn into_inner(self) -> Timer {
        self.0
    }
}

impl Deref for PeriodicTimer {
    type Target = Timer;

    fn deref(&self) -> &Timer {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Records calls without running anything.
    #[derive(Debug, Default)]
    struct Recorder {
        scheduled: AtomicUsize,
        rescheduled: AtomicUsize,
        unscheduled: AtomicUsize,
    }

    impl Schedule for Recorder {
        fn schedule(&self, _timer: &Timer) {
            self.scheduled.fetch_add(1, Ordering::SeqCst);
        }

        fn reschedule(&self, _timer: &Timer) -> bool {
            self.rescheduled.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn unschedule(&self, _timer: &Timer) {
            self.unscheduled.fetch_add(1, Ordering::SeqCst);
        }

        fn wakeup(&self) {}

        fn dispose(&self) -> Result<(), SchedulerError> {
            Ok(())
        }

        fn is_alive(&self) -> bool {
            true
        }
    }

    fn timer_on(recorder: &Arc<Recorder>, delay: Duration) -> Timer {
        let config = TimerConfig::new(delay).with_scheduler(recorder.clone());
        Timer::with_config(config, || Ok(())).unwrap()
    }

    #[test]
    fn test_registers_on_creation() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_on(&recorder, Duration::from_secs(60));

        assert_eq!(recorder.scheduled.load(Ordering::SeqCst), 1);
        assert!(!timer.is_overdue());
        assert!(timer.sec_remaining() > 59.0);
    }

    #[test]
    fn test_cancel_suppresses_fire() {
        let recorder = Arc::new(Recorder::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let config = TimerConfig::new(Duration::ZERO).with_scheduler(recorder.clone());
        let timer = Timer::with_config(config, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        timer.fire();
        timer.cancel();
        timer.fire();
        timer.reset();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.unscheduled.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.rescheduled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_delay_is_overdue() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_on(&recorder, Duration::ZERO);

        assert!(timer.is_overdue());
        assert_eq!(timer.remaining(), Duration::ZERO);
        assert_eq!(timer.sec_remaining(), 0.0);
    }

    #[test]
    fn test_fire_swallows_failures() {
        let recorder = Arc::new(Recorder::default());
        let config = TimerConfig::new(Duration::ZERO).with_scheduler(recorder.clone());
        let timer = Timer::with_config(config, || panic!("boom")).unwrap();

        timer.fire();
        timer.fire();
    }

    #[test]
    fn test_reset_moves_deadline() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_on(&recorder, Duration::from_millis(50));
        let before = timer.fire_at();

        std::thread::sleep(Duration::from_millis(5));
        timer.reset();

        assert!(timer.fire_at() > before);
        assert_eq!(recorder.rescheduled.load(Ordering::SeqCst), 1);
    }
}
