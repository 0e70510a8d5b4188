//! # Timer Scheduling
//!
//! Deferred and periodic callbacks driven by a dedicated scheduler thread and
//! executed on a [`Pool`](crate::pool::Pool).
//!
//! ## Key Concepts
//! - [`Timer`]: fires its callback once, `delay` after it was created or last
//!   reset. [`PeriodicTimer`] keeps firing every `delay` until cancelled.
//! - [`Scheduler`]: keeps timers ordered by `(fire_at, id)` and sleeps until the
//!   earliest deadline. Callbacks never run on the scheduler thread itself.
//! - [`BucketScheduler`]: spreads timers over many independent schedulers by
//!   timer id, for workloads with very large numbers of timers.
//!
//! Timers hold a weak reference to their [`Schedule`]; dropping the scheduler
//! silently detaches them.

mod bucket;
mod scheduler;
mod timer;

use std::fmt;

use workers_api::SchedulerError;

pub use bucket::BucketScheduler;
pub use scheduler::Scheduler;
pub use timer::{PeriodicTimer, Timer};

/// Common interface of [`Scheduler`] and [`BucketScheduler`].
pub trait Schedule: fmt::Debug + Send + Sync {
    /// Inserts `timer` at its current `fire_at`, replacing an earlier entry.
    fn schedule(&self, timer: &Timer);

    /// Re-keys `timer` if it is still waiting to fire. Returns whether it was.
    fn reschedule(&self, timer: &Timer) -> bool;

    /// Removes `timer` if it has not fired yet.
    fn unschedule(&self, timer: &Timer);

    /// Forces the scheduler thread to recompute its next deadline.
    fn wakeup(&self);

    /// Stops the scheduler and its pool.
    fn dispose(&self) -> Result<(), SchedulerError>;

    fn is_alive(&self) -> bool;
}
