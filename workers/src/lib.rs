//! # Workers
//!
//! In-process concurrency toolkit built on plain OS threads:
//!
//! - [`pool`]: resizable worker-thread pools sharing one FIFO command queue.
//! - [`scheduler`]: deferred and periodic timers fired through a pool, plus a
//!   sharded scheduler for large timer populations.
//! - [`task`]: retryable tasks and fan-out/fan-in task groups.
//! - [`actor`]: serialized-mailbox actors and a name registry.
//! - [`system`]: lazily created process-wide defaults.
//! - [`logging`]: `tracing` subscriber setup and structured log macros.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//! use workers::pool::Pool;
//!
//! let pool = Pool::with_size(4).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..4 {
//!     let counter = counter.clone();
//!     pool.perform(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     });
//! }
//!
//! assert!(pool.dispose(Some(Duration::from_secs(5))).unwrap());
//! assert_eq!(counter.load(Ordering::SeqCst), 4);
//! ```

pub mod actor;
pub mod config;
pub mod logging;
pub mod pool;
pub mod scheduler;
pub mod system;
pub mod task;

mod guard;

#[doc(hidden)]
pub use tracing as __tracing;

// Re-export commonly used types
pub use actor::{Actor, ActorBehavior, ActorMessage, DefaultBehavior, FnBehavior, Mailbox, Registry};
pub use config::{
    ActorConfig, BucketSchedulerConfig, PoolConfig, SchedulerConfig, TaskOptions, TimerConfig,
    WorkerConfig,
};
pub use pool::{CommandQueue, Pool, Worker, WorkerContext};
pub use scheduler::{BucketScheduler, PeriodicTimer, Schedule, Scheduler, Timer};
pub use system::map;
pub use task::{Task, TaskBuilder, TaskGroup, TaskHandle};
pub use workers_api::*;
