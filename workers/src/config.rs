use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use workers_api::{CommandHandler, ExceptionCallback};

use crate::actor::{ActorMessage, Mailbox, Registry};
use crate::pool::{CommandQueue, Pool, WorkerContext};
use crate::scheduler::Schedule;

pub const DEFAULT_POOL_SIZE: usize = 20;
pub const DEFAULT_BUCKET_COUNT: usize = 100;
pub const DEFAULT_BUCKET_POOL_SIZE: usize = 1;
pub const DEFAULT_MAX_TRIES: usize = 1;

/// Strategy shared by every worker of a pool.
pub type SharedHandler = Arc<dyn CommandHandler<WorkerContext>>;

/// Runs on a worker's thread right before it exits because of a failure.
pub type DeathHook = Arc<dyn Fn(&WorkerContext) + Send + Sync>;

// --- Worker / Pool ---

/// Configuration for a standalone [`Worker`](crate::pool::Worker).
#[derive(Clone)]
pub struct WorkerConfig {
    /// Queue to consume; a fresh one is created when absent.
    pub queue: Option<CommandQueue<WorkerContext>>,

    /// Called on the worker thread with every failure a command raises.
    pub on_exception: Option<ExceptionCallback>,

    /// Terminate the thread after the first failure.
    pub die_on_exception: bool,

    /// Interprets commands; `DefaultHandler` when absent.
    pub handler: Option<SharedHandler>,

    pub thread_name: Option<String>,

    /// Called when `die_on_exception` ends the thread.
    pub on_death: Option<DeathHook>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: None,
            on_exception: None,
            die_on_exception: true,
            handler: None,
            thread_name: None,
            on_death: None,
        }
    }
}

impl WorkerConfig {
    pub fn with_queue(mut self, queue: CommandQueue<WorkerContext>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_on_exception(mut self, callback: ExceptionCallback) -> Self {
        self.on_exception = Some(callback);
        self
    }

    pub fn with_die_on_exception(mut self, die: bool) -> Self {
        self.die_on_exception = die;
        self
    }

    pub fn with_handler(mut self, handler: SharedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    pub fn with_on_death(mut self, hook: DeathHook) -> Self {
        self.on_death = Some(hook);
        self
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("queue", &self.queue)
            .field("on_exception", &self.on_exception.is_some())
            .field("die_on_exception", &self.die_on_exception)
            .field("handler", &self.handler.is_some())
            .field("thread_name", &self.thread_name)
            .field("on_death", &self.on_death.is_some())
            .finish()
    }
}

/// Configuration for a [`Pool`].
#[derive(Clone)]
pub struct PoolConfig {
    /// Workers spawned at construction.
    pub size: usize,

    /// Pool members survive failures unless this is set.
    pub die_on_exception: bool,

    /// Worker threads are named `<prefix>-<n>`.
    pub thread_name_prefix: String,

    pub on_exception: Option<ExceptionCallback>,

    /// Handler installed on every member worker.
    pub handler: Option<SharedHandler>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            die_on_exception: false,
            thread_name_prefix: "pool-worker".to_string(),
            on_exception: None,
            handler: None,
        }
    }
}

impl PoolConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_die_on_exception(mut self, die: bool) -> Self {
        self.die_on_exception = die;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_on_exception(mut self, callback: ExceptionCallback) -> Self {
        self.on_exception = Some(callback);
        self
    }

    pub fn with_handler(mut self, handler: SharedHandler) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("size", &self.size)
            .field("die_on_exception", &self.die_on_exception)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("on_exception", &self.on_exception.is_some())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

// --- Scheduling ---

/// Configuration for a [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Pool timers fire on; a new default-size pool when absent.
    pub pool: Option<Arc<Pool>>,
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool: None,
            thread_name: "scheduler".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_pool(mut self, pool: Arc<Pool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Configuration for a [`BucketScheduler`](crate::scheduler::BucketScheduler).
#[derive(Clone, Debug)]
pub struct BucketSchedulerConfig {
    /// Independent schedulers timers are spread across.
    pub bucket_count: usize,
    /// Workers in each bucket's private pool.
    pub pool_size: usize,
}

impl Default for BucketSchedulerConfig {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            pool_size: DEFAULT_BUCKET_POOL_SIZE,
        }
    }
}

impl BucketSchedulerConfig {
    pub fn with_bucket_count(mut self, count: usize) -> Self {
        self.bucket_count = count;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Configuration for a [`Timer`](crate::scheduler::Timer).
#[derive(Clone)]
pub struct TimerConfig {
    pub delay: Duration,
    /// Reschedule after every fire until cancelled.
    pub repeat: bool,
    /// Owning scheduler; the process-wide default when absent.
    pub scheduler: Option<Arc<dyn Schedule>>,
}

impl TimerConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            repeat: false,
            scheduler: None,
        }
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Schedule>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

impl fmt::Debug for TimerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerConfig")
            .field("delay", &self.delay)
            .field("repeat", &self.repeat)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

// --- Tasks ---

/// Per-task options used by [`TaskGroup`](crate::task::TaskGroup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskOptions {
    /// Attempts before the task is marked failed; at least 1.
    pub max_tries: usize,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
        }
    }
}

impl TaskOptions {
    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }
}

// --- Actors ---

/// Configuration for an [`Actor`](crate::actor::Actor).
#[derive(Clone, Debug, Default)]
pub struct ActorConfig {
    /// Registry key; unnamed actors are not registered.
    pub name: Option<String>,

    /// Run on a private single-worker pool instead of the shared one.
    pub dedicated: bool,

    pub mailbox: Option<Arc<Mailbox<ActorMessage>>>,

    /// Registry to join; the process-wide default when absent.
    pub registry: Option<Arc<Registry>>,

    /// Shared pool to drain on; the process-wide default when absent.
    /// Ignored for dedicated actors.
    pub pool: Option<Arc<Pool>>,
}

impl ActorConfig {
    /// Config for an actor with its own worker thread.
    pub fn dedicated() -> Self {
        Self {
            dedicated: true,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_dedicated(mut self, dedicated: bool) -> Self {
        self.dedicated = dedicated;
        self
    }

    pub fn with_mailbox(mut self, mailbox: Arc<Mailbox<ActorMessage>>) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_pool(mut self, pool: Arc<Pool>) -> Self {
        self.pool = Some(pool);
        self
    }
}
