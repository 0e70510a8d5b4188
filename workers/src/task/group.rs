use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use workers_api::{GroupError, GroupState};

use super::task::Task;
use crate::config::TaskOptions;
use crate::pool::Pool;
use crate::system;

/// Shared handle to a task owned by a group.
pub type TaskHandle<I, O> = Arc<Mutex<Task<I, O>>>;

/// Counts finished tasks; `wait` returns once the count reaches the total.
#[derive(Default)]
struct Barrier {
    finished: Mutex<usize>,
    signal: Condvar,
}

impl Barrier {
    fn arrive(&self) {
        let mut finished = self.finished.lock();
        *finished += 1;
        self.signal.notify_all();
    }

    fn wait(&self, total: usize) {
        let mut finished = self.finished.lock();
        // Wakeups can be spurious; only the count decides.
        while *finished < total {
            self.signal.wait(&mut finished);
        }
    }
}

struct GroupInner<I, O> {
    state: GroupState,
    tasks: Vec<TaskHandle<I, O>>,
}

/// Fan-out/fan-in over a pool: add tasks, `run` them all, block until every
/// one of them has finished.
///
/// Groups are single-use. `run` blocks the calling thread, so calling it from
/// a worker of the same pool can starve the pool when every worker does so.
pub struct TaskGroup<I, O> {
    pool: Arc<Pool>,
    inner: Mutex<GroupInner<I, O>>,
    barrier: Arc<Barrier>,
    user_lock: Arc<Mutex<()>>,
}

impl<I, O> TaskGroup<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// A group on the process-wide pool.
    pub fn new() -> Result<Self, GroupError> {
        Ok(Self::with_pool(system::pool()?))
    }

    pub fn with_pool(pool: Arc<Pool>) -> Self {
        Self {
            pool,
            inner: Mutex::new(GroupInner {
                state: GroupState::Initialized,
                tasks: Vec::new(),
            }),
            barrier: Arc::new(Barrier::default()),
            user_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Adds a task running `handler` over `input`.
    ///
    /// # Errors
    /// - [`GroupError::InvalidState`] once the group has started.
    /// - [`GroupError::Task`] for invalid options.
    pub fn add<F>(&self, input: I, options: TaskOptions, handler: F) -> Result<(), GroupError>
    where
        F: FnMut(&I) -> anyhow::Result<O> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state != GroupState::Initialized {
            return Err(GroupError::InvalidState(inner.state));
        }

        let barrier = self.barrier.clone();
        let task = Task::builder(input)
            .perform(handler)
            .max_tries(options.max_tries)
            .on_finished(move |_| barrier.arrive())
            .build()?;

        inner.tasks.push(Arc::new(Mutex::new(task)));
        Ok(())
    }

    /// Runs every task on the pool and blocks until all of them finished.
    ///
    /// Returns `Ok(true)` when every task succeeded.
    pub fn run(&self) -> Result<bool, GroupError> {
        let tasks = {
            let mut inner = self.inner.lock();
            if inner.state != GroupState::Initialized {
                return Err(GroupError::InvalidState(inner.state));
            }
            inner.state = GroupState::Running;
            inner.tasks.clone()
        };

        if !tasks.is_empty() {
            debug!(tasks = tasks.len(), "task group running");

            for task in &tasks {
                let task = task.clone();
                self.pool.perform(move || task.lock().run().map_err(anyhow::Error::from));
            }

            self.barrier.wait(tasks.len());
        }

        self.inner.lock().state = GroupState::Finished;
        Ok(tasks.iter().all(|task| task.lock().is_succeeded()))
    }

    pub fn state(&self) -> GroupState {
        self.inner.lock().state
    }

    pub fn tasks(&self) -> Vec<TaskHandle<I, O>> {
        self.inner.lock().tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn successes(&self) -> Vec<TaskHandle<I, O>> {
        self.select(Task::is_succeeded)
    }

    pub fn failures(&self) -> Vec<TaskHandle<I, O>> {
        self.select(Task::is_failed)
    }

    /// Runs `f` while holding the group's user lock.
    ///
    /// The lock is reserved for task bodies that need serializing; the group
    /// itself never takes it.
    pub fn synchronize<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.user_lock.lock();
        f()
    }

    /// The user lock, for task closures that outlive a borrow of the group.
    pub fn user_lock(&self) -> Arc<Mutex<()>> {
        self.user_lock.clone()
    }

    fn select(&self, predicate: fn(&Task<I, O>) -> bool) -> Vec<TaskHandle<I, O>> {
        self.tasks()
            .into_iter()
            .filter(|task| predicate(&task.lock()))
            .collect()
    }
}

impl<I, O> TaskGroup<I, O>
where
    I: fmt::Debug + Send + 'static,
    O: Send + 'static,
{
    /// Runs `f` over every input in parallel and returns the results in input
    /// order.
    ///
    /// # Errors
    /// [`GroupError::AggregateTaskFailure`] naming the number of failed tasks
    /// and the first failing input with its error.
    pub fn map<F>(&self, inputs: impl IntoIterator<Item = I>, f: F) -> Result<Vec<O>, GroupError>
    where
        F: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        self.map_with(inputs, TaskOptions::default(), f)
    }

    pub fn map_with<F>(
        &self,
        inputs: impl IntoIterator<Item = I>,
        options: TaskOptions,
        f: F,
    ) -> Result<Vec<O>, GroupError>
    where
        F: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        for input in inputs {
            let f = f.clone();
            self.add(input, options.clone(), move |input: &I| f(input))?;
        }

        self.run()?;

        let tasks = self.tasks();
        let failed = tasks.iter().filter(|task| task.lock().is_failed()).count();

        if let Some(first) = tasks.iter().find(|task| task.lock().is_failed()) {
            let mut task = first.lock();
            let input = format!("{:?}", task.input());
            let source: Box<dyn std::error::Error + Send + Sync> = match task.take_exception() {
                Some(err) => err.into(),
                None => "task failed without an error".into(),
            };

            return Err(GroupError::AggregateTaskFailure {
                failed,
                input,
                source,
            });
        }

        Ok(tasks
            .iter()
            .filter_map(|task| task.lock().take_result())
            .collect())
    }
}

impl<I, O> fmt::Debug for TaskGroup<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TaskGroup")
            .field("state", &inner.state)
            .field("tasks", &inner.tasks.len())
            .finish()
    }
}
