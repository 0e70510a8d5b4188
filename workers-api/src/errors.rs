//! # Error Types
//!
//! One error enum per component of the toolkit. Failures inside user closures
//! travel as [`anyhow::Error`]; the enums below describe failures of the
//! toolkit itself (bad configuration, wrong lifecycle state, sizing mistakes).
//!
//! Every enum offers `as_label()`, a short stable snake_case label suited to
//! structured log fields.

use std::io;

use thiserror::Error;

use crate::task::{GroupState, TaskState};

/// Errors raised by a single worker thread.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A worker's own thread attempted to join itself.
    #[error("worker can't join itself")]
    SelfJoin,

    /// A command reached a handler that does not recognise its tag.
    #[error("unhandled command: {0}")]
    UnknownCommand(String),

    /// The worker was configured to die on exceptions and did.
    #[error("worker died: {0}")]
    Died(String),

    /// The operating system refused to start the thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

impl WorkerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::SelfJoin => "worker_self_join",
            WorkerError::UnknownCommand(_) => "worker_unknown_command",
            WorkerError::Died(_) => "worker_died",
            WorkerError::Spawn(_) => "worker_spawn",
        }
    }
}

/// Errors raised by a worker pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// `contract` asked to remove more workers than are available.
    #[error("cannot contract pool by {requested}: only {available} worker(s) available")]
    OversizedContraction { requested: usize, available: usize },

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl PoolError {
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::OversizedContraction { .. } => "pool_oversized_contraction",
            PoolError::Worker(err) => err.as_label(),
        }
    }
}

/// Errors raised while building a timer scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("scheduler pool error: {0}")]
    Pool(#[from] PoolError),
}

impl SchedulerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::Spawn(_) => "scheduler_spawn",
            SchedulerError::Pool(err) => err.as_label(),
        }
    }
}

/// Errors raised by a single retryable task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task was built without a perform callback.
    #[error("perform callback is required")]
    MissingCallback,

    /// A configuration value is out of range (e.g. `max_tries < 1`).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `run` was called on a task that already ran.
    #[error("invalid state ({0})")]
    InvalidState(TaskState),
}

impl TaskError {
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::MissingCallback => "task_missing_callback",
            TaskError::InvalidConfiguration(_) => "task_invalid_configuration",
            TaskError::InvalidState(_) => "task_invalid_state",
        }
    }
}

/// Errors raised by a task group.
#[derive(Error, Debug)]
pub enum GroupError {
    /// The group is not in a state that permits the operation.
    #[error("invalid state ({0})")]
    InvalidState(GroupState),

    /// At least one task of a `map` call failed. Only the first failure is kept.
    #[error("{failed} task(s) failed (only the first failure is shown); input={input}: {source}")]
    AggregateTaskFailure {
        failed: usize,
        input: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl GroupError {
    pub fn as_label(&self) -> &'static str {
        match self {
            GroupError::InvalidState(_) => "group_invalid_state",
            GroupError::AggregateTaskFailure { .. } => "group_aggregate_task_failure",
            GroupError::Task(err) => err.as_label(),
            GroupError::Pool(err) => err.as_label(),
        }
    }
}

/// Errors raised by an actor registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("actor already exists ({0})")]
    DuplicateName(String),
}

impl RegistryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::DuplicateName(_) => "registry_duplicate_name",
        }
    }
}

/// Errors raised while constructing an actor.
#[derive(Error, Debug)]
pub enum ActorError {
    #[error("actor registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("actor pool error: {0}")]
    Pool(#[from] PoolError),
}

impl ActorError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ActorError::Registry(err) => err.as_label(),
            ActorError::Pool(err) => err.as_label(),
        }
    }
}
