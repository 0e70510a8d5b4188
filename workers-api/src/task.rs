use std::fmt;

/// Lifecycle of a single task.
///
/// Transitions are monotonic: `Initialized -> Running -> Succeeded | Failed`.
/// While retries remain a task may move from `Failed` back into another
/// attempt, but never once it has `Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Initialized,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskState::Initialized => "initialized",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Lifecycle of a task group. Groups are single-use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupState {
    Initialized,
    Running,
    Finished,
}

impl GroupState {
    pub fn as_label(&self) -> &'static str {
        match self {
            GroupState::Initialized => "initialized",
            GroupState::Running => "running",
            GroupState::Finished => "finished",
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
