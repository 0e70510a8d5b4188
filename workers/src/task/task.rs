use std::fmt;

use tracing::trace;

use workers_api::{TaskError, TaskState};

use crate::config::DEFAULT_MAX_TRIES;
use crate::guard;

type Perform<I, O> = Box<dyn FnMut(&I) -> anyhow::Result<O> + Send + 'static>;
type Finished<I, O> = Box<dyn FnOnce(&Task<I, O>) + Send + 'static>;

/// A retryable unit of work over one input.
///
/// `run` calls the perform callback up to `max_tries` times, stopping at the
/// first success. Only the failure of the last attempt is kept. The
/// `on_finished` callback runs exactly once, after the last attempt.
///
/// ```rust
/// use workers::Task;
///
/// let mut task = Task::builder(21)
///     .perform(|n: &i32| Ok(n * 2))
///     .build()?;
///
/// task.run()?;
/// assert_eq!(task.result(), Some(&42));
/// # Ok::<(), workers::TaskError>(())
/// ```
pub struct Task<I, O> {
    input: I,
    perform: Perform<I, O>,
    on_finished: Option<Finished<I, O>>,
    max_tries: usize,
    tries: usize,
    state: TaskState,
    result: Option<O>,
    exception: Option<anyhow::Error>,
}

impl<I, O> Task<I, O> {
    pub fn builder(input: I) -> TaskBuilder<I, O> {
        TaskBuilder {
            input,
            perform: None,
            on_finished: None,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }

    /// Runs the task to completion on the calling thread.
    ///
    /// # Errors
    /// [`TaskError::InvalidState`] unless the task has never run.
    pub fn run(&mut self) -> Result<(), TaskError> {
        if self.state != TaskState::Initialized {
            return Err(TaskError::InvalidState(self.state));
        }

        self.state = TaskState::Running;

        while self.tries < self.max_tries && self.state != TaskState::Succeeded {
            self.tries += 1;

            let input = &self.input;
            let perform = &mut self.perform;
            match guard::catch_unwind(|| perform(input)) {
                Ok(result) => {
                    self.state = TaskState::Succeeded;
                    self.result = Some(result);
                    self.exception = None;
                }
                Err(err) => {
                    trace!(attempt = self.tries, max_tries = self.max_tries, error = %err, "task attempt failed");
                    self.state = TaskState::Failed;
                    self.exception = Some(err);
                }
            }
        }

        if let Some(on_finished) = self.on_finished.take() {
            on_finished(self);
        }

        Ok(())
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn result(&self) -> Option<&O> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<O> {
        self.result.take()
    }

    /// Failure of the last attempt, if it failed.
    pub fn exception(&self) -> Option<&anyhow::Error> {
        self.exception.as_ref()
    }

    pub fn take_exception(&mut self) -> Option<anyhow::Error> {
        self.exception.take()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn tries(&self) -> usize {
        self.tries
    }

    pub fn max_tries(&self) -> usize {
        self.max_tries
    }

    pub fn is_succeeded(&self) -> bool {
        self.state == TaskState::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.state == TaskState::Failed
    }
}

impl<I: fmt::Debug, O: fmt::Debug> fmt::Debug for Task<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("input", &self.input)
            .field("state", &self.state)
            .field("tries", &self.tries)
            .field("max_tries", &self.max_tries)
            .field("result", &self.result)
            .field("exception", &self.exception.as_ref().map(ToString::to_string))
            .finish()
    }
}

/// Builder returned by [`Task::builder`].
pub struct TaskBuilder<I, O> {
    input: I,
    perform: Option<Perform<I, O>>,
    on_finished: Option<Finished<I, O>>,
    max_tries: usize,
}

impl<I, O> TaskBuilder<I, O> {
    /// The work itself. Required.
    pub fn perform<F>(mut self, f: F) -> Self
    where
        F: FnMut(&I) -> anyhow::Result<O> + Send + 'static,
    {
        self.perform = Some(Box::new(f));
        self
    }

    pub fn on_finished<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Task<I, O>) + Send + 'static,
    {
        self.on_finished = Some(Box::new(f));
        self
    }

    pub fn max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// # Errors
    /// - [`TaskError::MissingCallback`] without a perform callback.
    /// - [`TaskError::InvalidConfiguration`] when `max_tries` is zero.
    pub fn build(self) -> Result<Task<I, O>, TaskError> {
        let perform = self.perform.ok_or(TaskError::MissingCallback)?;

        if self.max_tries < 1 {
            return Err(TaskError::InvalidConfiguration(format!(
                "max_tries must be >= 1, got {}",
                self.max_tries
            )));
        }

        Ok(Task {
            input: self.input,
            perform,
            on_finished: self.on_finished,
            max_tries: self.max_tries,
            tries: 0,
            state: TaskState::Initialized,
            result: None,
            exception: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_is_kept_on_success() {
        let mut task = Task::builder("abc".to_string())
            .perform(|s: &String| Ok(s.len()))
            .build()
            .unwrap();

        task.run().unwrap();

        assert_eq!(task.take_result(), Some(3));
        assert!(task.result().is_none());
        assert_eq!(task.tries(), 1);
    }

    #[test]
    fn test_panics_count_as_failures() {
        let mut task = Task::builder(())
            .perform(|_: &()| -> anyhow::Result<()> { panic!("nope") })
            .max_tries(2)
            .build()
            .unwrap();

        task.run().unwrap();

        assert!(task.is_failed());
        assert_eq!(task.tries(), 2);
        assert_eq!(task.exception().unwrap().to_string(), "panicked: nope");
    }
}
