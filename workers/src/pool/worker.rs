//! # Worker Thread
//!
//! A worker owns one OS thread that pops [`Command`]s from a queue and hands
//! each to its [`CommandHandler`] until the handler answers
//! [`Outcome::Stop`].
//!
//! ## Lifecycle
//! 1. `Worker::new` spawns the thread; it blocks on the queue between commands.
//! 2. Each command is dispatched inside a panic guard. Failures are recorded,
//!    forwarded to the exception callback, then swallowed or fatal depending on
//!    `die_on_exception`.
//! 3. A `Shutdown` command runs its hook with the [`WorkerContext`] and ends
//!    the loop.
//!
//! Threads cannot be pre-empted, so `kill` is cooperative: it fires a private
//! signal the loop selects on alongside the queue. The loop exits at the next
//! command boundary and the thread is detached; a command already running is
//! abandoned, not interrupted.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Selector, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use workers_api::{Command, CommandHandler, DefaultHandler, ExceptionCallback, Outcome, WorkerError, WorkerId};

use super::queue::CommandQueue;
use crate::config::{DeathHook, WorkerConfig};
use crate::guard;

#[derive(Default)]
struct WorkerShared {
    /// Last failure raised by a command
    exception: Mutex<Option<Arc<anyhow::Error>>>,
    /// Set when the worker terminated because of a failure
    died: Mutex<Option<String>>,
}

/// View of a worker handed to shutdown hooks and command handlers.
#[derive(Clone)]
pub struct WorkerContext {
    id: WorkerId,
    shared: Arc<WorkerShared>,
}

impl WorkerContext {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            shared: Arc::new(WorkerShared::default()),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Last failure raised by a command on this worker.
    pub fn exception(&self) -> Option<Arc<anyhow::Error>> {
        self.shared.exception.lock().clone()
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("id", &self.id)
            .finish()
    }
}

/// A single command-processing thread.
///
/// Dropping the handle kills the worker (see the module docs); call
/// [`dispose`](Worker::dispose) for an orderly stop.
pub struct Worker {
    context: WorkerContext,
    queue: CommandQueue<WorkerContext>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    /// Disconnects when the thread exits
    exited: Receiver<()>,
    /// Dropping the sender wakes the loop and makes it exit
    kill_switch: Mutex<Option<Sender<()>>>,
}

impl Worker {
    /// Spawns a worker thread.
    ///
    /// # Errors
    /// [`WorkerError::Spawn`] when the OS refuses to create the thread.
    pub fn new(config: WorkerConfig) -> Result<Self, WorkerError> {
        let id = Uuid::new_v4();
        let context = WorkerContext::new(id);
        let queue = config.queue.unwrap_or_default();
        let (exit_signal, exited) = flume::bounded::<()>(0);
        let (kill_switch, kill_signal) = flume::bounded::<()>(1);

        let event_loop = EventLoop {
            context: context.clone(),
            commands: queue.receiver(),
            kill_signal,
            handler: config.handler.unwrap_or_else(|| Arc::new(DefaultHandler)),
            on_exception: config.on_exception,
            die_on_exception: config.die_on_exception,
            on_death: config.on_death,
        };

        let name = config
            .thread_name
            .unwrap_or_else(|| format!("worker-{}", id.simple()));
        let handle = thread::Builder::new().name(name).spawn(move || {
            let _exit_signal = exit_signal;
            event_loop.run();
        })?;

        Ok(Self {
            context,
            queue,
            thread_id: handle.thread().id(),
            thread: Mutex::new(Some(handle)),
            exited,
            kill_switch: Mutex::new(Some(kill_switch)),
        })
    }

    pub fn id(&self) -> WorkerId {
        self.context.id
    }

    pub fn context(&self) -> &WorkerContext {
        &self.context
    }

    /// Queue this worker consumes; shared with its pool, if any.
    pub fn queue(&self) -> &CommandQueue<WorkerContext> {
        &self.queue
    }

    pub fn enqueue(&self, command: Command<WorkerContext>) {
        self.queue.push(command);
    }

    pub fn perform<F>(&self, f: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.enqueue(Command::perform(f));
    }

    pub fn shutdown(&self) {
        self.enqueue(Command::shutdown());
    }

    /// Shutdown whose hook runs on the worker thread right before it exits.
    pub fn shutdown_with<F>(&self, hook: F)
    where
        F: FnOnce(&WorkerContext) + Send + 'static,
    {
        self.enqueue(Command::shutdown_with(hook));
    }

    /// Stops the worker at its next command boundary and detaches the thread.
    pub fn kill(&self) {
        drop(self.kill_switch.lock().take());
        drop(self.thread.lock().take());
    }

    /// Waits for the thread to exit.
    ///
    /// Returns `Ok(true)` once it has exited and `Ok(false)` when `timeout`
    /// elapsed first, in which case the worker is killed. A timeout that does
    /// not fit in an `Instant` waits indefinitely.
    ///
    /// # Errors
    /// - [`WorkerError::SelfJoin`] when called from the worker's own thread.
    /// - [`WorkerError::Died`] when the worker terminated on a failure.
    pub fn join(&self, timeout: Option<Duration>) -> Result<bool, WorkerError> {
        if self.is_current_thread() {
            return Err(WorkerError::SelfJoin);
        }

        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let exited = match deadline {
            // recv only returns once the exit signal disconnects
            None => self.exited.recv().is_err(),
            Some(deadline) => !matches!(
                self.exited.recv_deadline(deadline),
                Err(RecvTimeoutError::Timeout)
            ),
        };

        if !exited {
            warn!(worker = %self.id(), ?timeout, "worker did not exit in time; killing");
            self.kill();
            return Ok(false);
        }

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                return Err(WorkerError::Died("worker thread panicked".to_string()));
            }
        }

        match self.context.shared.died.lock().clone() {
            Some(reason) => Err(WorkerError::Died(reason)),
            None => Ok(true),
        }
    }

    /// Shutdown followed by join.
    pub fn dispose(&self, timeout: Option<Duration>) -> Result<bool, WorkerError> {
        self.shutdown();
        self.join(timeout)
    }

    pub fn is_alive(&self) -> bool {
        !self.exited.is_disconnected()
    }

    pub fn exception(&self) -> Option<Arc<anyhow::Error>> {
        self.context.exception()
    }

    pub(crate) fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

enum Signal {
    Command(Command<WorkerContext>),
    Kill,
    Closed,
}

struct EventLoop {
    context: WorkerContext,
    commands: Receiver<Command<WorkerContext>>,
    kill_signal: Receiver<()>,
    handler: Arc<dyn CommandHandler<WorkerContext>>,
    on_exception: Option<ExceptionCallback>,
    die_on_exception: bool,
    on_death: Option<DeathHook>,
}

impl EventLoop {
    fn run(self) {
        debug!(worker = %self.context.id, "worker started");

        loop {
            let signal = Selector::new()
                .recv(&self.kill_signal, |_| Signal::Kill)
                .recv(&self.commands, |command| match command {
                    Ok(command) => Signal::Command(command),
                    Err(_) => Signal::Closed,
                })
                .wait();

            let command = match signal {
                Signal::Command(_) if self.kill_signal.is_disconnected() => {
                    debug!(worker = %self.context.id, "worker killed");
                    return;
                }
                Signal::Command(command) => command,
                Signal::Kill => {
                    debug!(worker = %self.context.id, "worker killed");
                    return;
                }
                Signal::Closed => break,
            };

            let label = command.label().to_string();
            match guard::catch_unwind(|| self.handler.handle(&self.context, command)) {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Stop) => break,
                Err(error) => {
                    if !self.on_exception(&label, error) {
                        break;
                    }
                }
            }
        }

        debug!(worker = %self.context.id, "worker stopped");
    }

    /// Records the failure and reports whether the loop keeps running.
    fn on_exception(&self, command: &str, error: anyhow::Error) -> bool {
        warn!(worker = %self.context.id, command, error = %error, "command failed");

        let error = Arc::new(error);
        *self.context.shared.exception.lock() = Some(error.clone());

        if let Some(callback) = &self.on_exception {
            if let Err(callback_error) = guard::catch_unwind(|| {
                callback(error.as_ref());
                Ok(())
            }) {
                warn!(worker = %self.context.id, error = %callback_error, "exception callback failed");
            }
        }

        if self.die_on_exception {
            *self.context.shared.died.lock() = Some(error.to_string());
            if let Some(hook) = &self.on_death {
                hook(&self.context);
            }
            return false;
        }

        true
    }
}
