use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use workers_api::{ActorError, ActorId, Command, Custom, Outcome, Payload};

use super::mailbox::Mailbox;
use super::registry::Registry;
use crate::config::{ActorConfig, PoolConfig};
use crate::guard;
use crate::pool::Pool;
use crate::system;

/// Message type carried by actor mailboxes. Shutdown hooks receive the actor.
pub type ActorMessage = Command<Actor>;

/// Reactions of an actor to the messages it processes.
///
/// Every method has a logging default, so implementors override only what
/// they need.
pub trait ActorBehavior: Send + Sync + 'static {
    /// Handles a custom event. An `Err` kills the actor.
    fn process_event(&self, actor: &Actor, event: Custom) -> anyhow::Result<()> {
        debug!(actor = %actor.identifier(), event = ?event, "actor received event");
        Ok(())
    }

    /// Runs on the actor's thread when a shutdown message is processed.
    fn shutdown_handler(&self, actor: &Actor) {
        crate::log_lifecycle!("actor", actor.identifier(), "shutting_down");
    }

    /// Runs after the actor died from a failed message.
    fn exception_handler(&self, actor: &Actor, error: &anyhow::Error) {
        crate::log_error!(error, actor = %actor.identifier(), "actor died");
    }
}

/// Behavior that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBehavior;

impl ActorBehavior for DefaultBehavior {}

/// Adapts a closure into a behavior handling custom events.
pub struct FnBehavior<F>(F);

impl<F> FnBehavior<F>
where
    F: Fn(&Actor, Custom) -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ActorBehavior for FnBehavior<F>
where
    F: Fn(&Actor, Custom) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn process_event(&self, actor: &Actor, event: Custom) -> anyhow::Result<()> {
        (self.0)(actor, event)
    }
}

struct ActorInner {
    id: ActorId,
    name: Option<String>,
    dedicated: bool,
    mailbox: Arc<Mailbox<ActorMessage>>,
    pool: Arc<Pool>,
    registry: Arc<Registry>,
    // Written under the mailbox lock so enqueue can check and push atomically
    alive: AtomicBool,
    behavior: Box<dyn ActorBehavior>,
}

/// A mailbox whose messages are processed on a pool.
///
/// Every accepted message schedules a drain of the mailbox on the pool. On a
/// shared pool two drains may overlap: messages still leave the mailbox in
/// FIFO order, but their handlers can run concurrently. A dedicated actor owns
/// a single-worker pool, so its messages are handled strictly one at a time.
///
/// `Actor` is a cheap handle; clones refer to the same actor.
#[derive(Clone)]
pub struct Actor {
    inner: Arc<ActorInner>,
}

impl Actor {
    /// Creates an actor and registers it under its name, if it has one.
    ///
    /// # Errors
    /// - [`ActorError::Registry`] when the name is already taken.
    /// - [`ActorError::Pool`] when the pool cannot be created.
    pub fn new<B: ActorBehavior>(config: ActorConfig, behavior: B) -> Result<Self, ActorError> {
        let id = Uuid::new_v4();

        let pool = if config.dedicated {
            let prefix = match &config.name {
                Some(name) => format!("actor-{}", name),
                None => format!("actor-{}", id.simple()),
            };
            Arc::new(Pool::new(
                PoolConfig::default().with_size(1).with_thread_name_prefix(prefix),
            )?)
        } else {
            match config.pool {
                Some(pool) => pool,
                None => system::pool()?,
            }
        };

        let actor = Self {
            inner: Arc::new(ActorInner {
                id,
                name: config.name,
                dedicated: config.dedicated,
                mailbox: config.mailbox.unwrap_or_default(),
                pool,
                registry: config.registry.unwrap_or_else(system::registry),
                alive: AtomicBool::new(true),
                behavior: Box::new(behavior),
            }),
        };

        if let Err(err) = actor.inner.registry.register(&actor) {
            if actor.inner.dedicated {
                actor.inner.pool.shutdown();
            }
            return Err(err.into());
        }

        crate::log_lifecycle!("actor", actor.identifier(), "started", dedicated = actor.inner.dedicated);
        Ok(actor)
    }

    /// A dedicated actor with the given name.
    pub fn dedicated<B: ActorBehavior>(name: impl Into<String>, behavior: B) -> Result<Self, ActorError> {
        Self::new(ActorConfig::dedicated().with_name(name), behavior)
    }

    pub fn id(&self) -> ActorId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// `"<id>:<name>"`, or just the id for unnamed actors.
    pub fn identifier(&self) -> String {
        match &self.inner.name {
            Some(name) => format!("{}:{}", self.inner.id, name),
            None => self.inner.id.to_string(),
        }
    }

    pub fn is_dedicated(&self) -> bool {
        self.inner.dedicated
    }

    pub fn mailbox(&self) -> &Arc<Mailbox<ActorMessage>> {
        &self.inner.mailbox
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.inner.pool
    }

    pub fn alive(&self) -> bool {
        self.inner
            .mailbox
            .synchronize(|_| self.inner.alive.load(Ordering::SeqCst))
    }

    /// Queues `message` and schedules a drain.
    ///
    /// Returns `false`, dropping the message, once the actor is dead.
    pub fn enqueue(&self, message: ActorMessage) -> bool {
        let accepted = self.inner.mailbox.synchronize(|queue| {
            if !self.inner.alive.load(Ordering::SeqCst) {
                return false;
            }
            queue.push_back(message);
            true
        });

        if accepted {
            let actor = self.clone();
            self.inner.pool.perform(move || {
                actor.drain();
                Ok(())
            });
        }

        accepted
    }

    /// Sends a custom event without payload.
    pub fn tell(&self, tag: impl Into<String>) -> bool {
        self.enqueue(Command::custom(tag))
    }

    pub fn tell_with<P: Payload>(&self, tag: impl Into<String>, payload: P) -> bool {
        self.enqueue(Command::custom_with(tag, payload))
    }

    /// Runs `f` in the actor's serialized context.
    pub fn perform<F>(&self, f: F) -> bool
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.enqueue(Command::perform(f))
    }

    pub fn shutdown(&self) -> bool {
        self.enqueue(Command::shutdown())
    }

    /// Shutdown whose hook runs right after the behavior's shutdown handler.
    pub fn shutdown_with<F>(&self, hook: F) -> bool
    where
        F: FnOnce(&Actor) + Send + 'static,
    {
        self.enqueue(Command::shutdown_with(hook))
    }

    fn drain(&self) {
        while let Some(message) = self.inner.mailbox.pop() {
            match guard::catch_unwind(|| self.process(message)) {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Stop) => break,
                Err(err) => {
                    self.die(err);
                    break;
                }
            }
        }
    }

    fn process(&self, message: ActorMessage) -> anyhow::Result<Outcome> {
        match message {
            Command::Perform(job) => {
                job()?;
                Ok(Outcome::Continue)
            }
            Command::Custom(event) => {
                self.inner.behavior.process_event(self, event)?;
                Ok(Outcome::Continue)
            }
            Command::Shutdown(hook) => {
                self.inner.behavior.shutdown_handler(self);
                if let Some(hook) = hook {
                    hook(self);
                }
                self.terminate();
                crate::log_lifecycle!("actor", self.identifier(), "stopped");
                Ok(Outcome::Stop)
            }
        }
    }

    fn die(&self, error: anyhow::Error) {
        self.terminate();

        let reported = guard::catch_unwind(|| {
            self.inner.behavior.exception_handler(self, &error);
            Ok(())
        });
        if let Err(err) = reported {
            crate::log_error!(err, actor = %self.identifier(), "actor exception handler failed");
        }
    }

    /// Marks the actor dead, discards its backlog and releases its resources.
    fn terminate(&self) {
        let discarded: Vec<ActorMessage> = self.inner.mailbox.synchronize(|queue| {
            self.inner.alive.store(false, Ordering::SeqCst);
            queue.drain(..).collect()
        });

        if !discarded.is_empty() {
            debug!(actor = %self.identifier(), discarded = discarded.len(), "discarded pending messages");
        }
        drop(discarded);

        self.inner.registry.unregister(self);

        if self.inner.dedicated {
            self.inner.pool.shutdown();
        }
    }
}

impl PartialEq for Actor {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Actor {}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("dedicated", &self.inner.dedicated)
            .field("alive", &self.inner.alive.load(Ordering::SeqCst))
            .finish()
    }
}
