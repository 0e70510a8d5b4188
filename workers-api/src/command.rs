//! # Commands
//!
//! Every queue in the toolkit carries [`Command`] values. A command is created
//! per enqueue and consumed exactly once by whichever consumer pops it.
//!
//! The type parameter `C` is the context a shutdown hook receives: a worker
//! passes its own context, an actor passes itself.

use std::fmt;

use downcast_rs::{impl_downcast, Downcast};

use crate::errors::WorkerError;
use crate::types::{Hook, Job};

/// Data attached to a [`Custom`] command.
///
/// Implemented for every `Send + Debug + 'static` type; recover the concrete
/// value with `downcast_ref`.
pub trait Payload: Downcast + Send + fmt::Debug {}
impl_downcast!(Payload);

impl<T: Send + fmt::Debug + 'static> Payload for T {}

/// A tagged command with an optional payload.
#[derive(Debug)]
pub struct Custom {
    tag: String,
    payload: Option<Box<dyn Payload>>,
}

impl Custom {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            payload: None,
        }
    }

    pub fn with_payload<P: Payload>(tag: impl Into<String>, payload: P) -> Self {
        Self {
            tag: tag.into(),
            payload: Some(Box::new(payload)),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn payload(&self) -> Option<&dyn Payload> {
        self.payload.as_deref()
    }

    /// Borrows the payload as `T` if it has that type.
    pub fn payload_as<T: Payload>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    pub fn into_payload(self) -> Option<Box<dyn Payload>> {
        self.payload
    }
}

/// Unit of work flowing through a worker queue or an actor mailbox.
pub enum Command<C> {
    /// Run a closure.
    Perform(Job),
    /// Stop the consumer, invoking the hook with its context first.
    Shutdown(Option<Hook<C>>),
    /// Anything else; interpreted by a custom handler.
    Custom(Custom),
}

impl<C> Command<C> {
    pub fn perform<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Command::Perform(Box::new(f))
    }

    pub fn shutdown() -> Self {
        Command::Shutdown(None)
    }

    pub fn shutdown_with<F>(hook: F) -> Self
    where
        F: FnOnce(&C) + Send + 'static,
    {
        Command::Shutdown(Some(Box::new(hook)))
    }

    pub fn custom(tag: impl Into<String>) -> Self {
        Command::Custom(Custom::new(tag))
    }

    pub fn custom_with<P: Payload>(tag: impl Into<String>, payload: P) -> Self {
        Command::Custom(Custom::with_payload(tag, payload))
    }

    /// Short label for logs: `perform`, `shutdown` or the custom tag.
    pub fn label(&self) -> &str {
        match self {
            Command::Perform(_) => "perform",
            Command::Shutdown(_) => "shutdown",
            Command::Custom(custom) => custom.tag(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Command::Shutdown(_))
    }
}

impl<C> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Perform(_) => f.write_str("Perform(..)"),
            Command::Shutdown(hook) => f
                .debug_tuple("Shutdown")
                .field(&hook.as_ref().map(|_| ".."))
                .finish(),
            Command::Custom(custom) => f.debug_tuple("Custom").field(custom).finish(),
        }
    }
}

/// What the consumer loop should do after a command was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Stop,
}

/// Strategy object consulted for every command a worker receives.
///
/// The provided [`handle`](CommandHandler::handle) runs `Perform` jobs and
/// stops on `Shutdown`; override [`handle_custom`](CommandHandler::handle_custom)
/// to give meaning to custom commands. An `Err` return is treated like an
/// exception raised by the command.
pub trait CommandHandler<C>: Send + Sync {
    fn handle(&self, context: &C, command: Command<C>) -> anyhow::Result<Outcome> {
        match command {
            Command::Perform(job) => {
                job()?;
                Ok(Outcome::Continue)
            }
            Command::Shutdown(hook) => {
                if let Some(hook) = hook {
                    hook(context);
                }
                Ok(Outcome::Stop)
            }
            Command::Custom(custom) => self.handle_custom(context, custom),
        }
    }

    fn handle_custom(&self, _context: &C, custom: Custom) -> anyhow::Result<Outcome> {
        Err(WorkerError::UnknownCommand(custom.tag().to_string()).into())
    }
}

/// Handles `Perform` and `Shutdown`; rejects every custom command.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandler;

impl<C> CommandHandler<C> for DefaultHandler {}
