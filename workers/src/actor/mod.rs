//! # Actors
//!
//! An [`Actor`] pairs a [`Mailbox`] with a pool. Sending a message pushes it
//! onto the mailbox and schedules a drain; the drain hands each message to the
//! actor's [`ActorBehavior`] until the mailbox is empty.
//!
//! ## Lifecycle
//! - Alive from construction until it processes a shutdown message or a
//!   message fails. Either way the remaining backlog is discarded, the actor
//!   leaves its [`Registry`] and a dedicated actor stops its private worker.
//! - Messages sent to a dead actor are rejected (`enqueue` returns `false`).
//!
//! ```rust,no_run
//! use workers::{Actor, ActorConfig, Custom, FnBehavior};
//!
//! let printer = Actor::new(
//!     ActorConfig::default().with_name("printer"),
//!     FnBehavior::new(|actor: &Actor, event: Custom| {
//!         println!("{} got {}", actor.identifier(), event.tag());
//!         Ok(())
//!     }),
//! )?;
//!
//! printer.tell("hello");
//! printer.shutdown();
//! # Ok::<(), workers::ActorError>(())
//! ```

mod actor;
mod mailbox;
mod registry;

pub use actor::{Actor, ActorBehavior, ActorMessage, DefaultBehavior, FnBehavior};
pub use mailbox::Mailbox;
pub use registry::Registry;
