//! # Workers API
//!
//! Shared vocabulary for the `workers` thread toolkit. The runtime crate builds
//! pools, schedulers, task groups and actors on top of the types defined here.
//!
//! ## Core Components
//!
//! - **Commands**: the in-process protocol that flows through every queue:
//!   `Perform(job)`, `Shutdown(hook)` and `Custom(tag, payload)`.
//! - **Handlers**: [`CommandHandler`] is the strategy object a worker consults
//!   for each command. The default covers `Perform` and `Shutdown`; custom
//!   commands are handled by composing in a handler of your own.
//! - **Errors**: one typed error enum per component.
//! - **Task states**: the lifecycle shared by tasks and task groups.
//!
//! ## Usage Example
//!
//! ```rust
//! use workers_api::{Command, CommandHandler, Custom, Outcome};
//!
//! struct Echo;
//!
//! impl CommandHandler<()> for Echo {
//!     fn handle_custom(&self, _ctx: &(), custom: Custom) -> anyhow::Result<Outcome> {
//!         println!("got {}", custom.tag());
//!         Ok(Outcome::Continue)
//!     }
//! }
//!
//! let outcome = Echo.handle(&(), Command::custom("ping")).unwrap();
//! assert_eq!(outcome, Outcome::Continue);
//! ```
//!
//! ## Module Organization
//!
//! - [`command`]: commands, payloads and the handler trait
//! - [`errors`]: error types
//! - [`task`]: task and task group states
//! - [`types`]: common type aliases

pub mod command;
pub mod errors;
pub mod task;
pub mod types;

pub use command::{Command, CommandHandler, Custom, DefaultHandler, Outcome, Payload};
pub use errors::{ActorError, GroupError, PoolError, RegistryError, SchedulerError, TaskError, WorkerError};
pub use task::{GroupState, TaskState};
pub use types::{ActorId, ExceptionCallback, Hook, Job, TimerId, WorkerId};
