//! # Worker Pools
//!
//! Execution substrate for the rest of the toolkit.
//!
//! ## Key Concepts
//! - [`Worker`]: one OS thread consuming a [`CommandQueue`] until it handles a
//!   `Shutdown` command.
//! - [`Pool`]: a resizable set of workers sharing one queue. Any idle worker
//!   takes the next command, so dequeue order is FIFO while completion order
//!   is not guaranteed.
//!
//! ## Failure Isolation
//! Errors and panics raised by a command are caught at the worker's dispatch
//! boundary, recorded as the worker's last exception and handed to the
//! configured exception callback. Pool members keep running afterwards unless
//! the pool opts into `die_on_exception`.

mod pool;
mod queue;
mod worker;

pub use pool::Pool;
pub use queue::CommandQueue;
pub use worker::{Worker, WorkerContext};
