//! # Tasks
//!
//! [`Task`] wraps a fallible closure with a retry budget; [`TaskGroup`] runs a
//! batch of tasks on a pool and waits on a barrier until every one of them has
//! finished.
//!
//! ```rust,no_run
//! use workers::TaskGroup;
//!
//! let group = TaskGroup::new()?;
//! let squares = group.map(1..=4u64, |n: &u64| Ok(n * n))?;
//! assert_eq!(squares, vec![1, 4, 9, 16]);
//! # Ok::<(), workers::GroupError>(())
//! ```

mod group;
mod task;

pub use group::{TaskGroup, TaskHandle};
pub use task::{Task, TaskBuilder};
