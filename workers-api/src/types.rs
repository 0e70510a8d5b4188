use std::sync::Arc;

use uuid::Uuid;

// Type aliases for common types
pub type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;
pub type Hook<C> = Box<dyn FnOnce(&C) + Send + 'static>;
pub type ExceptionCallback = Arc<dyn Fn(&anyhow::Error) + Send + Sync + 'static>;

pub type WorkerId = Uuid;
pub type TimerId = Uuid;
pub type ActorId = Uuid;
