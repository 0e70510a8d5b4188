use std::fmt;

use flume::{Receiver, Sender};
use tracing::warn;

use workers_api::Command;

/// Unbounded multi-producer, multi-consumer FIFO of commands.
///
/// Cloning yields another handle to the same queue. Every worker attached to a
/// queue competes for its commands, which is how a pool hands work to
/// "whichever worker is free".
pub struct CommandQueue<C> {
    sender: Sender<Command<C>>,
    receiver: Receiver<Command<C>>,
}

impl<C> CommandQueue<C> {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    /// Appends a command. Never blocks.
    pub fn push(&self, command: Command<C>) {
        // The queue keeps its own receiver, so the channel cannot disconnect
        // while this handle exists.
        if let Err(err) = self.sender.send(command) {
            warn!(command = err.0.label(), "command queue disconnected; command dropped");
        }
    }

    pub(crate) fn receiver(&self) -> Receiver<Command<C>> {
        self.receiver.clone()
    }

    /// Commands waiting to be picked up (snapshot).
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<C> Clone for CommandQueue<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<C> Default for CommandQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for CommandQueue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.len())
            .finish()
    }
}
