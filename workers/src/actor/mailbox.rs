use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;

/// FIFO queue guarded by its own lock.
///
/// [`synchronize`](Mailbox::synchronize) exposes the lock so callers can make
/// a check and a mutation atomic, as actors do with their liveness flag.
pub struct Mailbox<T> {
    messages: Mutex<VecDeque<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, message: T) {
        self.messages.lock().push_back(message);
    }

    /// Removes the oldest message.
    pub fn pop(&self) -> Option<T> {
        self.messages.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Runs `f` with exclusive access to the queue.
    ///
    /// The lock is not reentrant: `f` must not call back into this mailbox.
    pub fn synchronize<R>(&self, f: impl FnOnce(&mut VecDeque<T>) -> R) -> R {
        let mut messages = self.messages.lock();
        f(&mut messages)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .finish()
    }
}
