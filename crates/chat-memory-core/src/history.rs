//! Fixed-capacity conversation window.

use std::collections::VecDeque;

use crate::Message;

/// Maximum number of messages retained per session.
pub const HISTORY_CAPACITY: usize = 20;

/// Ordered message window with FIFO eviction.
///
/// Insertion order is conversational order. Pushing past
/// [`HISTORY_CAPACITY`] drops exactly one message from the head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<Message>,
}

impl History {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Rebuild a history from persisted messages.
    ///
    /// Keeps only the newest [`HISTORY_CAPACITY`] entries if the stored
    /// sequence is longer than the window.
    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut entries = VecDeque::from(messages);
        let excess = entries.len().saturating_sub(HISTORY_CAPACITY);
        entries.drain(..excess);
        Self { entries }
    }

    /// Append a message at the tail, returning the evicted head if the
    /// window overflowed.
    pub fn push(&mut self, msg: Message) -> Option<Message> {
        self.entries.push_back(msg);
        if self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Snapshot of the window, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }
}
