//! Per-session conversation history with checkpoint/rollback
//!
//! A "turn" is a user message plus the zero-or-more following
//! assistant/system messages up to the next user message. Trimming keeps
//! the most recent turns and preserves any leading system message.

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Opaque snapshot marker returned by [`ConversationHistory::checkpoint`].
///
/// The internal representation is private and free to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Ordered message log for one session
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationHistory {
    /// Create an empty history with the given sliding-window size
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// Create a history seeded with a leading system message
    pub fn with_system(system: impl Into<String>, max_turns: usize) -> Self {
        let mut history = Self::new(max_turns);
        history.append(Role::System, system);
        history
    }

    /// Push a message
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Ordered copy of the messages for agent consumption
    pub fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of messages currently held
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of user-led turns currently held
    pub fn turn_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
    }

    /// Snapshot the current state for a later rollback
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.messages.len())
    }

    /// Restore the exact sequence captured by the marker.
    ///
    /// A marker from a longer history than the current one is a no-op.
    pub fn rollback(&mut self, marker: Checkpoint) {
        if marker.0 <= self.messages.len() {
            self.messages.truncate(marker.0);
        }
    }

    /// Keep the most recent `max_turns` turns, preserving a leading
    /// system message
    pub fn trim(&mut self) {
        let leading_system = self
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .cloned();
        let body_start = if leading_system.is_some() { 1 } else { 0 };

        // Index of each user message in the body; the window starts at the
        // (turn_count - max_turns)-th one.
        let user_indices: Vec<usize> = self.messages[body_start..]
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i + body_start)
            .collect();

        if user_indices.len() <= self.max_turns {
            return;
        }

        let cut = user_indices[user_indices.len() - self.max_turns];
        let mut kept: Vec<Message> = Vec::with_capacity(self.messages.len() - cut + 1);
        if let Some(system) = leading_system {
            kept.push(system);
        }
        kept.extend(self.messages.drain(cut..));
        self.messages = kept;
    }
}
