//! Conversation history
//!
//! Append-only record of authored turns, owned exclusively by one room
//! group's live session. Cleared only by an explicit reset.

use salon_llm::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// One authored turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Display name of the author (agent or user)
    pub author: String,
    /// Conversation role
    pub role: MessageRole,
    /// Turn text
    pub text: String,
}

/// Ordered, append-only conversation history
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Entry>,
}

impl History {
    /// Empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    pub fn push_user(&mut self, author: impl Into<String>, text: impl Into<String>) {
        self.entries.push(Entry {
            author: author.into(),
            role: MessageRole::User,
            text: text.into(),
        });
    }

    /// Append an agent turn
    pub fn push_agent(&mut self, author: impl Into<String>, text: impl Into<String>) {
        self.entries.push(Entry {
            author: author.into(),
            role: MessageRole::Assistant,
            text: text.into(),
        });
    }

    /// Atomically clear all entries
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// All entries in order
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no turns have been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Author of the most recent turn
    #[must_use]
    pub fn last_author(&self) -> Option<&str> {
        self.entries.last().map(|e| e.author.as_str())
    }

    /// Render as transcript text for embedding into prompts
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}", e.author, e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Convert to provider messages, seen from one agent's perspective:
    /// that agent's own turns become assistant messages, everything else
    /// arrives as named user messages.
    #[must_use]
    pub fn to_messages(&self, viewpoint: &str) -> Vec<Message> {
        self.entries
            .iter()
            .map(|e| {
                if e.author.eq_ignore_ascii_case(viewpoint) {
                    Message::assistant(e.text.clone())
                } else {
                    Message::user(e.text.clone()).with_name(e.author.clone())
                }
            })
            .collect()
    }
}
