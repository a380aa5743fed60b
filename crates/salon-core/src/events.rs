//! Session event stream
//!
//! Observers are injected into the orchestration loop as the sending half
//! of a channel; nothing in the engine publishes through process-wide
//! state. Progress and terminal outcomes are distinct variants, never a
//! nullable sentinel.

use crate::error::{Error, Result};
use crate::snapshot::TurnSnapshot;
use serde::Serialize;
use tokio::sync::mpsc;

/// One observable event from a room session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Intermediate progress for the current cycle
    Snapshot(TurnSnapshot),
    /// The conversation was handed off to another room in the group
    RoomChanged {
        /// Target room name
        room: String,
        /// Context carried across the handoff (possibly empty)
        context: String,
    },
    /// The turn loop finished
    Completed {
        /// Termination strategy name, absent when the loop was cut off
        /// (iteration cap) or ended by a handoff
        reason: Option<String>,
    },
}

/// Sending half of a session's event stream
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    tx: mpsc::Sender<SessionEvent>,
}

impl SnapshotSink {
    /// Wrap a channel sender
    #[must_use]
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Emit an intermediate snapshot.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] when the observer has gone away, so
    /// the loop stops streaming promptly.
    pub async fn snapshot(&self, snapshot: TurnSnapshot) -> Result<()> {
        self.send(SessionEvent::Snapshot(snapshot)).await
    }

    /// Emit any session event.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] when the observer has gone away.
    pub async fn send(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::Cancelled)
    }
}
