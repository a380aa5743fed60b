//! Turn snapshots
//!
//! The observable progress record of one orchestration cycle. The builder
//! is mutated as the cycle advances; every emission produces a fresh
//! immutable [`TurnSnapshot`] value, so observers on the other side of a
//! channel never alias live state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Phase a hint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Choosing which agent acts next
    Selection,
    /// Computing carried context for a room handoff
    Transfer,
    /// The selected agent producing its turn
    Response,
}

impl Phase {
    /// Stable key used in the hint map and on the wire
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Transfer => "transfer",
            Self::Response => "response",
        }
    }
}

/// One named UI hint: what was asked, what was produced, and the rationale
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hint {
    /// Prompt text sent for this phase
    #[serde(default)]
    pub prompt: String,
    /// Produced content so far
    #[serde(default)]
    pub content: String,
    /// Rationale / thinking text, if any
    #[serde(default)]
    pub thinking: String,
}

/// Immutable view of one orchestration step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Whether a new agent turn has begun in this cycle
    pub turn_started: bool,
    /// Selected agent's display name, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Hints keyed by phase name
    #[serde(default)]
    pub hints: BTreeMap<String, Hint>,
    /// Whether a room change was requested
    #[serde(default)]
    pub room_change: bool,
    /// Handoff target room, when a room change was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_room: Option<String>,
    /// Context carried across the handoff (possibly empty)
    #[serde(default)]
    pub carried_context: String,
}

/// Builder threaded through one orchestration cycle
#[derive(Debug, Clone, Default)]
pub struct TurnSnapshotBuilder {
    inner: TurnSnapshot,
}

impl TurnSnapshotBuilder {
    /// Fresh builder for a new cycle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark that a new agent turn has begun
    pub fn turn_started(&mut self) -> &mut Self {
        self.inner.turn_started = true;
        self
    }

    /// Record the selected agent
    pub fn agent(&mut self, name: impl Into<String>) -> &mut Self {
        self.inner.agent = Some(name.into());
        self
    }

    /// Set the prompt for a phase hint
    pub fn hint_prompt(&mut self, phase: Phase, prompt: impl Into<String>) -> &mut Self {
        self.hint_mut(phase).prompt = prompt.into();
        self
    }

    /// Replace the produced content for a phase hint
    pub fn hint_content(&mut self, phase: Phase, content: impl Into<String>) -> &mut Self {
        self.hint_mut(phase).content = content.into();
        self
    }

    /// Append to the produced content for a phase hint
    pub fn hint_append(&mut self, phase: Phase, delta: &str) -> &mut Self {
        self.hint_mut(phase).content.push_str(delta);
        self
    }

    /// Set the thinking text for a phase hint
    pub fn hint_thinking(&mut self, phase: Phase, thinking: impl Into<String>) -> &mut Self {
        self.hint_mut(phase).thinking = thinking.into();
        self
    }

    /// Request a room change carrying the given context
    pub fn room_change(
        &mut self,
        target: impl Into<String>,
        context: impl Into<String>,
    ) -> &mut Self {
        self.inner.room_change = true;
        self.inner.target_room = Some(target.into());
        self.inner.carried_context = context.into();
        self
    }

    /// Produce an immutable snapshot of the current state
    #[must_use]
    pub fn snapshot(&self) -> TurnSnapshot {
        self.inner.clone()
    }

    /// Current content of a phase hint, if present
    #[must_use]
    pub fn hint_content_of(&self, phase: Phase) -> Option<&str> {
        self.inner
            .hints
            .get(phase.as_str())
            .map(|h| h.content.as_str())
    }

    fn hint_mut(&mut self, phase: Phase) -> &mut Hint {
        self.inner
            .hints
            .entry(phase.as_str().to_string())
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshots_are_independent() {
        let mut builder = TurnSnapshotBuilder::new();
        builder.agent("Scout");
        let first = builder.snapshot();

        builder.hint_append(Phase::Response, "partial");
        let second = builder.snapshot();

        assert!(first.hints.is_empty());
        assert_eq!(second.hints["response"].content, "partial");
        assert_eq!(first.agent.as_deref(), Some("Scout"));
    }

    #[test]
    fn test_room_change_fields() {
        let mut builder = TurnSnapshotBuilder::new();
        builder.room_change("library", "ask about maps");
        let snapshot = builder.snapshot();

        assert!(snapshot.room_change);
        assert_eq!(snapshot.target_room.as_deref(), Some("library"));
        assert_eq!(snapshot.carried_context, "ask about maps");
    }

    #[test]
    fn test_hint_accumulation() {
        let mut builder = TurnSnapshotBuilder::new();
        builder.hint_prompt(Phase::Selection, "who next?");
        builder.hint_append(Phase::Selection, "Sco");
        builder.hint_append(Phase::Selection, "ut");
        builder.hint_thinking(Phase::Selection, "turn order");

        let hint = &builder.snapshot().hints["selection"];
        assert_eq!(hint.prompt, "who next?");
        assert_eq!(hint.content, "Scout");
        assert_eq!(hint.thinking, "turn order");
    }

    #[test]
    fn test_serialization_skips_absent_agent() {
        let snapshot = TurnSnapshotBuilder::new().snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("\"agent\""));
        assert!(!json.contains("target_room"));
    }
}
