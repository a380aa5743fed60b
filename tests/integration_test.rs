//! Integration tests for Salon
//!
//! These tests verify the integration between the crates:
//! - salon-llm: provider contract, decision parsing, thinking split
//! - salon-core: loader, registry, and the full orchestration loop

use async_trait::async_trait;
use salon_core::{
    PresetTable, RoomLoader, RoomRegistry, SessionEvent, SnapshotSink,
};
use salon_llm::{
    extract_decision, split_thinking, ChunkReceiver, CompletionRequest, CompletionResponse,
    InferenceProvider, RetrievalStore, StreamChunk,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        })
    }

    fn next(&self) -> salon_llm::Result<String> {
        self.replies
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| salon_llm::Error::Api("scripted replies exhausted".to_string()))
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> salon_llm::Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: self.next()?,
            finish_reason: Some("stop".to_string()),
            model: "scripted".to_string(),
        })
    }

    async fn complete_stream(
        &self,
        _request: CompletionRequest,
    ) -> salon_llm::Result<ChunkReceiver> {
        let reply = self.next()?;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(Ok(StreamChunk::delta(reply))).await;
            let _ = tx.send(Ok(StreamChunk::done(""))).await;
        });
        Ok(rx)
    }
}

struct EmptyStore;

#[async_trait]
impl RetrievalStore for EmptyStore {
    async fn collection_exists(&self, _name: &str) -> salon_llm::Result<bool> {
        Ok(false)
    }
}

const GROUP_TOML: &str = r#"
name = "expedition"

[[rooms]]
name = "base-camp"

[[rooms.agents]]
name = "Scout"
instructions = "You scout ahead."

[[rooms.agents]]
name = "Guide"
instructions = "You guide the group."

[[rooms.rules]]
[rooms.rules.selection]
kind = "rule"
instruction = "Pick the next speaker, or send the group to the archive."

[[rooms.rules.selection.choices]]
name = "archive"

[rooms.rules.termination]
name = "plan-settled"
finished = true
agents = ["Guide"]

[[rooms]]
name = "archive"

[[rooms.agents]]
name = "Archivist"
instructions = "You keep the archive."

[[rooms.rules]]
[rooms.rules.selection]
kind = "round_robin"

[rooms.rules.termination]
name = "answered"
finished = true
"#;

async fn registry_with(replies: Vec<&str>) -> (RoomRegistry, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("expedition.toml"), GROUP_TOML).expect("write toml");
    let registry = RoomRegistry::load(
        &RoomLoader::with_path(dir.path()),
        ScriptedProvider::new(replies),
        Arc::new(PresetTable::standard()),
        &EmptyStore,
    )
    .await
    .expect("registry load");
    (registry, dir)
}

async fn run_turn(registry: &RoomRegistry, text: &str) -> Vec<SessionEvent> {
    let session = registry.require("expedition").expect("session");
    let (tx, mut rx) = mpsc::channel(64);
    let sink = SnapshotSink::new(tx);
    let text = text.to_string();
    let task = tokio::spawn(async move {
        session
            .converse("User", &text, &sink, &CancellationToken::new())
            .await
    });
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    task.await.expect("join").expect("turn");
    events
}

// ============================================================================
// Full conversation flow
// ============================================================================

#[tokio::test]
async fn test_rule_selection_runs_agent_until_termination() {
    let (registry, _dir) = registry_with(vec![
        r#"{"reason": "report first", "next": "Scout"}"#,
        "The pass is clear.",
        r#"{"reason": "decide", "next": "Guide"}"#,
        "We take the pass at dawn.",
    ])
    .await;

    let events = run_turn(&registry, "what's the route?").await;

    let agents: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Snapshot(s) if s.turn_started => s.agent.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(agents, ["Scout", "Guide"]);

    assert!(matches!(
        events.last(),
        Some(SessionEvent::Completed { reason: Some(r) }) if r == "plan-settled"
    ));
}

#[tokio::test]
async fn test_handoff_reaches_other_room_next_turn() {
    let (registry, _dir) = registry_with(vec![
        r#"{"reason": "they need records", "next": "archive"}"#,
        "The 1882 survey covers that ridge.",
    ])
    .await;

    let events = run_turn(&registry, "any old surveys?").await;
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::RoomChanged { room, .. } if room == "archive")));

    let session = registry.require("expedition").unwrap();
    assert_eq!(session.current_room().await, "archive");

    // Next turn runs in the archive under its round-robin rule.
    let events = run_turn(&registry, "the east ridge, please").await;
    let agents: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Snapshot(s) if s.turn_started => s.agent.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(agents, ["Archivist"]);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Completed { reason: Some(r) }) if r == "answered"
    ));
}

// ============================================================================
// Preset evaluator properties
// ============================================================================

#[test]
fn test_negated_preset_uses_the_not_mapping() {
    let table = PresetTable::standard();
    // Value matches the candidate, so the answer is the mapping for the
    // "Not" prefix, which denies by default.
    assert_eq!(
        salon_core::preset::evaluate(&table, "Not AgentName = Scout", "Scout"),
        salon_core::Opinion::Decided(false)
    );
    assert_eq!(
        salon_core::preset::evaluate(&table, "AgentName = Scout", "Scout"),
        salon_core::Opinion::Decided(true)
    );
    assert_eq!(
        salon_core::preset::evaluate(&table, "AgentName = Scout", "Guide"),
        salon_core::Opinion::NoOpinion
    );
}

// ============================================================================
// Inference text helpers
// ============================================================================

#[test]
fn test_decision_extraction_tolerates_commentary() {
    let decision = extract_decision(
        "Happy to help! Here's my pick:\n{\"reason\": \"knows the maps\", \"next\": \"Archivist\"}\nLet me know.",
    )
    .expect("decision");
    assert_eq!(decision.next, "Archivist");
    assert_eq!(decision.reason, "knows the maps");
}

#[test]
fn test_thinking_split_hides_rationale_from_decisions() {
    let (thinking, visible) =
        split_thinking("<think>could be either</think>{\"reason\": \"r\", \"next\": \"Scout\"}");
    assert_eq!(thinking.as_deref(), Some("could be either"));
    assert!(extract_decision(&visible).is_ok());
}
