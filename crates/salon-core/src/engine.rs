//! Room session orchestration
//!
//! One [`RoomSession`] wraps one room group. Its turn loop is a single
//! cooperative sequence: the session state is held behind an async mutex
//! for the whole turn, so two turns for the same group never interleave,
//! while distinct groups share nothing mutable.

use crate::error::{Error, Result};
use crate::events::{SessionEvent, SnapshotSink};
use crate::history::History;
use crate::preset::PresetTable;
use crate::rooms::{AgentDef, RoomGroup};
use crate::snapshot::{Phase, TurnSnapshotBuilder};
use crate::strategy::{pipeline, Selection, SelectionContext, StrategyTable};
use crate::transfer::SKIP_CONTEXT_MARKER;
use salon_llm::{CompletionRequest, InferenceProvider, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Hard cap on turn cycles per conversation turn.
///
/// A safety valve against rule sets that never signal completion; hitting
/// it ends the stream without a termination reason and is not an error.
pub const MAX_TURN_CYCLES: usize = 100;

struct SessionState {
    current_room: String,
    history: History,
    last_agent: Option<String>,
    last_termination: Option<String>,
}

/// Live conversation state for one room group
pub struct RoomSession {
    group: RoomGroup,
    provider: Arc<dyn InferenceProvider>,
    tables: HashMap<String, StrategyTable>,
    state: Mutex<SessionState>,
    // Mirrors `state.current_room`; written only under the state lock,
    // readable without it so roster queries never wait on a turn.
    room_name: RwLock<String>,
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("group", &self.group.name)
            .finish_non_exhaustive()
    }
}

impl RoomSession {
    /// Wrap a loaded group. Strategy tables (and their rotation cursors)
    /// are built once here and live for the session.
    #[must_use]
    pub fn new(
        group: RoomGroup,
        provider: Arc<dyn InferenceProvider>,
        presets: Arc<PresetTable>,
    ) -> Self {
        let tables = group
            .rooms
            .iter()
            .map(|room| {
                (
                    room.name.to_lowercase(),
                    StrategyTable::from_room(room, Arc::clone(&provider), Arc::clone(&presets)),
                )
            })
            .collect();
        let current_room = group.rooms.first().map(|r| r.name.clone()).unwrap_or_default();
        Self {
            group,
            provider,
            tables,
            state: Mutex::new(SessionState {
                current_room: current_room.clone(),
                history: History::new(),
                last_agent: None,
                last_termination: None,
            }),
            room_name: RwLock::new(current_room),
        }
    }

    /// The wrapped group definition
    #[must_use]
    pub fn group(&self) -> &RoomGroup {
        &self.group
    }

    /// Name of the room the conversation is currently in.
    ///
    /// Reads a cached copy, so an in-flight turn holding the session
    /// state does not stall the caller.
    pub async fn current_room(&self) -> String {
        self.room_name.read().await.clone()
    }

    async fn set_room(&self, state: &mut SessionState, name: &str) {
        state.current_room = name.to_string();
        *self.room_name.write().await = name.to_string();
    }

    /// Switch to another room in the group, returning its canonical name.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRoom`] when no room matches.
    pub async fn switch_room(&self, name: &str) -> Result<String> {
        let room = self
            .group
            .room(name)
            .ok_or_else(|| Error::UnknownRoom(name.to_string()))?;
        let mut state = self.state.lock().await;
        self.set_room(&mut state, &room.name).await;
        info!(group = %self.group.name, room = %room.name, "Room switched");
        Ok(room.name.clone())
    }

    /// Clear history and per-turn strategy state, returning whether the
    /// group wants a conversation started right away.
    pub async fn reset(&self) -> bool {
        let mut state = self.state.lock().await;
        state.history.reset();
        state.last_agent = None;
        state.last_termination = None;
        if let Some(room) = self.group.rooms.first() {
            self.set_room(&mut state, &room.name).await;
        }
        info!(group = %self.group.name, "Session reset");
        self.group.auto_start
    }

    /// Run one conversation turn: record the user's message, then cycle
    /// select → respond → check-termination until a termination strategy
    /// fires, a handoff leaves the room, or the cycle cap is reached.
    ///
    /// # Errors
    /// Propagates selection, inference, and cancellation failures; the
    /// cycle cap is not one of them.
    pub async fn converse(
        &self,
        author: &str,
        text: &str,
        sink: &SnapshotSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.history.push_user(author, text);

        for cycle in 0..MAX_TURN_CYCLES {
            let room = self
                .group
                .room(&state.current_room)
                .ok_or_else(|| Error::UnknownRoom(state.current_room.clone()))?;
            let table = self
                .tables
                .get(&room.name.to_lowercase())
                .ok_or_else(|| Error::Internal(format!("no strategy table for '{}'", room.name)))?;
            let pair = table
                .lookup(state.last_agent.as_deref(), state.last_termination.as_deref())
                .clone();

            let mut builder = TurnSnapshotBuilder::new();
            let selection = pair
                .selection
                .select(
                    SelectionContext {
                        agents: &room.agents,
                        history: &state.history,
                    },
                    &mut builder,
                    sink,
                    cancel,
                )
                .await?;

            match selection {
                Selection::Handoff { room: target, context } => {
                    return self.hand_off(&mut state, &target, context, sink).await;
                }
                Selection::Stop => {
                    state.last_termination = None;
                    return sink.send(SessionEvent::Completed { reason: None }).await;
                }
                Selection::Agent(agent) => {
                    builder.turn_started().agent(agent.name.clone());
                    sink.snapshot(builder.snapshot()).await?;

                    let response = self
                        .agent_response(&agent, &state.history, &mut builder, sink, cancel)
                        .await?;
                    state.history.push_agent(&agent.name, response);
                    state.last_agent = Some(agent.name.clone());

                    if pair.termination.should_end(&state.history, &agent.name) {
                        let reason = pair.termination.name().to_string();
                        debug!(group = %self.group.name, %reason, cycle, "Turn loop terminated");
                        state.last_termination = Some(reason.clone());
                        return sink
                            .send(SessionEvent::Completed {
                                reason: Some(reason),
                            })
                            .await;
                    }
                }
            }
        }

        debug!(group = %self.group.name, "Turn loop hit the cycle cap");
        state.last_termination = None;
        sink.send(SessionEvent::Completed { reason: None }).await
    }

    async fn hand_off(
        &self,
        state: &mut SessionState,
        target: &str,
        context: String,
        sink: &SnapshotSink,
    ) -> Result<()> {
        let room = self
            .group
            .room(target)
            .ok_or_else(|| Error::UnknownRoom(target.to_string()))?;
        self.set_room(state, &room.name).await;
        state.last_agent = None;
        state.last_termination = None;
        if !context.is_empty() && context != SKIP_CONTEXT_MARKER {
            state.history.push_user("Context", &context);
        }
        info!(group = %self.group.name, room = %room.name, "Conversation handed off");
        sink.send(SessionEvent::RoomChanged {
            room: room.name.clone(),
            context,
        })
        .await?;
        sink.send(SessionEvent::Completed { reason: None }).await
    }

    async fn agent_response(
        &self,
        agent: &AgentDef,
        history: &History,
        builder: &mut TurnSnapshotBuilder,
        sink: &SnapshotSink,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = CompletionRequest::new(self.provider.default_model())
            .with_message(Message::system(&agent.instructions))
            .with_messages(history.to_messages(&agent.name));
        pipeline::stream_into_hint(
            self.provider.as_ref(),
            request,
            Phase::Response,
            builder,
            sink,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::{
        NextChoice, Room, SelectionKind, SelectionRuleConfig, StrategyRule, TerminationRule,
    };
    use crate::testing::scripted_provider;
    use tokio::sync::mpsc;

    fn agent(name: &str) -> AgentDef {
        AgentDef {
            name: name.to_string(),
            emoji: String::new(),
            instructions: format!("You are {name}."),
            collection: None,
        }
    }

    fn round_robin_rule(finished: bool) -> StrategyRule {
        StrategyRule {
            after_agent: None,
            after_termination: None,
            selection: SelectionKind::RoundRobin,
            termination: TerminationRule {
                name: "wrap-up".to_string(),
                finished,
                agents: vec![],
            },
        }
    }

    fn group(rooms: Vec<Room>) -> RoomGroup {
        RoomGroup {
            name: "expedition".to_string(),
            emoji: String::new(),
            auto_start: false,
            rooms,
            raw: String::new(),
            errors: vec![],
        }
    }

    fn session(group: RoomGroup, replies: Vec<&str>) -> Arc<RoomSession> {
        Arc::new(RoomSession::new(
            group,
            scripted_provider(replies),
            Arc::new(PresetTable::standard()),
        ))
    }

    async fn collect_events(
        session: Arc<RoomSession>,
        text: &str,
    ) -> (Result<()>, Vec<SessionEvent>) {
        let (tx, mut rx) = mpsc::channel(16);
        let sink = SnapshotSink::new(tx);
        let text = text.to_string();
        let handle = tokio::spawn(async move {
            session
                .converse("User", &text, &sink, &CancellationToken::new())
                .await
        });
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (handle.await.unwrap(), events)
    }

    #[tokio::test]
    async fn test_single_cycle_with_terminating_rule() {
        let session = session(
            group(vec![Room {
                name: "base-camp".to_string(),
                agents: vec![agent("Scout")],
                rules: vec![round_robin_rule(true)],
            }]),
            vec!["On my way."],
        );

        let (result, events) = collect_events(Arc::clone(&session), "scout ahead").await;
        result.unwrap();

        let completed = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Completed { reason } => Some(reason.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(completed, [Some("wrap-up".to_string())]);

        // turn_started announcement carries the agent name
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Snapshot(s) if s.turn_started && s.agent.as_deref() == Some("Scout")
        )));
    }

    #[tokio::test]
    async fn test_cycle_cap_ends_without_reason() {
        let session = session(
            group(vec![Room {
                name: "base-camp".to_string(),
                agents: vec![agent("Scout"), agent("Guide")],
                rules: vec![round_robin_rule(false)],
            }]),
            vec!["still going"; MAX_TURN_CYCLES],
        );

        let (result, events) = collect_events(Arc::clone(&session), "never stop").await;
        result.unwrap();

        let started = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Snapshot(s) if s.turn_started))
            .count();
        assert_eq!(started, MAX_TURN_CYCLES);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Completed { reason: None })
        ));
    }

    #[tokio::test]
    async fn test_handoff_switches_room_and_carries_context() {
        let rule_room = Room {
            name: "base-camp".to_string(),
            agents: vec![agent("Scout"), agent("Guide")],
            rules: vec![StrategyRule {
                after_agent: None,
                after_termination: None,
                selection: SelectionKind::Rule(SelectionRuleConfig {
                    instruction: "pick".to_string(),
                    preconditions: vec![],
                    filter_instruction: String::new(),
                    choices: vec![NextChoice {
                        name: "library".to_string(),
                        transfer: None,
                    }],
                }),
                termination: TerminationRule {
                    name: "never".to_string(),
                    finished: false,
                    agents: vec![],
                },
            }],
        };
        let library = Room {
            name: "library".to_string(),
            agents: vec![agent("Archivist")],
            rules: vec![round_robin_rule(true)],
        };
        let session = session(
            group(vec![rule_room, library]),
            vec![r#"{"reason": "needs the archive", "next": "library"}"#],
        );

        let (result, events) = collect_events(Arc::clone(&session), "any maps?").await;
        result.unwrap();

        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::RoomChanged { room, .. } if room == "library"
        )));
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Completed { reason: None })
        ));
        assert_eq!(session.current_room().await, "library");
    }

    #[tokio::test]
    async fn test_room_without_agents_completes_quietly() {
        let session = session(
            group(vec![Room {
                name: "base-camp".to_string(),
                agents: vec![],
                rules: vec![StrategyRule {
                    after_agent: None,
                    after_termination: None,
                    selection: SelectionKind::Rule(SelectionRuleConfig {
                        instruction: "pick".to_string(),
                        preconditions: vec![],
                        filter_instruction: String::new(),
                        choices: vec![],
                    }),
                    termination: TerminationRule {
                        name: "never".to_string(),
                        finished: false,
                        agents: vec![],
                    },
                }],
            }]),
            vec![],
        );

        let (result, events) = collect_events(Arc::clone(&session), "anyone there?").await;
        result.unwrap();
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Completed { reason: None })
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_reports_auto_start() {
        let mut g = group(vec![Room {
            name: "base-camp".to_string(),
            agents: vec![agent("Scout")],
            rules: vec![round_robin_rule(true)],
        }]);
        g.auto_start = true;
        let session = session(g, vec!["hello"]);

        let (result, _) = collect_events(Arc::clone(&session), "hi").await;
        result.unwrap();
        assert!(session.reset().await);
        assert!(session.state.lock().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_current_room_readable_while_turn_holds_the_state() {
        let session = session(
            group(vec![Room {
                name: "base-camp".to_string(),
                agents: vec![agent("Scout")],
                rules: vec![round_robin_rule(true)],
            }]),
            vec![],
        );

        // A turn in flight holds the state mutex end to end; the roster
        // read must still resolve.
        let guard = session.state.lock().await;
        assert_eq!(session.current_room().await, "base-camp");
        drop(guard);
    }

    #[tokio::test]
    async fn test_switch_room_unknown_name() {
        let session = session(
            group(vec![Room {
                name: "base-camp".to_string(),
                agents: vec![agent("Scout")],
                rules: vec![],
            }]),
            vec![],
        );
        assert!(matches!(
            session.switch_room("attic").await.unwrap_err(),
            Error::UnknownRoom(_)
        ));
        assert_eq!(session.switch_room("BASE-CAMP").await.unwrap(), "base-camp");
    }
}
