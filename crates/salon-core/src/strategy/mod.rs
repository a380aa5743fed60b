//! Selection and termination strategies
//!
//! Strategy variants are trait objects chosen per-call through a rule
//! lookup table built from room configuration, keeping new kinds
//! pluggable without touching the orchestration loop.

pub(crate) mod pipeline;
mod round_robin;
mod rule_based;
mod termination;

pub use round_robin::RoundRobinSelection;
pub use rule_based::RuleBasedSelection;
pub use termination::ConstantTermination;

use crate::error::Result;
use crate::events::SnapshotSink;
use crate::history::History;
use crate::preset::PresetTable;
use crate::rooms::{AgentDef, Room, SelectionKind, TerminationRule};
use crate::snapshot::TurnSnapshotBuilder;
use async_trait::async_trait;
use salon_llm::InferenceProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Inputs available to a selection call
pub struct SelectionContext<'a> {
    /// Agents of the current room, roster order
    pub agents: &'a [AgentDef],
    /// Conversation history so far
    pub history: &'a History,
}

/// Outcome of a selection call
#[derive(Debug, Clone)]
pub enum Selection {
    /// A concrete agent acts next
    Agent(AgentDef),
    /// Hand the conversation off to another room in the group
    Handoff {
        /// Target room name
        room: String,
        /// Carried context (possibly empty)
        context: String,
    },
    /// Nothing to select; the local cycle ends
    Stop,
}

/// Decides which agent acts next, streaming progress through the sink
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    /// Strategy name for logs and snapshots
    fn name(&self) -> &str;

    /// Run one selection.
    ///
    /// May emit intermediate snapshots via `builder` + `sink` before
    /// resolving. Must honor `cancel` at every await.
    async fn select(
        &self,
        ctx: SelectionContext<'_>,
        builder: &mut TurnSnapshotBuilder,
        sink: &SnapshotSink,
        cancel: &CancellationToken,
    ) -> Result<Selection>;
}

/// Decides, after an agent's turn, whether the conversation is finished
pub trait TerminationStrategy: Send + Sync {
    /// Name recorded as the last termination reason
    fn name(&self) -> &str;

    /// True when the conversation should end after `acting_agent`'s turn
    fn should_end(&self, history: &History, acting_agent: &str) -> bool;
}

/// Strategy pair applied for one cycle
#[derive(Clone)]
pub struct StrategyPair {
    /// Selection variant
    pub selection: Arc<dyn SelectionStrategy>,
    /// Termination variant
    pub termination: Arc<dyn TerminationStrategy>,
}

struct TableEntry {
    after_agent: Option<String>,
    after_termination: Option<String>,
    pair: StrategyPair,
}

/// Data-driven strategy lookup, built once per room from its rules.
///
/// Stateful strategies (the round-robin cursor) live inside the table's
/// pairs, so their state persists across cycles.
pub struct StrategyTable {
    entries: Vec<TableEntry>,
    default_pair: StrategyPair,
}

impl StrategyTable {
    /// Build the table from a room's configured rules
    #[must_use]
    pub fn from_room(
        room: &Room,
        provider: Arc<dyn InferenceProvider>,
        presets: Arc<PresetTable>,
    ) -> Self {
        let mut entries = Vec::new();
        let mut default_pair = None;

        for rule in &room.rules {
            let selection: Arc<dyn SelectionStrategy> = match &rule.selection {
                SelectionKind::RoundRobin => {
                    Arc::new(RoundRobinSelection::new(room.agents.clone()))
                }
                SelectionKind::Rule(config) => Arc::new(RuleBasedSelection::new(
                    config.clone(),
                    Arc::clone(&provider),
                    Arc::clone(&presets),
                )),
            };
            let pair = StrategyPair {
                selection,
                termination: Arc::new(ConstantTermination::from_rule(&rule.termination)),
            };

            if rule.after_agent.is_none() && rule.after_termination.is_none() {
                if default_pair.is_none() {
                    default_pair = Some(pair);
                }
            } else {
                entries.push(TableEntry {
                    after_agent: rule.after_agent.clone(),
                    after_termination: rule.after_termination.clone(),
                    pair,
                });
            }
        }

        let default_pair = default_pair.unwrap_or_else(|| StrategyPair {
            selection: Arc::new(RoundRobinSelection::new(room.agents.clone())),
            termination: Arc::new(ConstantTermination::from_rule(&TerminationRule {
                name: "never".to_string(),
                finished: false,
                agents: vec![],
            })),
        });

        Self {
            entries,
            default_pair,
        }
    }

    /// Strategy pair for the next cycle, keyed on the previous agent and
    /// the last termination reason. First matching entry wins; entries
    /// with no match fall through to the default.
    #[must_use]
    pub fn lookup(
        &self,
        prev_agent: Option<&str>,
        last_termination: Option<&str>,
    ) -> &StrategyPair {
        for entry in &self.entries {
            let agent_ok = entry.after_agent.as_deref().is_none_or(|want| {
                prev_agent.is_some_and(|got| got.eq_ignore_ascii_case(want))
            });
            let termination_ok = entry.after_termination.as_deref().is_none_or(|want| {
                last_termination.is_some_and(|got| got.eq_ignore_ascii_case(want))
            });
            if agent_ok && termination_ok {
                return &entry.pair;
            }
        }
        &self.default_pair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::{SelectionRuleConfig, StrategyRule};
    use crate::testing::scripted_provider;

    fn agent(name: &str) -> AgentDef {
        AgentDef {
            name: name.to_string(),
            emoji: String::new(),
            instructions: format!("You are {name}."),
            collection: None,
        }
    }

    fn room_with_rules(rules: Vec<StrategyRule>) -> Room {
        Room {
            name: "hall".to_string(),
            agents: vec![agent("Scout"), agent("Guide")],
            rules,
        }
    }

    fn rule(
        after_agent: Option<&str>,
        after_termination: Option<&str>,
        termination_name: &str,
    ) -> StrategyRule {
        StrategyRule {
            after_agent: after_agent.map(String::from),
            after_termination: after_termination.map(String::from),
            selection: SelectionKind::Rule(SelectionRuleConfig {
                instruction: "pick".to_string(),
                preconditions: vec![],
                filter_instruction: String::new(),
                choices: vec![],
            }),
            termination: TerminationRule {
                name: termination_name.to_string(),
                finished: false,
                agents: vec![],
            },
        }
    }

    #[test]
    fn test_lookup_prefers_matching_entry() {
        let room = room_with_rules(vec![
            rule(Some("Scout"), None, "after-scout"),
            rule(None, Some("wrap-up"), "after-wrap-up"),
            rule(None, None, "default"),
        ]);
        let table = StrategyTable::from_room(
            &room,
            scripted_provider(vec![]),
            Arc::new(PresetTable::standard()),
        );

        assert_eq!(
            table.lookup(Some("scout"), None).termination.name(),
            "after-scout"
        );
        assert_eq!(
            table.lookup(Some("Guide"), Some("wrap-up")).termination.name(),
            "after-wrap-up"
        );
        assert_eq!(table.lookup(None, None).termination.name(), "default");
    }

    #[test]
    fn test_lookup_without_rules_falls_back_to_round_robin() {
        let room = room_with_rules(vec![]);
        let table = StrategyTable::from_room(
            &room,
            scripted_provider(vec![]),
            Arc::new(PresetTable::standard()),
        );
        let pair = table.lookup(None, None);
        assert_eq!(pair.selection.name(), "round-robin");
        assert_eq!(pair.termination.name(), "never");
    }

    #[test]
    fn test_conditioned_entry_requires_state() {
        let room = room_with_rules(vec![
            rule(Some("Scout"), Some("wrap-up"), "both"),
            rule(None, None, "default"),
        ]);
        let table = StrategyTable::from_room(
            &room,
            scripted_provider(vec![]),
            Arc::new(PresetTable::standard()),
        );

        // Only one condition satisfied: falls through to the default.
        assert_eq!(table.lookup(Some("Scout"), None).termination.name(), "default");
        assert_eq!(
            table
                .lookup(Some("Scout"), Some("wrap-up"))
                .termination
                .name(),
            "both"
        );
    }
}
