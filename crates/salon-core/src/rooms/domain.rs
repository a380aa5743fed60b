//! Room group domain objects (loaded from TOML)

use serde::{Deserialize, Serialize};

/// A configured agent. Value object; selected, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    /// Display name
    pub name: String,
    /// Emoji shown next to the name
    #[serde(default)]
    pub emoji: String,
    /// Instruction / prompt template for this agent
    pub instructions: String,
    /// Retrieval collection backing this agent (makes it a librarian)
    #[serde(default)]
    pub collection: Option<String>,
}

/// Configuration of the rule-driven selection pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRuleConfig {
    /// Decision instruction embedded in the decision prompt
    pub instruction: String,
    /// Precondition presets matched against the current agent names
    #[serde(default)]
    pub preconditions: Vec<String>,
    /// Natural-language instruction for the history filter step
    #[serde(default)]
    pub filter_instruction: String,
    /// Candidate agent/room names offered to the decision call
    #[serde(default)]
    pub choices: Vec<NextChoice>,
}

/// One candidate name the decision call may answer with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextChoice {
    /// Agent or room name
    pub name: String,
    /// Context-transfer rule applied when this choice is a room handoff
    #[serde(default)]
    pub transfer: Option<TransferRuleConfig>,
}

/// Rule for computing carried context at room-handoff time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRuleConfig {
    /// Fast preset: when it affirms the target name, hand off immediately
    /// with the fixed marker context and no inference call
    #[serde(default)]
    pub skip_preset: Option<String>,
    /// Decision instruction for computing the carried context
    #[serde(default)]
    pub instruction: String,
    /// Precondition presets for the filter step
    #[serde(default)]
    pub preconditions: Vec<String>,
    /// Natural-language filter instruction
    #[serde(default)]
    pub filter_instruction: String,
}

/// How the next agent is chosen under a strategy rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionKind {
    /// Fixed rotation over the room's agent list
    RoundRobin,
    /// Rule-driven filter + decision pipeline
    Rule(SelectionRuleConfig),
}

/// When a termination strategy fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminationRule {
    /// Name recorded as the last termination reason
    pub name: String,
    /// Fixed boolean this strategy returns
    #[serde(default)]
    pub finished: bool,
    /// Allow-list of acting agents; empty means any agent can trigger it
    #[serde(default)]
    pub agents: Vec<String>,
}

/// One data-driven strategy table entry.
///
/// Matched against the previous agent and the last termination reason; a
/// rule with neither condition is the default entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRule {
    /// Applies only after this agent acted
    #[serde(default)]
    pub after_agent: Option<String>,
    /// Applies only after this termination reason
    #[serde(default)]
    pub after_termination: Option<String>,
    /// Selection variant for this entry
    pub selection: SelectionKind,
    /// Termination variant for this entry
    pub termination: TerminationRule,
}

/// Named collection of agents that can be switched to within a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Room name
    pub name: String,
    /// Ordered agent roster
    #[serde(default)]
    pub agents: Vec<AgentDef>,
    /// Strategy table entries, first match wins
    #[serde(default)]
    pub rules: Vec<StrategyRule>,
}

impl Room {
    /// Current agent names, in roster order
    #[must_use]
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// Find an agent by name, case-insensitively
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentDef> {
        self.agents
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// A named, independently orchestrated multi-agent conversation unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomGroup {
    /// Group name (also its protocol action name)
    pub name: String,
    /// Emoji shown in rosters
    #[serde(default)]
    pub emoji: String,
    /// Self-initiate a conversation after reset
    #[serde(default)]
    pub auto_start: bool,
    /// Rooms, first one is the initial room
    #[serde(default)]
    pub rooms: Vec<Room>,
    /// Original configuration text (filled by the loader)
    #[serde(skip)]
    pub raw: String,
    /// Load-time validation errors (filled by the loader)
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl RoomGroup {
    /// Find a room by name, case-insensitively
    #[must_use]
    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Rendering-friendly text diagram of the group topology
    #[must_use]
    pub fn diagram(&self) -> String {
        let mut lines = vec![format!("{} {}", self.emoji, self.name).trim().to_string()];
        for room in &self.rooms {
            let agents = room
                .agents
                .iter()
                .map(|a| format!("{} {}", a.emoji, a.name).trim().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("  [{}] {}", room.name, agents));
            for rule in &room.rules {
                if let SelectionKind::Rule(config) = &rule.selection {
                    for choice in &config.choices {
                        if self.room(&choice.name).is_some() {
                            lines.push(format!("  [{}] -> [{}]", room.name, choice.name));
                        }
                    }
                }
            }
        }
        lines.join("\n")
    }
}
