//! Room group registry
//!
//! Owns one [`RoomSession`] per loaded group and maps protocol action
//! names onto them: each group answers to its own name (converse) and to
//! `<name>-change-room`.

use crate::engine::RoomSession;
use crate::error::{Error, Result};
use crate::preset::PresetTable;
use crate::rooms::{classify_librarians, LibrarianEntry, RoomLoader};
use salon_llm::{InferenceProvider, RetrievalStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// What a group-scoped action name asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    /// Run a conversation turn
    Converse,
    /// Switch the group's current room
    ChangeRoom,
}

/// Roster entry for one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    /// Display name
    pub name: String,
    /// Emoji shown next to the name
    pub emoji: String,
    /// Whether the agent is backed by a retrieval collection
    pub librarian: bool,
}

/// Roster entry for one room
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    /// Room name
    pub name: String,
    /// Agents in roster order
    pub agents: Vec<AgentInfo>,
}

/// Roster entry for one room group
#[derive(Debug, Clone, Serialize)]
pub struct RoomGroupInfo {
    /// Group name (also its converse action)
    pub name: String,
    /// Group emoji
    pub emoji: String,
    /// Whether the group self-initiates after a reset
    pub auto_start: bool,
    /// Room the conversation is currently in
    pub current_room: String,
    /// Rooms and their agents
    pub rooms: Vec<RoomInfo>,
    /// Text diagram of the group topology
    pub diagram: String,
    /// Original configuration text, for editor clients
    pub raw: String,
    /// Load-time validation errors, for clients to flag
    pub errors: Vec<String>,
}

/// All loaded room groups, keyed by lowercased group name
pub struct RoomRegistry {
    sessions: HashMap<String, Arc<RoomSession>>,
    librarians: HashMap<String, Vec<LibrarianEntry>>,
}

impl RoomRegistry {
    /// Load every group the loader can find and wrap each in a session.
    ///
    /// Librarian classification runs once here; the store is not called
    /// again mid-conversation.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when the rooms directory cannot
    /// be read.
    pub async fn load(
        loader: &RoomLoader,
        provider: Arc<dyn InferenceProvider>,
        presets: Arc<PresetTable>,
        store: &dyn RetrievalStore,
    ) -> Result<Self> {
        let groups = loader.load_all()?;
        let librarians = classify_librarians(&groups, store).await;

        let mut sessions = HashMap::new();
        for group in groups {
            let key = group.name.to_lowercase();
            let session = Arc::new(RoomSession::new(
                group,
                Arc::clone(&provider),
                Arc::clone(&presets),
            ));
            sessions.insert(key, session);
        }
        info!(groups = sessions.len(), "Room registry ready");
        Ok(Self {
            sessions,
            librarians,
        })
    }

    /// Find a session by group name, case-insensitively
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<RoomSession>> {
        self.sessions.get(&name.to_lowercase()).cloned()
    }

    /// Find a session by group name, erroring when absent.
    ///
    /// # Errors
    /// Returns [`Error::UnknownGroup`].
    pub fn require(&self, name: &str) -> Result<Arc<RoomSession>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownGroup(name.to_string()))
    }

    /// Map a protocol action name onto a session and what to do with it.
    ///
    /// `<group>` converses; `<group>-change-room` switches rooms.
    #[must_use]
    pub fn resolve_action(&self, action: &str) -> Option<(Arc<RoomSession>, GroupAction)> {
        if let Some(session) = self.get(action) {
            return Some((session, GroupAction::Converse));
        }
        let base = action.strip_suffix("-change-room")?;
        self.get(base).map(|s| (s, GroupAction::ChangeRoom))
    }

    /// Roster of every loaded group, sorted by name
    pub async fn roster(&self) -> Vec<RoomGroupInfo> {
        let mut infos = Vec::with_capacity(self.sessions.len());
        for session in self.sessions.values() {
            let group = session.group();
            let librarians = self.librarians(&group.name);
            let rooms = group
                .rooms
                .iter()
                .map(|room| RoomInfo {
                    name: room.name.clone(),
                    agents: room
                        .agents
                        .iter()
                        .map(|agent| AgentInfo {
                            name: agent.name.clone(),
                            emoji: agent.emoji.clone(),
                            librarian: librarians
                                .iter()
                                .any(|l| l.room == room.name && l.agent == agent.name),
                        })
                        .collect(),
                })
                .collect();
            infos.push(RoomGroupInfo {
                name: group.name.clone(),
                emoji: group.emoji.clone(),
                auto_start: group.auto_start,
                current_room: session.current_room().await,
                rooms,
                diagram: group.diagram(),
                raw: group.raw.clone(),
                errors: group.errors.clone(),
            });
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Librarian entries for one group (empty when none)
    #[must_use]
    pub fn librarians(&self, group: &str) -> &[LibrarianEntry] {
        self.librarians
            .get(group)
            .map_or(&[], |entries| entries.as_slice())
    }

    /// Librarian roster across all groups
    #[must_use]
    pub fn all_librarians(&self) -> &HashMap<String, Vec<LibrarianEntry>> {
        &self.librarians
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scripted_provider;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct EmptyStore;

    #[async_trait]
    impl RetrievalStore for EmptyStore {
        async fn collection_exists(&self, _name: &str) -> salon_llm::Result<bool> {
            Ok(false)
        }
    }

    async fn registry_from(toml: &str) -> RoomRegistry {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("group.toml"), toml).unwrap();
        RoomRegistry::load(
            &RoomLoader::with_path(dir.path()),
            scripted_provider(vec![]),
            Arc::new(PresetTable::standard()),
            &EmptyStore,
        )
        .await
        .unwrap()
    }

    const GROUP_TOML: &str = r#"
name = "expedition"
emoji = "🏕️"

[[rooms]]
name = "base-camp"

[[rooms.agents]]
name = "Scout"
instructions = "You scout ahead."
collection = "field-notes"
"#;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let registry = registry_from(GROUP_TOML).await;
        assert!(registry.get("Expedition").is_some());
        assert!(matches!(
            registry.require("atlantis").unwrap_err(),
            Error::UnknownGroup(_)
        ));
    }

    #[tokio::test]
    async fn test_resolve_action_names() {
        let registry = registry_from(GROUP_TOML).await;
        let (_, action) = registry.resolve_action("expedition").unwrap();
        assert_eq!(action, GroupAction::Converse);
        let (_, action) = registry.resolve_action("expedition-change-room").unwrap();
        assert_eq!(action, GroupAction::ChangeRoom);
        assert!(registry.resolve_action("atlantis-change-room").is_none());
    }

    #[tokio::test]
    async fn test_roster_marks_inactive_librarians() {
        let registry = registry_from(GROUP_TOML).await;
        let roster = registry.roster().await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].current_room, "base-camp");
        assert!(roster[0].raw.contains("base-camp"));
        // Collection-backed agent shows up in the librarian roster even
        // when the collection is missing, flagged inactive.
        let entries = registry.librarians("expedition");
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].active);
        assert!(roster[0].rooms[0].agents[0].librarian);
    }
}
