//! Room group TOML loader
//!
//! Loads every `*.toml` document from the rooms directory. Validation
//! problems do not fail the load: they are collected into the group's
//! error list and surfaced through the roster query so clients can flag
//! the group.

use super::domain::{RoomGroup, SelectionKind};
use crate::error::{Error, Result};
use crate::preset;
use salon_llm::RetrievalStore;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default room configuration directory
const DEFAULT_ROOMS_DIR: &str = "config/rooms";

/// A retrieval-capable agent discovered at load time
#[derive(Debug, Clone, Serialize)]
pub struct LibrarianEntry {
    /// Room the agent belongs to
    pub room: String,
    /// Agent display name
    pub agent: String,
    /// Collection name it references
    pub collection: String,
    /// Whether the collection exists in the retrieval store
    pub active: bool,
}

/// Room group TOML loader
#[derive(Debug)]
pub struct RoomLoader {
    config_dir: PathBuf,
}

impl RoomLoader {
    /// Create loader with the default path (`config/rooms/`)
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_ROOMS_DIR),
        }
    }

    /// Create loader with a custom path
    #[must_use]
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_dir: path.as_ref().to_path_buf(),
        }
    }

    /// Return the configuration directory path
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load all room groups.
    ///
    /// Unparseable files are warned and skipped; groups that parse but
    /// fail validation still load, carrying their error list.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when the directory cannot be read.
    pub fn load_all(&self) -> Result<Vec<RoomGroup>> {
        let mut groups = Vec::new();

        if !self.config_dir.exists() {
            warn!("Rooms directory not found: {:?}", self.config_dir);
            return Ok(groups);
        }

        let entries = std::fs::read_dir(&self.config_dir).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read rooms directory {:?}: {}",
                self.config_dir, e
            ))
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !Self::is_toml_file(&path) {
                continue;
            }
            match Self::load_file(&path) {
                Ok(group) => {
                    info!(
                        group = %group.name,
                        rooms = group.rooms.len(),
                        errors = group.errors.len(),
                        "Loaded room group"
                    );
                    groups.push(group);
                }
                Err(e) => {
                    warn!("Failed to load {:?}: {}", path, e);
                }
            }
        }

        groups.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Loaded {} room groups from {:?}", groups.len(), self.config_dir);
        Ok(groups)
    }

    fn load_file(path: &Path) -> Result<RoomGroup> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read {path:?}: {e}")))?;

        let mut group: RoomGroup = toml::from_str(&raw)
            .map_err(|e| Error::Configuration(format!("Failed to parse {path:?}: {e}")))?;
        group.raw = raw;
        group.errors = validate_group(&group);
        Ok(group)
    }

    fn is_toml_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "toml")
    }
}

impl Default for RoomLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect validation errors for a parsed group (configuration-time lint)
fn validate_group(group: &RoomGroup) -> Vec<String> {
    let mut errors = Vec::new();

    if group.rooms.is_empty() {
        errors.push("group has no rooms".to_string());
    }

    for room in &group.rooms {
        if room.agents.is_empty() {
            errors.push(format!("room '{}' has no agents", room.name));
        }
        let mut seen = Vec::new();
        for agent in &room.agents {
            let lower = agent.name.to_lowercase();
            if seen.contains(&lower) {
                errors.push(format!(
                    "room '{}' has duplicate agent '{}'",
                    room.name, agent.name
                ));
            }
            seen.push(lower);
        }

        for rule in &room.rules {
            let SelectionKind::Rule(config) = &rule.selection else {
                continue;
            };
            for p in &config.preconditions {
                if let Err(e) = preset::validate(p) {
                    errors.push(format!("room '{}': {}", room.name, e));
                }
            }
            for choice in &config.choices {
                let Some(transfer) = &choice.transfer else {
                    continue;
                };
                if let Some(skip) = &transfer.skip_preset {
                    if let Err(e) = preset::validate(skip) {
                        errors.push(format!(
                            "room '{}' choice '{}': {}",
                            room.name, choice.name, e
                        ));
                    }
                }
                for p in &transfer.preconditions {
                    if let Err(e) = preset::validate(p) {
                        errors.push(format!(
                            "room '{}' choice '{}': {}",
                            room.name, choice.name, e
                        ));
                    }
                }
            }
        }
    }

    errors
}

/// Classify retrieval-backed agents as active/inactive librarians.
///
/// Runs once at load time; a store failure marks the entry inactive
/// instead of failing the load.
pub async fn classify_librarians(
    groups: &[RoomGroup],
    store: &dyn RetrievalStore,
) -> HashMap<String, Vec<LibrarianEntry>> {
    let mut roster: HashMap<String, Vec<LibrarianEntry>> = HashMap::new();

    for group in groups {
        let mut entries = Vec::new();
        for room in &group.rooms {
            for agent in &room.agents {
                let Some(collection) = &agent.collection else {
                    continue;
                };
                let active = match store.collection_exists(collection).await {
                    Ok(exists) => exists,
                    Err(e) => {
                        warn!(
                            agent = %agent.name,
                            collection = %collection,
                            "Librarian classification failed: {e}"
                        );
                        false
                    }
                };
                entries.push(LibrarianEntry {
                    room: room.name.clone(),
                    agent: agent.name.clone(),
                    collection: collection.clone(),
                    active,
                });
            }
        }
        roster.insert(group.name.clone(), entries);
    }

    roster
}
