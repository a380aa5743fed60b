//! Room topology
//!
//! Room groups are loaded once at startup from TOML documents and are
//! immutable thereafter; only the conversation state they wrap changes.

mod domain;
mod loader;

pub use domain::{
    AgentDef, NextChoice, Room, RoomGroup, SelectionKind, SelectionRuleConfig, StrategyRule,
    TerminationRule, TransferRuleConfig,
};
pub use loader::{classify_librarians, LibrarianEntry, RoomLoader};
