//! Core orchestration for Salon: multi-agent conversation rooms.
//!
//! A [`rooms::RoomGroup`] describes rooms, agents, and strategy rules;
//! an [`engine::RoomSession`] runs its turn loop, choosing agents via
//! [`strategy`] variants, streaming progress as [`snapshot`] values, and
//! handing off between rooms with optional context [`transfer`]. The
//! [`registry::RoomRegistry`] maps protocol actions onto sessions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod preset;
pub mod registry;
pub mod rooms;
pub mod snapshot;
pub mod strategy;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{RoomSession, MAX_TURN_CYCLES};
pub use error::{Error, Result};
pub use events::{SessionEvent, SnapshotSink};
pub use history::History;
pub use preset::{Opinion, PresetTable};
pub use registry::{GroupAction, RoomGroupInfo, RoomRegistry};
pub use rooms::{LibrarianEntry, RoomGroup, RoomLoader};
pub use snapshot::{Phase, TurnSnapshot, TurnSnapshotBuilder};
