//! Wire protocol
//!
//! Every frame, inbound or outbound, is one JSON envelope. Outbound
//! message families extend the base envelope with optional payload
//! fields that stay off the wire when unused.

use salon_core::registry::RoomGroupInfo;
use salon_core::rooms::LibrarianEntry;
use salon_core::TurnSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base message envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Originating user
    #[serde(default)]
    pub user_id: String,
    /// Client transaction id, echoed back on replies
    #[serde(default)]
    pub txn_id: String,
    /// Command or message family
    #[serde(default)]
    pub action: String,
    /// Command qualifier
    #[serde(default)]
    pub sub_action: String,
    /// Free-text payload
    #[serde(default)]
    pub content: String,
    /// Room group name
    #[serde(default)]
    pub room: String,
    /// Room within the group
    #[serde(default)]
    pub sub_room: String,

    /// Speaking agent, on reply frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Turn progress, on snapshot frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<TurnSnapshot>,
    /// Group roster, on `rooms get` replies
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<RoomGroupInfo>>,
    /// Librarian roster, on `librarians` replies
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub librarians: Option<HashMap<String, Vec<LibrarianEntry>>>,
    /// Base64 audio payload, on audio-chunk frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Why an inbound frame was rejected before dispatch
#[derive(Debug)]
pub enum ProtocolError {
    /// Not valid JSON for the envelope shape
    Malformed(String),
    /// Valid JSON with no action to dispatch on
    MissingAction,
}

impl ProtocolError {
    /// Human-readable content for the error reply
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Malformed(detail) => format!("malformed JSON frame: {detail}"),
            Self::MissingAction => "frame has no action".to_string(),
        }
    }
}

impl Envelope {
    /// Parse one inbound frame.
    ///
    /// # Errors
    /// [`ProtocolError::Malformed`] for JSON problems,
    /// [`ProtocolError::MissingAction`] for an empty action.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Self =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        if envelope.action.trim().is_empty() {
            return Err(ProtocolError::MissingAction);
        }
        Ok(envelope)
    }

    /// Start a reply to this frame, keeping its routing fields
    #[must_use]
    pub fn reply(&self, action: impl Into<String>) -> Self {
        Self {
            user_id: self.user_id.clone(),
            txn_id: self.txn_id.clone(),
            action: action.into(),
            room: self.room.clone(),
            sub_room: self.sub_room.clone(),
            ..Self::default()
        }
    }

    /// Error reply naming this frame's action as the failing one
    #[must_use]
    pub fn error_reply(&self, message: impl Into<String>) -> Self {
        let mut reply = self.reply("error");
        reply.sub_action = self.action.clone();
        reply.content = message.into();
        reply
    }

    /// Set the qualifier
    #[must_use]
    pub fn with_sub_action(mut self, sub_action: impl Into<String>) -> Self {
        self.sub_action = sub_action.into();
        self
    }

    /// Set the payload text
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Serialize for the wire
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Error reply for frames rejected before an action was known
#[must_use]
pub fn protocol_error(error: &ProtocolError) -> Envelope {
    Envelope {
        action: "error".to_string(),
        content: error.message(),
        ..Envelope::default()
    }
}
