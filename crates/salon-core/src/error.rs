//! Error types for salon-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (room documents, presets, strategy rules)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Selection failed (empty round-robin list, unrecognized decision name)
    #[error("selection error: {0}")]
    Selection(String),

    /// Room group is not loaded
    #[error("unknown room group: {0}")]
    UnknownGroup(String),

    /// Room is not part of the group
    #[error("unknown room: {0}")]
    UnknownRoom(String),

    /// Inference provider error
    #[error("inference error: {0}")]
    Inference(#[from] salon_llm::Error),

    /// Turn was cancelled cooperatively
    #[error("cancelled")]
    Cancelled,

    /// Internal error (channel closed, serialization, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
