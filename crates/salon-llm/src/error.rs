//! Error types for salon-llm

use thiserror::Error;

/// Inference error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error
    #[error("api error: {0}")]
    Api(String),

    /// Invalid response from the model
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Retrieval store error
    #[error("retrieval error: {0}")]
    Retrieval(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
