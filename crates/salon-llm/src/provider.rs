//! Inference provider trait and shared text helpers

use crate::completion::{CompletionRequest, CompletionResponse, StreamChunk};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receiver side of a streaming completion
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk>>;

/// Trait for inference backends
///
/// Implementations must be `Send + Sync` so they can be shared across room
/// sessions behind an `Arc`.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Complete a conversation (blocking form)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Complete a conversation, streaming incremental chunks
    ///
    /// The returned channel yields text deltas and terminates with a chunk
    /// whose `done` flag is set. Dropping the receiver cancels the stream.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<ChunkReceiver>;
}

/// Split an embedded thinking section from a model answer.
///
/// Some models prefix their visible answer with a `<think>...</think>`
/// block. Decision parsing and anything shown as the final answer must only
/// see the text after that block; the block itself is surfaced separately
/// as rationale. Returns `(thinking, visible)`.
#[must_use]
pub fn split_thinking(text: &str) -> (Option<String>, String) {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let Some(start) = text.find(OPEN) else {
        return (None, text.to_string());
    };
    let after_open = &text[start + OPEN.len()..];
    let Some(end) = after_open.find(CLOSE) else {
        // Unterminated block: treat everything after the marker as thinking
        return (
            Some(after_open.trim().to_string()),
            text[..start].trim().to_string(),
        );
    };

    let thinking = after_open[..end].trim().to_string();
    let mut visible = String::new();
    visible.push_str(&text[..start]);
    visible.push_str(&after_open[end + CLOSE.len()..]);
    let thinking = if thinking.is_empty() {
        None
    } else {
        Some(thinking)
    };
    (thinking, visible.trim().to_string())
}
