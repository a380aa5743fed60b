//! Test doubles shared across unit tests

use async_trait::async_trait;
use salon_llm::{
    ChunkReceiver, CompletionRequest, CompletionResponse, InferenceProvider, StreamChunk,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Inference double that replays a fixed list of replies in order.
///
/// Both the blocking and streaming forms consume from the same script;
/// running past the end surfaces an API error, which makes a test that
/// issues an unexpected inference call fail loudly.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }

    fn next_reply(&self) -> salon_llm::Result<String> {
        self.replies
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| salon_llm::Error::Api("scripted replies exhausted".to_string()))
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> salon_llm::Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: self.next_reply()?,
            finish_reason: Some("stop".to_string()),
            model: "scripted".to_string(),
        })
    }

    async fn complete_stream(
        &self,
        _request: CompletionRequest,
    ) -> salon_llm::Result<ChunkReceiver> {
        let reply = self.next_reply()?;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx.send(Ok(StreamChunk::delta(reply))).await;
            let _ = tx.send(Ok(StreamChunk::done(""))).await;
        });
        Ok(rx)
    }
}

/// Shorthand for the common `Arc<dyn InferenceProvider>` shape
pub fn scripted_provider(replies: Vec<&str>) -> Arc<dyn InferenceProvider> {
    Arc::new(ScriptedProvider::new(replies))
}
