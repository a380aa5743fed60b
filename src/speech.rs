//! Text-to-speech collaborator
//!
//! Optional: when disabled or failing, synthesis yields nothing and the
//! conversation flow is unaffected.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::server::config::SpeechConfig;

/// Turns agent text into audio bytes
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Synthesize speech for the given text. `None` means no audio, for
    /// any reason; callers must not treat that as an error.
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>>;
}

/// Disabled speech: always silent
pub struct NoopSpeech;

#[async_trait]
impl SpeechService for NoopSpeech {
    async fn synthesize(&self, _text: &str) -> Option<Vec<u8>> {
        None
    }
}

/// HTTP speech backend
pub struct HttpSpeechService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpeechService {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        let url = format!("{}/api/tts", self.base_url.trim_end_matches('/'));
        let response = match self
            .client
            .post(&url)
            .json(&json!({ "text": text }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Speech synthesis request failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Speech backend rejected synthesis");
            return None;
        }
        match response.bytes().await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "Synthesized speech");
                Some(bytes.to_vec())
            }
            Err(e) => {
                warn!("Speech synthesis body read failed: {e}");
                None
            }
        }
    }
}

/// Build the speech service the configuration asks for
pub fn from_config(config: &SpeechConfig) -> Arc<dyn SpeechService> {
    if config.enabled {
        Arc::new(HttpSpeechService::new(config.base_url.clone()))
    } else {
        Arc::new(NoopSpeech)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_is_silent() {
        assert!(NoopSpeech.synthesize("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades_to_silence() {
        let service = HttpSpeechService::new("http://127.0.0.1:1");
        assert!(service.synthesize("hello").await.is_none());
    }
}
