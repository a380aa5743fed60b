//! Ollama - Local Ollama API provider
//!
//! Implements [`InferenceProvider`] against a local Ollama instance. Ollama
//! serves a chat endpoint that supports both a blocking form and a
//! newline-delimited JSON streaming form, which maps directly onto the two
//! completion calls the orchestration engine needs.

use crate::completion::{CompletionRequest, CompletionResponse, StreamChunk};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::{ChunkReceiver, InferenceProvider};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default Ollama model
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default Ollama API URL
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default request timeout
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Channel capacity for streamed chunks
const STREAM_BUFFER: usize = 64;

/// Sanitize API error messages before they reach clients
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("connection refused") || lower.contains("failed to connect") {
        return "Failed to connect to Ollama. Is Ollama running?".to_string();
    }
    if lower.contains("model") && (lower.contains("not found") || lower.contains("pull")) {
        return "Model not available. Pull it first with: ollama pull <model>".to_string();
    }
    if error.len() < 200 {
        return error.to_string();
    }
    "An error occurred talking to Ollama. Please try again.".to_string()
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    message: Option<OllamaResponseMessage>,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

// ============================================================================
// Provider
// ============================================================================

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama API
    pub base_url: String,
    /// Default model name
    pub model: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Local Ollama inference provider
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    /// Returns [`Error::NotConfigured`] when the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::NotConfigured(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OllamaChatRequest {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        let options = if request.temperature.is_some()
            || request.max_tokens.is_some()
            || request.stop.is_some()
        {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                stop: request.stop.clone(),
            })
        } else {
            None
        };

        OllamaChatRequest {
            model,
            messages: request.messages.iter().map(to_ollama_message).collect(),
            options,
            stream,
        }
    }
}

fn to_ollama_message(message: &Message) -> OllamaMessage {
    // Ollama has no author field; prefix named speakers so the model can
    // follow the multi-agent transcript.
    let content = match &message.name {
        Some(name) => format!("{name}: {}", message.content),
        None => message.content.clone(),
    };
    OllamaMessage {
        role: message.role.as_str().to_string(),
        content,
    }
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request(&request, false);
        debug!(model = %body.model, messages = body.messages.len(), "Ollama completion");

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(sanitize_api_error(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "{status}: {}",
                sanitize_api_error(&text)
            )));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        Ok(CompletionResponse {
            content: parsed.message.map(|m| m.content).unwrap_or_default(),
            finish_reason: parsed.done_reason,
            model: parsed.model,
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<ChunkReceiver> {
        let body = self.build_request(&request, true);
        debug!(model = %body.model, "Ollama streaming completion");

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(sanitize_api_error(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "{status}: {}",
                sanitize_api_error(&text)
            )));
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::Network(sanitize_api_error(&e.to_string()))))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // One JSON object per line
                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<OllamaChatResponse>(line) {
                        Ok(parsed) => {
                            let delta =
                                parsed.message.map(|m| m.content).unwrap_or_default();
                            let chunk = if parsed.done {
                                StreamChunk::done(delta)
                            } else {
                                StreamChunk::delta(delta)
                            };
                            let finished = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                // Receiver dropped: stream cancelled
                                return;
                            }
                            if finished {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("Unparseable stream line from Ollama: {e}");
                        }
                    }
                }
            }
            // Body ended without a done marker; close the stream cleanly.
            let _ = tx.send(Ok(StreamChunk::done(""))).await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_build_request_uses_default_model() {
        let provider = OllamaProvider::new(OllamaConfig::default()).unwrap();
        let body = provider.build_request(&CompletionRequest::default(), false);
        assert_eq!(body.model, DEFAULT_MODEL);
        assert!(!body.stream);
        assert!(body.options.is_none());
    }

    #[test]
    fn test_build_request_explicit_model_and_options() {
        let provider = OllamaProvider::new(OllamaConfig::default()).unwrap();
        let request = CompletionRequest::new("mistral").with_temperature(0.2);
        let body = provider.build_request(&request, true);
        assert_eq!(body.model, "mistral");
        assert!(body.stream);
        assert_eq!(body.options.unwrap().temperature, Some(0.2));
    }

    #[test]
    fn test_named_message_prefixed() {
        let msg = to_ollama_message(&Message::assistant("hello").with_name("Scout"));
        assert_eq!(msg.content, "Scout: hello");
        assert_eq!(msg.role, "assistant");
    }

    #[test]
    fn test_sanitize_connection_error() {
        let out = sanitize_api_error("error: Connection refused (os error 111)");
        assert!(out.contains("Is Ollama running"));
    }

    #[test]
    fn test_chat_url_trims_slash() {
        let provider = OllamaProvider::new(OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..OllamaConfig::default()
        })
        .unwrap();
        assert_eq!(provider.chat_url(), "http://localhost:11434/api/chat");
    }
}
