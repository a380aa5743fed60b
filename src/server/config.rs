//! Server configuration
//!
//! Loaded from a TOML file; every section has workable defaults so the
//! server starts with no file at all against a local Ollama.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Room definitions location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    #[serde(default = "default_rooms_dir")]
    pub dir: String,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            dir: default_rooms_dir(),
        }
    }
}

/// Inference backend (Ollama-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_inference_timeout")]
    pub timeout_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_inference_url(),
            model: default_model(),
            timeout_ms: default_inference_timeout(),
        }
    }
}

/// Retrieval store used for librarian classification at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_retrieval_url")]
    pub base_url: String,
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_retrieval_url(),
            timeout_ms: default_retrieval_timeout(),
        }
    }
}

/// Optional text-to-speech collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_speech_url")]
    pub base_url: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_speech_url(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_rooms_dir() -> String {
    "config/rooms".to_string()
}

fn default_inference_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_inference_timeout() -> u64 {
    120_000
}

fn default_retrieval_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_retrieval_timeout() -> u64 {
    5_000
}

fn default_speech_url() -> String {
    "http://localhost:5002".to_string()
}

impl AppConfig {
    /// Load configuration, falling back to defaults when the file is
    /// missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No configuration file at {path:?}, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {path:?}"))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse configuration {path:?}"))
    }
}

/// Write a default configuration file, refusing to clobber an existing one
pub fn init(path: &Path) -> Result<()> {
    anyhow::ensure!(!path.exists(), "{path:?} already exists");
    let rendered =
        toml::to_string_pretty(&AppConfig::default()).context("failed to render configuration")?;
    std::fs::write(path, rendered)
        .with_context(|| format!("failed to write configuration {path:?}"))?;
    info!("Wrote default configuration to {path:?}");
    Ok(())
}
