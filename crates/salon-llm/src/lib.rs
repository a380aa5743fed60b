//! Salon LLM - Inference Provider Abstraction
//!
//! This crate provides the inference boundary for Salon:
//! - Provider: `InferenceProvider` trait (blocking and streaming completion)
//! - Ollama: local Ollama provider (OpenAI-compatible chat endpoint)
//! - Decision: tolerant parsing of selection decisions from model output
//! - Retrieval: `RetrievalStore` collection-existence interface

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod decision;
pub mod error;
pub mod message;
pub mod ollama;
pub mod provider;
pub mod retrieval;

pub use completion::{CompletionRequest, CompletionResponse, StreamChunk};
pub use decision::{extract_decision, Decision};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use provider::{split_thinking, ChunkReceiver, InferenceProvider};
pub use retrieval::{HttpRetrievalStore, RetrievalStore};
