//! Provider traits — the abstractions over the model inference and
//! embedding endpoints.
//!
//! The orchestration loop calls `complete()` without knowing which backend
//! is behind it; the memory store does the same with `embed()`. Both are
//! asynchronous suspension points.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// A request for one model completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "gpt-4o", "qwen2.5-coder")
    pub model: String,

    /// The ordered conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// The model inference endpoint.
///
/// Responses are free text; any tool calls ride inside it and are
/// recovered by the response parser.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get the complete response text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<String, ProviderError>;
}

/// The embedding endpoint.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate a fixed-length vector for the given text.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}
