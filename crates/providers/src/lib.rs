//! Provider implementations for CodeQuill.
//!
//! A single OpenAI-compatible client covers the vast majority of backends
//! (OpenAI, OpenRouter, Ollama, vLLM, Together, Fireworks) for both chat
//! completions and embeddings.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
