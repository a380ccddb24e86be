//! # CodeQuill Core
//!
//! Domain types, traits, and error definitions for the CodeQuill coding
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM endpoint, embedding endpoint, host
//! editor, front end) is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod host;
pub mod message;
pub mod outcome;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, ToolError};
pub use host::{EditorContext, HostHooks, NoopHooks};
pub use message::{Conversation, Message, Role};
pub use outcome::RunOutcome;
pub use provider::{CompletionRequest, Embedder, ModelProvider};
pub use tool::{
    Capability, CapabilityRegistry, Effect, ToolDefinition, ToolInvocation, ToolResult,
};
