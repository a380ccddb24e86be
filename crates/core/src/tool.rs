//! Capability trait and registry — the fixed set of operations the
//! assistant can perform against the world.
//!
//! The capability set is closed: it is assembled once at startup and never
//! extended at runtime. The registry is also the *executor boundary*: every
//! failure mode of a capability (unknown name, bad arguments, execution
//! error, timeout) is folded into a failed [`ToolResult`] inside
//! [`CapabilityRegistry::run`] — no error type crosses it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use crate::error::ToolError;

/// A capability call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the capability to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Convenience accessor for a string argument.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// The outcome of one capability call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the call succeeded
    pub success: bool,

    /// Output folded back into the conversation
    pub output: String,

    /// Failure reason, present when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Path touched by a successful mutating call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_file: Option<String>,
}

impl ToolResult {
    /// A successful result with the given output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            modified_file: None,
        }
    }

    /// A successful mutating result that touched `path`.
    pub fn edited(output: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            modified_file: Some(path.into()),
        }
    }

    /// A failed result with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            output: String::new(),
            error: Some(reason),
            modified_file: None,
        }
    }
}

/// Whether a capability only observes the world or changes it.
///
/// The scheduler fans out `ReadOnly` calls concurrently and fully
/// serializes `Mutating` calls in submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    ReadOnly,
    Mutating,
}

/// A capability description included in the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The capability name
    pub name: String,

    /// Description of what the capability does
    pub description: String,

    /// JSON Schema describing the capability's arguments
    pub parameters: serde_json::Value,
}

/// The core Capability trait.
///
/// Each capability (read_file, write_file, run_command, etc.) implements
/// this trait and is registered in the [`CapabilityRegistry`].
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this capability does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this capability's arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this capability mutates the workspace.
    fn effect(&self) -> Effect;

    /// Execute with validated-enough arguments. Validation failures are
    /// returned as errors; the registry folds them into failed results.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this capability into a definition for prompt building.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The closed registry of capabilities, resolved once at startup.
///
/// Uses a `BTreeMap` so enumeration order (prompt listings, logs) is
/// stable across runs.
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    /// Register a capability. Replaces any existing one with the same name.
    pub fn register(&mut self, capability: Box<dyn Capability>) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, capability);
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.capabilities.get(name).map(|c| c.as_ref())
    }

    /// Whether `name` names a registered capability.
    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// The effect of the named capability. Unknown names count as
    /// read-only: they fail inside `run` without side effects.
    pub fn effect_of(&self, name: &str) -> Effect {
        self.get(name).map_or(Effect::ReadOnly, |c| c.effect())
    }

    /// All capability definitions, in stable name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.capabilities.values().map(|c| c.to_definition()).collect()
    }

    /// All registered capability names, in stable order.
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    /// Execute one invocation within `timeout`.
    ///
    /// This is the executor boundary: unknown capability, invalid
    /// arguments, execution failure, and timeout all come back as a
    /// `ToolResult { success: false, .. }`. This method never errors.
    pub async fn run(&self, invocation: &ToolInvocation, timeout: Duration) -> ToolResult {
        let Some(capability) = self.get(&invocation.name) else {
            return ToolResult::failed(format!(
                "Unknown tool '{}'. Available tools: {}",
                invocation.name,
                self.names().join(", ")
            ));
        };

        let fut = capability.execute(invocation.arguments.clone());
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %invocation.name, error = %e, "Capability call failed");
                ToolResult::failed(e.to_string())
            }
            Err(_) => {
                warn!(tool = %invocation.name, timeout_secs = timeout.as_secs(), "Capability call timed out");
                ToolResult::failed(
                    ToolError::Timeout {
                        tool_name: invocation.name.clone(),
                        timeout_secs: timeout.as_secs(),
                    }
                    .to_string(),
                )
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
