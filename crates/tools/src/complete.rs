//! The `complete` pseudo-capability.
//!
//! Registered so it appears in the prompt's capability listing, but the
//! orchestration loop intercepts invocations of it before scheduling and
//! transitions to Completed. `execute` only runs if something calls it
//! directly, in which case it echoes the summary.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};

pub struct CompleteTool;

#[async_trait]
impl Capability for CompleteTool {
    fn name(&self) -> &str {
        "complete"
    }

    fn description(&self) -> &str {
        "Declare the task finished. Pass a `summary` of what was done. Call this exactly once, when no further tool calls are needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string", "description": "What was accomplished" }
            },
            "required": ["summary"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let summary = arguments["summary"].as_str().unwrap_or("Task complete");
        Ok(ToolResult::ok(summary))
    }
}
