//! Read file capability — read file contents with size and type checks.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};

/// Files larger than this are rejected rather than folded into the prompt.
const MAX_FILE_BYTES: u64 = 256 * 1024;

pub struct ReadFileTool {
    max_bytes: u64,
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_FILE_BYTES,
        }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to read" }
            },
            "required": ["path"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) => return Ok(ToolResult::failed(format!("Cannot read '{path}': {e}"))),
        };

        if metadata.is_dir() {
            return Ok(ToolResult::failed(format!(
                "'{path}' is a directory, use list_directory instead"
            )));
        }

        if metadata.len() > self.max_bytes {
            return Ok(ToolResult::failed(format!(
                "'{path}' is {} bytes, above the {} byte ceiling",
                metadata.len(),
                self.max_bytes
            )));
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Ok(ToolResult::failed(format!("Failed to read '{path}': {e}"))),
        }
    }
}
