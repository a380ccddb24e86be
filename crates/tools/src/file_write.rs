//! Write file capability — create or overwrite files with content
//! validation and pre-overwrite backups.
//!
//! Content that is too short or is only a placeholder (bare ellipsis,
//! TODO-only body) is rejected before any disk write: models sometimes emit
//! stub bodies and a rejected call with a clear reason recovers better than
//! a clobbered file. Existing targets are snapshotted to
//! `<basename>.<unix-millis>.bak` in the backup directory first.

use async_trait::async_trait;
use chrono::Utc;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Content shorter than this is assumed to be a truncated model response.
const MIN_CONTENT_BYTES: usize = 8;

pub struct WriteFileTool {
    backup_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(backup_dir: PathBuf) -> Self {
        Self { backup_dir }
    }

    /// Reject bodies that are clearly placeholders rather than real content.
    fn is_placeholder(content: &str) -> bool {
        let trimmed = content.trim();
        if trimmed.chars().all(|c| c == '.' || c == '…' || c.is_whitespace()) {
            return true;
        }
        let lower = trimmed.to_lowercase();
        let without_markers: String = lower
            .replace("todo", "")
            .replace("fixme", "")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        (lower.contains("todo") || lower.contains("fixme")) && without_markers.len() < 12
    }

    /// Snapshot `target` into the backup directory before overwriting.
    async fn backup(&self, target: &Path) -> Result<PathBuf, std::io::Error> {
        tokio::fs::create_dir_all(&self.backup_dir).await?;
        let basename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".into());
        let backup_path = self
            .backup_dir
            .join(format!("{basename}.{}.bak", Utc::now().timestamp_millis()));
        tokio::fs::copy(target, &backup_path).await?;
        Ok(backup_path)
    }
}

#[async_trait]
impl Capability for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file (and parent directories) if absent, overwrites if present. Existing files are backed up first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to write to" },
                "content": { "type": "string", "description": "The complete file content" }
            },
            "required": ["path", "content"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::Mutating
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        if content.trim().len() < MIN_CONTENT_BYTES {
            return Err(ToolError::ValidationFailed {
                tool_name: "write_file".into(),
                reason: format!(
                    "content is {} bytes, below the {MIN_CONTENT_BYTES} byte minimum — provide the full file body",
                    content.trim().len()
                ),
            });
        }

        if Self::is_placeholder(content) {
            return Err(ToolError::ValidationFailed {
                tool_name: "write_file".into(),
                reason: "content looks like a placeholder (ellipsis or TODO-only body) — provide the real file content".into(),
            });
        }

        let target = Path::new(path);

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Ok(ToolResult::failed(format!(
                        "Failed to create parent directory: {e}"
                    )));
                }
            }
        }

        let mut note = String::new();
        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            match self.backup(target).await {
                Ok(backup_path) => {
                    debug!(path, backup = %backup_path.display(), "Backed up before overwrite");
                    note = format!(" (previous version backed up to {})", backup_path.display());
                }
                Err(e) => {
                    return Ok(ToolResult::failed(format!(
                        "Refusing to overwrite '{path}': backup failed: {e}"
                    )));
                }
            }
        }

        match tokio::fs::write(target, content).await {
            Ok(()) => Ok(ToolResult::edited(
                format!("Wrote {} bytes to {path}{note}", content.len()),
                path,
            )),
            Err(e) => Ok(ToolResult::failed(format!("Failed to write '{path}': {e}"))),
        }
    }
}
