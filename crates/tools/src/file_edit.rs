//! Edit file capability — search-and-replace with a whitespace-normalized
//! fallback match.
//!
//! Models frequently reproduce the search text with slightly different
//! indentation or line wrapping. Before failing, the search text is retried
//! with every whitespace run collapsed on both sides; on a unique fallback
//! hit the corresponding original span is replaced. The target is
//! snapshotted to a timestamped backup before the rewrite, the same way
//! `write_file` backs up overwrites.

use async_trait::async_trait;
use chrono::Utc;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct EditFileTool {
    backup_dir: PathBuf,
}

impl EditFileTool {
    pub fn new(backup_dir: PathBuf) -> Self {
        Self { backup_dir }
    }

    /// Find `search` in `haystack` ignoring whitespace-run differences.
    /// Returns the byte span of the matching original text.
    fn normalized_find(haystack: &str, search: &str) -> Option<(usize, usize)> {
        let needle = normalize(search);
        if needle.is_empty() {
            return None;
        }

        // Walk candidate start positions; at each, consume haystack
        // characters until the normalized needle is matched or diverges.
        let bytes: Vec<(usize, char)> = haystack.char_indices().collect();
        for start_idx in 0..bytes.len() {
            if let Some(end) = match_from(&bytes, start_idx, &needle, haystack) {
                return Some((bytes[start_idx].0, end));
            }
        }
        None
    }

    /// Snapshot `target` into the backup directory before rewriting.
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

/// Collapse every whitespace run into a single space and trim.
fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn match_from(
    bytes: &[(usize, char)],
    start_idx: usize,
    needle: &str,
    haystack: &str,
) -> Option<usize> {
    let needle_chars: Vec<char> = needle.chars().collect();
    let mut ni = 0;
    let mut i = start_idx;

    // Skip nothing at the start: the first haystack char must begin the match
    if bytes[i].1.is_whitespace() {
        return None;
    }

    while ni < needle_chars.len() && i < bytes.len() {
        let hc = bytes[i].1;
        let nc = needle_chars[ni];

        if nc == ' ' {
            // One needle space matches any whitespace run
            if !hc.is_whitespace() {
                return None;
            }
            while i < bytes.len() && bytes[i].1.is_whitespace() {
                i += 1;
            }
            ni += 1;
        } else if hc == nc {
            i += 1;
            ni += 1;
        } else if hc.is_whitespace() {
            // Extra whitespace in the haystack is tolerated
            i += 1;
        } else {
            return None;
        }
    }

    if ni == needle_chars.len() {
        let end = if i < bytes.len() {
            bytes[i].0
        } else {
            haystack.len()
        };
        Some(end)
    } else {
        None
    }
}

#[async_trait]
impl Capability for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace the first occurrence of `search` with `replace` in a file. The search text must already exist in the file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file to edit" },
                "search": { "type": "string", "description": "Existing text to find" },
                "replace": { "type": "string", "description": "Replacement text" }
            },
            "required": ["path", "search", "replace"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::Mutating
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let search = arguments["search"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'search' argument".into()))?;
        let replace = arguments["replace"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'replace' argument".into()))?;

        if search.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'search' must not be empty".into()));
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::failed(format!("Cannot edit '{path}': {e}"))),
        };

        let edited = if let Some(pos) = content.find(search) {
            let mut out = String::with_capacity(content.len());
            out.push_str(&content[..pos]);
            out.push_str(replace);
            out.push_str(&content[pos + search.len()..]);
            out
        } else if let Some((start, end)) = Self::normalized_find(&content, search) {
            let mut out = String::with_capacity(content.len());
            out.push_str(&content[..start]);
            out.push_str(replace);
            out.push_str(&content[end..]);
            out
        } else {
            return Ok(ToolResult::failed(format!(
                "Search text not found in '{path}' (tried exact and whitespace-normalized match)"
            )));
        };

        let target = Path::new(path);
        match self.backup(target).await {
            Ok(backup_path) => {
                debug!(path, backup = %backup_path.display(), "Backed up before edit");
            }
            Err(e) => {
                return Ok(ToolResult::failed(format!(
                    "Refusing to edit '{path}': backup failed: {e}"
                )));
            }
        }

        match tokio::fs::write(target, &edited).await {
            Ok(()) => Ok(ToolResult::edited(format!("Edited {path}"), path)),
            Err(e) => Ok(ToolResult::failed(format!("Failed to write '{path}': {e}"))),
        }
    }
}
