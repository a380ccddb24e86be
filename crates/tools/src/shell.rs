//! Run command capability — execute shell commands with a deny-list for
//! catastrophic patterns and bounded output.
//!
//! The per-call wall-clock timeout is applied by the registry executor; the
//! deny-list and output truncation live here.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

/// Commands containing any of these substrings are blocked outright.
/// Patterns that need anchoring (recursive root deletion, dd onto raw
/// devices) are handled separately so `rm -rf /tmp/scratch` and image-file
/// dd stay allowed.
const DENIED_PATTERNS: &[&str] = &[
    "mkfs",
    "> /dev/sd",
    "of=/dev/",
    ":(){",
    "shutdown",
    "reboot",
    "halt",
];

/// Deletion targets that make a recursive forced `rm` catastrophic.
const FATAL_RM_TARGETS: &[&str] = &["/", "/*", "~", "~/", "~/*", "*"];

/// Output beyond this many bytes is truncated before folding back.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

pub struct RunCommandTool {
    max_output: usize,
}

impl RunCommandTool {
    pub fn new() -> Self {
        Self {
            max_output: MAX_OUTPUT_BYTES,
        }
    }

    fn denied_pattern(command: &str) -> Option<&'static str> {
        let normalized = command.to_lowercase();
        let squeezed: String = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(pattern) = DENIED_PATTERNS.iter().find(|p| squeezed.contains(*p)) {
            return Some(pattern);
        }

        if Self::is_fatal_rm(&squeezed) {
            return Some("recursive forced delete of / or ~");
        }

        None
    }

    /// A recursive, forced `rm` whose target is the filesystem root, the
    /// home directory, or a bare glob. Deletes under a longer path
    /// (`rm -rf /tmp/scratch`) are allowed.
    fn is_fatal_rm(squeezed: &str) -> bool {
        let tokens: Vec<&str> = squeezed.split(' ').collect();
        let Some(pos) = tokens.iter().position(|t| *t == "rm") else {
            return false;
        };

        let mut recursive = false;
        let mut force = false;
        let mut fatal_target = false;
        for token in &tokens[pos + 1..] {
            if let Some(flags) = token.strip_prefix('-') {
                recursive |= flags.contains('r');
                force |= flags.contains('f');
            } else {
                fatal_target |= FATAL_RM_TARGETS.contains(token);
            }
        }
        recursive && force && fatal_target
    }

    fn truncate(&self, text: String) -> String {
        if text.len() <= self.max_output {
            return text;
        }
        let mut cut = self.max_output;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n[output truncated at {} bytes]", &text[..cut], self.max_output)
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for builds, tests, git operations, and inspecting the environment."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute" }
            },
            "required": ["command"]
        })
    }

    fn effect(&self) -> Effect {
        Effect::Mutating
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if let Some(pattern) = Self::denied_pattern(command) {
            warn!(command, pattern, "Blocked catastrophic command");
            return Err(ToolError::CommandBlocked(format!(
                "command matches denied pattern '{pattern}'"
            )));
        }

        debug!(command, "Executing shell command");

        let output = if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", command]).output().await
        } else {
            Command::new("sh").args(["-c", command]).output().await
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let success = output.status.success();

                let text = if success {
                    if stderr.is_empty() {
                        stdout
                    } else {
                        format!("{stdout}\n[stderr]: {stderr}")
                    }
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    warn!(command, exit_code = code, "Command failed");
                    format!("[exit code: {code}]\n{stdout}\n{stderr}")
                };

                let text = self.truncate(text.trim().to_string());
                if success {
                    Ok(ToolResult::ok(text))
                } else {
                    Ok(ToolResult {
                        success: false,
                        output: text.clone(),
                        error: Some(text),
                        modified_file: None,
                    })
                }
            }
            Err(e) => Ok(ToolResult::failed(format!("Failed to spawn command: {e}"))),
        }
    }
}
