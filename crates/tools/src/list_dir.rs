//! List directory capability — bounded recursive listing with a fixed
//! ignore-list for version control, build, and dependency directories.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::tool::{Capability, Effect, ToolResult};
use std::path::Path;

/// Directories never descended into or listed.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "target",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    ".idea",
];

/// Recursion ceiling; entries below it are elided.
const MAX_DEPTH: usize = 5;

pub struct ListDirectoryTool {
    max_depth: usize,
}

impl ListDirectoryTool {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }

    fn is_ignored(name: &str) -> bool {
        IGNORED_DIRS.contains(&name)
    }

    fn walk(dir: &Path, depth: usize, max_depth: usize, out: &mut Vec<String>) {
        if depth >= max_depth {
            return;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        let mut names: Vec<(String, bool)> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir && Self::is_ignored(&name) {
                    None
                } else {
                    Some((name, is_dir))
                }
            })
            .collect();
        names.sort();

        let indent = "  ".repeat(depth);
        for (name, is_dir) in names {
            if is_dir {
                out.push(format!("{indent}{name}/"));
                Self::walk(&dir.join(&name), depth + 1, max_depth, out);
            } else {
                out.push(format!("{indent}{name}"));
            }
        }
    }
}

impl Default for ListDirectoryTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and subdirectories under a path, recursively (bounded depth, ignoring VCS/build/dependency directories)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The directory to list" }
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

        let dir = Path::new(path);
        if !dir.is_dir() {
            return Ok(ToolResult::failed(format!("'{path}' is not a directory")));
        }

        let mut lines = Vec::new();
        Self::walk(dir, 0, self.max_depth, &mut lines);

        if lines.is_empty() {
            return Ok(ToolResult::ok(format!("{path} is empty")));
        }
        Ok(ToolResult::ok(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_files_and_dirs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();

        let tool = ListDirectoryTool::new();
        let result = tool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();

        assert!(result.success);
        let lines: Vec<_> = result.output.lines().collect();
        assert_eq!(lines, vec!["a.md", "b.txt", "img/"]);
    }

    #[tokio::test]
    async fn skips_ignored_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("lib.rs"), "x").unwrap();

        let tool = ListDirectoryTool::new();
        let result = tool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();

        assert!(!result.output.contains(".git"));
        assert!(!result.output.contains("node_modules"));
        assert!(result.output.contains("src/"));
        assert!(result.output.contains("lib.rs"));
    }

    #[tokio::test]
    async fn respects_depth_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut deep = dir.path().to_path_buf();
        for i in 0..8 {
            deep = deep.join(format!("level{i}"));
        }
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("buried.txt"), "x").unwrap();

        let tool = ListDirectoryTool { max_depth: 3 };
        let result = tool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();

        assert!(result.output.contains("level0/"));
        assert!(result.output.contains("level2/"));
        assert!(!result.output.contains("level3/"));
        assert!(!result.output.contains("buried.txt"));
    }

    #[tokio::test]
    async fn non_directory_fails() {
        let tool = ListDirectoryTool::new();
        let result = tool
            .execute(serde_json::json!({ "path": "/tmp/codequill_no_such_dir_4417" }))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn empty_directory_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirectoryTool::new();
        let result = tool
            .execute(serde_json::json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("empty"));
    }
}
