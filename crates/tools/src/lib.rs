//! Built-in capability implementations for CodeQuill.
//!
//! The capability set is fixed and closed: read/write/edit files, list
//! directories, run shell commands, search and fetch web pages, introspect
//! the host editor, and the `complete` pseudo-capability that ends a run.
//! There is no plugin mechanism by design.

pub mod complete;
pub mod editor;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod shell;
pub mod web_fetch;
pub mod web_search;

use codequill_core::host::EditorContext;
use codequill_core::tool::CapabilityRegistry;
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the pseudo-capability that concludes a run. The orchestration
/// loop intercepts invocations of this name before scheduling.
pub const COMPLETE_TOOL: &str = "complete";

/// Assemble the full capability registry.
///
/// `backup_dir` receives timestamped snapshots of files before overwrite.
/// `editor` is the host's read-only introspection surface; pass `None`
/// outside an editor front end.
pub fn default_registry(
    backup_dir: PathBuf,
    editor: Option<Arc<dyn EditorContext>>,
) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(file_read::ReadFileTool::new()));
    registry.register(Box::new(file_write::WriteFileTool::new(backup_dir.clone())));
    registry.register(Box::new(file_edit::EditFileTool::new(backup_dir)));
    registry.register(Box::new(list_dir::ListDirectoryTool::new()));
    registry.register(Box::new(shell::RunCommandTool::new()));
    registry.register(Box::new(web_fetch::WebFetchTool::new()));
    registry.register(Box::new(web_search::WebSearchTool::new()));
    registry.register(Box::new(editor::EditorSelectionTool::new(editor.clone())));
    registry.register(Box::new(editor::EditorDiagnosticsTool::new(editor)));
    registry.register(Box::new(complete::CompleteTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_full_capability_set() {
        let registry = default_registry(PathBuf::from("/tmp/backups"), None);
        for name in [
            "read_file",
            "write_file",
            "edit_file",
            "list_directory",
            "run_command",
            "web_fetch",
            "web_search",
            "editor_selection",
            "editor_diagnostics",
            COMPLETE_TOOL,
        ] {
            assert!(registry.contains(name), "missing capability {name}");
        }
    }
}
