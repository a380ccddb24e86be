//! Editor introspection capabilities — read-only views of the host
//! editor's selection and diagnostics.
//!
//! The host provides an [`EditorContext`]; front ends without one (the
//! CLI) register these capabilities anyway so the model gets a clear
//! failure instead of an unknown-tool error.

use async_trait::async_trait;
use codequill_core::error::ToolError;
use codequill_core::host::EditorContext;
use codequill_core::tool::{Capability, Effect, ToolResult};
use std::sync::Arc;

pub struct EditorSelectionTool {
    editor: Option<Arc<dyn EditorContext>>,
}

impl EditorSelectionTool {
    pub fn new(editor: Option<Arc<dyn EditorContext>>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl Capability for EditorSelectionTool {
    fn name(&self) -> &str {
        "editor_selection"
    }

    fn description(&self) -> &str {
        "Get the text currently selected in the host editor."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let Some(editor) = &self.editor else {
            return Ok(ToolResult::failed("No editor attached to this session"));
        };
        match editor.selection() {
            Some(text) => Ok(ToolResult::ok(text)),
            None => Ok(ToolResult::ok("(nothing selected)")),
        }
    }
}

pub struct EditorDiagnosticsTool {
    editor: Option<Arc<dyn EditorContext>>,
}

impl EditorDiagnosticsTool {
    pub fn new(editor: Option<Arc<dyn EditorContext>>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl Capability for EditorDiagnosticsTool {
    fn name(&self) -> &str {
        "editor_diagnostics"
    }

    fn description(&self) -> &str {
        "Get current compiler/linter diagnostics from the host editor."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn effect(&self) -> Effect {
        Effect::ReadOnly
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let Some(editor) = &self.editor else {
            return Ok(ToolResult::failed("No editor attached to this session"));
        };
        let diagnostics = editor.diagnostics();
        if diagnostics.is_empty() {
            return Ok(ToolResult::ok("No diagnostics"));
        }
        Ok(ToolResult::ok(diagnostics.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEditor;

    impl EditorContext for FakeEditor {
        fn selection(&self) -> Option<String> {
            Some("let x = 1;".into())
        }
        fn diagnostics(&self) -> Vec<String> {
            vec!["E0308: mismatched types at src/main.rs:4".into()]
        }
    }

    #[tokio::test]
    async fn selection_with_editor() {
        let tool = EditorSelectionTool::new(Some(Arc::new(FakeEditor)));
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "let x = 1;");
    }

    #[tokio::test]
    async fn selection_without_editor_fails_cleanly() {
        let tool = EditorSelectionTool::new(None);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No editor"));
    }

    #[tokio::test]
    async fn diagnostics_with_editor() {
        let tool = EditorDiagnosticsTool::new(Some(Arc::new(FakeEditor)));
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("E0308"));
    }

    #[tokio::test]
    async fn diagnostics_without_editor_fails_cleanly() {
        let tool = EditorDiagnosticsTool::new(None);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(!result.success);
    }
}
