//! System prompt assembly — capability listing, wire-format contract, and
//! recalled memory context.

use codequill_core::tool::ToolDefinition;
use codequill_memory::Recalled;

/// Build the system prompt for one run.
pub fn build_system_prompt(definitions: &[ToolDefinition], memory_context: &str) -> String {
    let mut prompt = String::from(
        "You are CodeQuill, a local coding assistant. You accomplish tasks by \
         calling tools.\n\n\
         To call a tool, emit a JSON object on its own line:\n\
         {\"tool\": \"<name>\", \"args\": { ... }}\n\n\
         You may emit several tool calls in one response. When the task is \
         finished, call the `complete` tool with a summary. If you need \
         clarification, ask a question instead of calling tools.\n\n\
         Available tools:\n",
    );

    for def in definitions {
        prompt.push_str(&format!(
            "- {}: {}\n  args schema: {}\n",
            def.name, def.description, def.parameters
        ));
    }

    if !memory_context.is_empty() {
        prompt.push_str(memory_context);
    }

    prompt
}

/// Format recalled memories into a context block for the system prompt.
pub fn format_memory_context(memories: &[Recalled]) -> String {
    if memories.is_empty() {
        return String::new();
    }

    let mut ctx = String::from("\n## Recalled context\n");
    for (i, mem) in memories.iter().enumerate() {
        ctx.push_str(&format!(
            "{}. [{} | score={:.2}] {}\n",
            i + 1,
            mem.created_at.format("%Y-%m-%d %H:%M"),
            mem.score,
            mem.content
        ));
    }
    ctx
}

/// Corrective instruction appended when a turn contains no tool call and
/// no completion language.
pub const NO_TOOL_INSTRUCTION: &str = "No tool call was found in your response. Either call a \
     tool as {\"tool\": \"<name>\", \"args\": {...}} or call `complete` with a summary to finish.";

/// Corrective instruction appended after a failed tool batch.
pub fn retry_instruction(error: &str) -> String {
    format!(
        "A tool call failed: {error}\nFix the arguments (or choose a different tool) and try again."
    )
}
