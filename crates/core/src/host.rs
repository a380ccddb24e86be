//! Host-facing traits — the narrow interfaces the core exposes to front
//! ends (CLI, editor integration).
//!
//! The loop never talks to a terminal or an editor directly; it calls these
//! hooks and the host decides how to surface them.

/// Callbacks the orchestration loop fires as a run progresses.
///
/// All methods are no-ops by default so hosts implement only what they
/// care about.
pub trait HostHooks: Send + Sync {
    /// A mutating capability touched `path`.
    fn on_editing(&self, _path: &str) {}

    /// A short status string for the current step.
    fn on_progress(&self, _status: &str) {}

    /// The model asked a clarifying question instead of acting.
    fn on_ask(&self, _question: &str) {}

    /// The run finished (Completed or PartialCompletion) with a summary
    /// and the list of modified files.
    fn on_summary(&self, _lines: &str, _files: &[String]) {}
}

/// A host that ignores all notifications. Useful default and test double.
pub struct NoopHooks;

impl HostHooks for NoopHooks {}

/// Read-only editor introspection provided by the host.
///
/// Only editor front ends implement this; the CLI leaves it out and the
/// corresponding capabilities report failure instead of panicking.
pub trait EditorContext: Send + Sync {
    /// The currently selected text, if any.
    fn selection(&self) -> Option<String>;

    /// Current diagnostics (compiler errors, lints) as display lines.
    fn diagnostics(&self) -> Vec<String>;
}
