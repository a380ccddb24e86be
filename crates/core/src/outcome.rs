//! Terminal run outcomes.

use serde::{Deserialize, Serialize};

/// The terminal state of one run. Produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The model explicitly concluded the task.
    Completed {
        summary: String,
        modified_files: Vec<String>,
    },

    /// The step ceiling was reached but some files were modified, so the
    /// work is surfaced rather than silently lost.
    PartialCompletion {
        summary: String,
        modified_files: Vec<String>,
    },

    /// Retry or step ceiling exhausted with nothing to show, or a fatal
    /// condition. Carries the partial modified-file set.
    Failed {
        reason: String,
        modified_files: Vec<String>,
    },

    /// The caller cancelled the run.
    Cancelled,
}

impl RunOutcome {
    /// Files touched before the run ended, empty for `Cancelled`.
    pub fn modified_files(&self) -> &[String] {
        match self {
            Self::Completed { modified_files, .. }
            | Self::PartialCompletion { modified_files, .. }
            | Self::Failed { modified_files, .. } => modified_files,
            Self::Cancelled => &[],
        }
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Cancelled)
    }
}
