//! Bounded short-term conversational memory.
//!
//! A small JSON array file holding the most recent task/answer exchanges.
//! New conversations are seeded from it so consecutive CLI invocations keep
//! some continuity without dragging the full durable index in.

use chrono::{DateTime, Utc};
use codequill_core::error::MemoryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// One recorded exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub task: String,
    pub summary: String,
    pub at: DateTime<Utc>,
}

/// Bounded-length array file of recent exchanges. Oldest entries are
/// dropped when the bound is exceeded.
pub struct ShortTermMemory {
    path: PathBuf,
    limit: usize,
}

impl ShortTermMemory {
    pub fn open(path: PathBuf, limit: usize) -> Self {
        Self { path, limit }
    }

    /// Load all recorded exchanges, oldest first. Missing or corrupted
    /// files yield an empty list.
    pub fn load(&self) -> Vec<Exchange> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Short-term memory file corrupted, starting fresh");
                Vec::new()
            }
        }
    }

    /// Append one exchange, trimming to the bound, and persist.
    pub fn record(&self, task: &str, summary: &str) -> Result<(), MemoryError> {
        let mut exchanges = self.load();
        exchanges.push(Exchange {
            task: task.to_string(),
            summary: summary.to_string(),
            at: Utc::now(),
        });
        if exchanges.len() > self.limit {
            let excess = exchanges.len() - self.limit;
            exchanges.drain(0..excess);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemoryError::Storage(format!("Failed to create directory: {e}")))?;
        }

        let json = serde_json::to_string_pretty(&exchanges)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| MemoryError::Storage(format!("Failed to write: {e}")))
    }
}
