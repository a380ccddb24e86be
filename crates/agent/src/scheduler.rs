//! Concurrency scheduler — splits one batch of invocations into
//! independent (read-only) and dependent (mutating) subsets.
//!
//! Independent calls fan out concurrently; every result is collected even
//! when some fail — one failure never aborts the batch. Dependent calls
//! run strictly in submitted order, one at a time, so mutations and
//! command side effects occur in a reproducible sequence. Results come
//! back in the original batch order regardless of execution order.

use codequill_core::tool::{CapabilityRegistry, Effect, ToolInvocation, ToolResult};
use futures::future::join_all;
use std::time::Duration;
use tracing::debug;

/// Execute one batch of invocations from a single model turn.
pub async fn execute_batch(
    registry: &CapabilityRegistry,
    invocations: &[ToolInvocation],
    per_tool_timeout: Duration,
) -> Vec<ToolResult> {
    let mut independent = Vec::new();
    let mut dependent = Vec::new();

    for (idx, inv) in invocations.iter().enumerate() {
        // Unknown names fail inside the executor without side effects, so
        // they ride with the independent set.
        match registry.effect_of(&inv.name) {
            Effect::ReadOnly => independent.push((idx, inv)),
            Effect::Mutating => dependent.push((idx, inv)),
        }
    }

    debug!(
        independent = independent.len(),
        dependent = dependent.len(),
        "Scheduling tool batch"
    );

    let mut slots: Vec<Option<ToolResult>> = (0..invocations.len()).map(|_| None).collect();

    // Fan out the independent set; wait for all, collect all.
    let fanout = independent
        .iter()
        .map(|(idx, inv)| async move { (*idx, registry.run(inv, per_tool_timeout).await) });
    for (idx, result) in join_all(fanout).await {
        slots[idx] = Some(result);
    }

    // Dependent calls serialize in submitted order, never interleaved.
    for (idx, inv) in dependent {
        let result = registry.run(inv, per_tool_timeout).await;
        slots[idx] = Some(result);
    }

    slots
        .into_iter()
        .map(|r| r.unwrap_or_else(|| ToolResult::failed("scheduler produced no result")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codequill_tools::default_registry;
    use serde_json::json;
    use std::path::Path;

    fn registry(dir: &Path) -> CapabilityRegistry {
        default_registry(dir.join("backups"), None)
    }

    fn timeout() -> Duration {
        Duration::from_secs(10)
    }

    #[tokio::test]
    async fn independent_batch_collects_all_results() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();

        let reg = registry(dir.path());
        let batch = vec![
            ToolInvocation::new("read_file", json!({"path": dir.path().join("a.txt")})),
            ToolInvocation::new("read_file", json!({"path": dir.path().join("missing.txt")})),
            ToolInvocation::new("read_file", json!({"path": dir.path().join("b.txt")})),
        ];

        let results = execute_batch(&reg, &batch, timeout()).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
        assert_eq!(results[0].output, "alpha");
        assert_eq!(results[2].output, "beta");
    }

    #[tokio::test]
    async fn dependent_calls_run_in_submitted_order() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.txt");
        let reg = registry(dir.path());

        // A writes the text that B's search depends on.
        let a = ToolInvocation::new(
            "write_file",
            json!({"path": target, "content": "the original sentence"}),
        );
        let b = ToolInvocation::new(
            "edit_file",
            json!({"path": target, "search": "original", "replace": "edited"}),
        );

        let results = execute_batch(&reg, &[a.clone(), b.clone()], timeout()).await;
        assert!(results[0].success);
        assert!(results[1].success, "edit must see write's text: {:?}", results[1].error);
        assert!(std::fs::read_to_string(&target).unwrap().contains("edited"));
    }

    #[tokio::test]
    async fn reversed_dependent_order_fails_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.txt");
        let reg = registry(dir.path());

        let b = ToolInvocation::new(
            "edit_file",
            json!({"path": target, "search": "original", "replace": "edited"}),
        );
        let a = ToolInvocation::new(
            "write_file",
            json!({"path": target, "content": "the original sentence"}),
        );

        // B first: its search text is not yet present.
        let results = execute_batch(&reg, &[b, a], timeout()).await;
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "the original sentence"
        );
    }

    #[tokio::test]
    async fn mixed_batch_preserves_result_positions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r.txt"), "readable").unwrap();
        let reg = registry(dir.path());

        let batch = vec![
            ToolInvocation::new(
                "write_file",
                json!({"path": dir.path().join("w.txt"), "content": "written content"}),
            ),
            ToolInvocation::new("read_file", json!({"path": dir.path().join("r.txt")})),
        ];

        let results = execute_batch(&reg, &batch, timeout()).await;
        assert_eq!(results.len(), 2);
        // Slot 0 is the write (mutating), slot 1 the read, matching
        // submission order even though the read ran first.
        assert!(results[0].output.contains("Wrote"));
        assert_eq!(results[1].output, "readable");
    }

    #[tokio::test]
    async fn unknown_tool_in_batch_does_not_abort_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "ok").unwrap();
        let reg = registry(dir.path());

        let batch = vec![
            ToolInvocation::new("teleport", json!({})),
            ToolInvocation::new("read_file", json!({"path": dir.path().join("x.txt")})),
        ];

        let results = execute_batch(&reg, &batch, timeout()).await;
        assert!(!results[0].success);
        assert!(results[0].error.as_ref().unwrap().contains("teleport"));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        let results = execute_batch(&reg, &[], timeout()).await;
        assert!(results.is_empty());
    }
}
