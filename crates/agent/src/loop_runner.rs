//! The orchestration loop — one state machine from task to terminal
//! outcome.
//!
//! Every front end drives the same [`TaskRunner`]; ceilings and timeouts
//! come from [`RunnerConfig`] and can be swapped between runs with
//! [`TaskRunner::reconfigure`]. A run produces exactly one [`RunOutcome`]
//! and an internal transcript of the conversation that got there.
//!
//! Cancellation is cooperative: the token is checked before each model
//! call and raced against the two suspension points (model completion,
//! batch execution). A cancelled run reports [`RunOutcome::Cancelled`]
//! even when nothing has happened yet.

use std::sync::Arc;

use codequill_config::RunnerConfig;
use codequill_core::host::HostHooks;
use codequill_core::message::{Conversation, Message};
use codequill_core::outcome::RunOutcome;
use codequill_core::provider::{CompletionRequest, ModelProvider};
use codequill_core::tool::{CapabilityRegistry, ToolInvocation, ToolResult};
use codequill_memory::SimilarityStore;
use codequill_tools::COMPLETE_TOOL;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::parser::parse_invocations;
use crate::prompt::{build_system_prompt, format_memory_context, retry_instruction, NO_TOOL_INSTRUCTION};
use crate::scheduler::execute_batch;

/// Phrases that mark a conversational turn as a completion claim.
const COMPLETION_PHRASES: &[&str] = &[
    "task is complete",
    "task complete",
    "task is done",
    "task is finished",
    "all done",
    "is now complete",
    "completed the task",
    "finished the task",
];

/// Markers that retract a completion claim in the same turn.
const NEGATION_MARKERS: &[&str] = &["not ", "n't", "cannot", "incomplete", "unfinished", "remain"];

/// Whether a conversational turn affirmatively claims the task is done.
/// Any negation in the turn retracts the claim, so "the task is not done
/// yet" never terminates a run.
fn claims_completion(text: &str) -> bool {
    let lowered = text.to_lowercase();
    if NEGATION_MARKERS.iter().any(|n| lowered.contains(n)) {
        return false;
    }
    COMPLETION_PHRASES.iter().any(|p| lowered.contains(p))
}

/// The orchestration loop.
pub struct TaskRunner {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<CapabilityRegistry>,
    memory: Option<Arc<SimilarityStore>>,
    hooks: Arc<dyn HostHooks>,
    config: RunnerConfig,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    recall_limit: usize,
}

impl TaskRunner {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<CapabilityRegistry>,
        config: RunnerConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry,
            memory: None,
            hooks: Arc::new(codequill_core::host::NoopHooks),
            config,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            recall_limit: 5,
        }
    }

    /// Attach the similarity store. Without it, runs neither recall nor
    /// remember.
    pub fn with_memory(mut self, memory: Arc<SimilarityStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach host callbacks.
    pub fn with_hooks(mut self, hooks: Arc<dyn HostHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Override sampling parameters.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// How many memories to recall into the system prompt.
    pub fn with_recall_limit(mut self, limit: usize) -> Self {
        self.recall_limit = limit;
        self
    }

    /// Swap loop tunables between runs. Never takes effect mid-run.
    pub fn reconfigure(&mut self, config: RunnerConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Drive `task` to a terminal outcome.
    pub async fn run(&self, task: &str, cancel: CancellationToken) -> RunOutcome {
        if cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        let memory_context = match &self.memory {
            Some(store) => format_memory_context(&store.recall(task, self.recall_limit).await),
            None => String::new(),
        };

        let mut conversation = Conversation::new();
        conversation.push(Message::system(build_system_prompt(
            &self.registry.definitions(),
            &memory_context,
        )));
        conversation.push(Message::user(task));

        let known_tools = self.registry.names();
        let timeout = self.config.per_tool_timeout();
        let mut modified: Vec<String> = Vec::new();
        let mut retries: u32 = 0;

        for step in 1..=self.config.step_ceiling {
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            self.hooks
                .on_progress(&format!("step {step}/{}", self.config.step_ceiling));

            let request = CompletionRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stop: Vec::new(),
            };

            let response = tokio::select! {
                _ = cancel.cancelled() => return RunOutcome::Cancelled,
                resp = self.provider.complete(request) => resp,
            };

            let text = match response {
                Ok(text) => text,
                Err(e) => {
                    warn!(step, error = %e, "Model call failed");
                    retries += 1;
                    if retries > self.config.retry_ceiling {
                        return RunOutcome::Failed {
                            reason: format!("Model provider failed: {e}"),
                            modified_files: modified,
                        };
                    }
                    continue;
                }
            };

            conversation.push(Message::assistant(text.clone()));
            self.remember_exchange(task, &text).await;
            let invocations = parse_invocations(&text, &known_tools);
            debug!(step, invocations = invocations.len(), "Parsed model turn");

            if invocations.is_empty() {
                let trimmed = text.trim();
                if trimmed.ends_with('?') {
                    // Surface the clarifying question; the loop itself has
                    // no way to answer, so nudge the model onward.
                    self.hooks.on_ask(trimmed);
                    conversation.push(Message::user(NO_TOOL_INSTRUCTION));
                    continue;
                }
                if claims_completion(trimmed) && !modified.is_empty() {
                    self.hooks.on_summary(trimmed, &modified);
                    self.remember_outcome(task, trimmed).await;
                    return RunOutcome::Completed {
                        summary: trimmed.to_string(),
                        modified_files: modified,
                    };
                }
                conversation.push(Message::user(NO_TOOL_INSTRUCTION));
                continue;
            }

            // The `complete` pseudo-capability is intercepted here; it never
            // reaches the scheduler. Sibling calls in the same turn still run.
            let complete_pos = invocations.iter().position(|i| i.name == COMPLETE_TOOL);
            let batch: Vec<ToolInvocation> = match complete_pos {
                Some(pos) => invocations
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != pos)
                    .map(|(_, inv)| inv.clone())
                    .collect(),
                None => invocations.clone(),
            };

            let results = if batch.is_empty() {
                Vec::new()
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return RunOutcome::Cancelled,
                    results = execute_batch(&self.registry, &batch, timeout) => results,
                }
            };

            for result in &results {
                if let Some(path) = result.modified_file.as_deref() {
                    if !modified.iter().any(|p| p == path) {
                        modified.push(path.to_string());
                    }
                    self.hooks.on_editing(path);
                }
            }

            if let Some(pos) = complete_pos {
                let summary = invocations[pos]
                    .str_arg("summary")
                    .unwrap_or("Task complete")
                    .to_string();
                info!(step, files = modified.len(), "Run completed");
                self.hooks.on_summary(&summary, &modified);
                self.remember_outcome(task, &summary).await;
                return RunOutcome::Completed {
                    summary,
                    modified_files: modified,
                };
            }

            conversation.push(Message::tool(fold_results(&batch, &results)));

            let first_error = results
                .iter()
                .find(|r| !r.success)
                .and_then(|r| r.error.clone());
            match first_error {
                Some(error) => {
                    retries += 1;
                    if retries > self.config.retry_ceiling {
                        return RunOutcome::Failed {
                            reason: error,
                            modified_files: modified,
                        };
                    }
                    conversation.push(Message::user(retry_instruction(&error)));
                }
                None => retries = 0,
            }
        }

        // Step ceiling reached without an explicit conclusion.
        if modified.is_empty() {
            RunOutcome::Failed {
                reason: format!(
                    "Reached the step limit ({}) without completing the task",
                    self.config.step_ceiling
                ),
                modified_files: modified,
            }
        } else {
            let summary = format!(
                "Stopped at the step limit ({}); {} file(s) were modified",
                self.config.step_ceiling,
                modified.len()
            );
            self.hooks.on_summary(&summary, &modified);
            self.remember_outcome(task, &summary).await;
            RunOutcome::PartialCompletion {
                summary,
                modified_files: modified,
            }
        }
    }

    /// Append one model exchange to durable memory. Fire-and-forget: the
    /// store swallows embedding and storage failures, so a down embedder
    /// never stalls the run.
    async fn remember_exchange(&self, task: &str, response: &str) {
        if let Some(store) = &self.memory {
            store
                .remember(
                    &format!("While working on '{task}': {response}"),
                    "conversation",
                )
                .await;
        }
    }

    async fn remember_outcome(&self, task: &str, summary: &str) {
        if let Some(store) = &self.memory {
            store
                .remember(&format!("Task: {task}\nOutcome: {summary}"), "task")
                .await;
        }
    }
}

/// Fold a batch of results into one tool message, in batch order.
fn fold_results(batch: &[ToolInvocation], results: &[ToolResult]) -> String {
    batch
        .iter()
        .zip(results)
        .enumerate()
        .map(|(i, (inv, result))| {
            if result.success {
                format!("{}. {} succeeded:\n{}", i + 1, inv.name, result.output)
            } else {
                format!(
                    "{}. {} failed: {}",
                    i + 1,
                    inv.name,
                    result.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codequill_core::error::ProviderError;
    use codequill_core::provider::Embedder;
    use codequill_tools::default_registry;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    /// Replays a fixed script of responses and records every request.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request_text(&self, idx: usize) -> String {
            self.requests.lock().unwrap()[idx]
                .messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(ProviderError::EmptyResponse)
        }
    }

    /// Records every hook call for assertions.
    #[derive(Default)]
    struct RecordingHooks {
        asks: Mutex<Vec<String>>,
        edits: Mutex<Vec<String>>,
        summaries: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl HostHooks for RecordingHooks {
        fn on_editing(&self, path: &str) {
            self.edits.lock().unwrap().push(path.to_string());
        }
        fn on_ask(&self, question: &str) {
            self.asks.lock().unwrap().push(question.to_string());
        }
        fn on_summary(&self, lines: &str, files: &[String]) {
            self.summaries
                .lock()
                .unwrap()
                .push((lines.to_string(), files.to_vec()));
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let bytes = text.as_bytes();
            let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
            Ok(vec![
                bytes.len() as f32,
                sum as f32 % 97.0,
                bytes.first().copied().unwrap_or(0) as f32,
            ])
        }
    }

    fn runner(provider: Arc<ScriptedProvider>, dir: &Path, config: RunnerConfig) -> TaskRunner {
        let registry = Arc::new(default_registry(dir.join("backups"), None));
        TaskRunner::new(provider, registry, config, "test-model")
    }

    fn config() -> RunnerConfig {
        RunnerConfig {
            step_ceiling: 12,
            retry_ceiling: 2,
            per_tool_timeout_secs: 10,
        }
    }

    fn complete_call(summary: &str) -> String {
        format!(r#"{{"tool": "complete", "args": {{"summary": "{summary}"}}}}"#)
    }

    #[tokio::test]
    async fn completes_when_model_concludes() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(&[&complete_call("Nothing to do")]);
        let r = runner(provider.clone(), dir.path(), config());

        let outcome = r.run("say hi", CancellationToken::new()).await;
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                summary: "Nothing to do".into(),
                modified_files: vec![],
            }
        );
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_run_makes_no_model_calls() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(&[&complete_call("never reached")]);
        let r = runner(provider.clone(), dir.path(), config());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = r.run("do something", cancel).await;
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn tool_output_is_fed_back_to_the_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# notes").unwrap();
        std::fs::write(dir.path().join("b.txt"), "text").unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();

        let list = format!(
            r#"{{"tool": "list_directory", "args": {{"path": "{}"}}}}"#,
            dir.path().display()
        );
        let provider = ScriptedProvider::new(&[&list, &complete_call("Listed the docs")]);
        let r = runner(provider.clone(), dir.path(), config());

        let outcome = r.run("what's in the docs dir?", CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert_eq!(provider.call_count(), 2);

        // The second request carries the listing from the first step.
        let second = provider.request_text(1);
        assert!(second.contains("a.md"), "listing missing: {second}");
        assert!(second.contains("b.txt"));
        assert!(second.contains("img/"));
    }

    #[tokio::test]
    async fn placeholder_write_retries_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let write = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "... ... ..."}}}}"#,
            target.display()
        );
        let provider = ScriptedProvider::new(&[&write, &write]);
        let r = runner(
            provider.clone(),
            dir.path(),
            RunnerConfig {
                retry_ceiling: 1,
                ..config()
            },
        );

        let outcome = r.run("write the file", CancellationToken::new()).await;
        match outcome {
            RunOutcome::Failed { reason, modified_files } => {
                assert!(reason.contains("placeholder"), "{reason}");
                assert!(modified_files.is_empty());
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // Validation rejected the write before touching disk.
        assert!(!target.exists());
        assert_eq!(provider.call_count(), 2);

        // The retry turn carried a corrective instruction.
        assert!(provider.request_text(1).contains("failed"));
    }

    #[tokio::test]
    async fn failed_step_then_recovery_resets_retries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), "content").unwrap();
        let bad = format!(
            r#"{{"tool": "read_file", "args": {{"path": "{}"}}}}"#,
            dir.path().join("missing.txt").display()
        );
        let good = format!(
            r#"{{"tool": "read_file", "args": {{"path": "{}"}}}}"#,
            dir.path().join("real.txt").display()
        );
        let provider =
            ScriptedProvider::new(&[&bad, &good, &bad, &good, &complete_call("Read it")]);
        // retry_ceiling 1 tolerates each isolated failure because the
        // successful step in between resets the counter.
        let r = runner(
            provider.clone(),
            dir.path(),
            RunnerConfig {
                retry_ceiling: 1,
                ..config()
            },
        );

        let outcome = r.run("read the file", CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::Completed { .. }), "{outcome:?}");
        assert_eq!(provider.call_count(), 5);
    }

    #[tokio::test]
    async fn step_ceiling_with_modified_files_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let w = |name: &str| {
            format!(
                r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "real file contents"}}}}"#,
                dir.path().join(name).display()
            )
        };
        let provider = ScriptedProvider::new(&[&w("one.txt"), &w("two.txt"), &w("three.txt")]);
        let r = runner(
            provider.clone(),
            dir.path(),
            RunnerConfig {
                step_ceiling: 2,
                ..config()
            },
        );

        let outcome = r.run("write files", CancellationToken::new()).await;
        match outcome {
            RunOutcome::PartialCompletion { modified_files, .. } => {
                assert_eq!(modified_files.len(), 2);
            }
            other => panic!("expected PartialCompletion, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn step_ceiling_without_work_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();
        let read = format!(
            r#"{{"tool": "read_file", "args": {{"path": "{}"}}}}"#,
            dir.path().join("f.txt").display()
        );
        let provider = ScriptedProvider::new(&[&read, &read, &read]);
        let r = runner(
            provider.clone(),
            dir.path(),
            RunnerConfig {
                step_ceiling: 3,
                ..config()
            },
        );

        let outcome = r.run("investigate", CancellationToken::new()).await;
        match outcome {
            RunOutcome::Failed { reason, .. } => assert!(reason.contains("step limit")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn negated_done_language_does_not_complete() {
        let dir = tempfile::tempdir().unwrap();
        let write = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "real file contents"}}}}"#,
            dir.path().join("w.txt").display()
        );
        let provider = ScriptedProvider::new(&[
            &write,
            "The task is not done yet, several steps remain.",
            &complete_call("Now it is finished"),
        ]);
        let r = runner(provider.clone(), dir.path(), config());

        let outcome = r.run("write the file", CancellationToken::new()).await;
        match outcome {
            RunOutcome::Completed { summary, .. } => {
                // Run ended at the explicit complete call, not at the
                // negated turn.
                assert_eq!(summary, "Now it is finished");
            }
            other => panic!("expected Completed via complete, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn affirmative_done_language_completes() {
        let dir = tempfile::tempdir().unwrap();
        let write = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "real file contents"}}}}"#,
            dir.path().join("w.txt").display()
        );
        let provider = ScriptedProvider::new(&[&write, "The task is complete."]);
        let r = runner(provider.clone(), dir.path(), config());

        let outcome = r.run("write the file", CancellationToken::new()).await;
        match outcome {
            RunOutcome::Completed { summary, modified_files } => {
                assert_eq!(summary, "The task is complete.");
                assert_eq!(modified_files.len(), 1);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn completion_claims_require_affirmative_phrasing() {
        assert!(claims_completion("The task is complete."));
        assert!(claims_completion("All done, everything works."));
        assert!(!claims_completion("The task is not done yet, several steps remain."));
        assert!(!claims_completion("The task isn't finished."));
        assert!(!claims_completion("This is incomplete."));
        assert!(!claims_completion("I made some progress."));
    }

    #[tokio::test]
    async fn conversational_turn_gets_corrective_instruction() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(&[
            "Let me think about the approach first.",
            &complete_call("Thought about it"),
        ]);
        let r = runner(provider.clone(), dir.path(), config());

        let outcome = r.run("plan something", CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert!(provider.request_text(1).contains("No tool call was found"));
    }

    #[tokio::test]
    async fn question_fires_on_ask_and_the_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(&[
            "Which file should I edit?",
            &complete_call("Picked the obvious one"),
        ]);
        let hooks = Arc::new(RecordingHooks::default());
        let r = runner(provider.clone(), dir.path(), config()).with_hooks(hooks.clone());

        let outcome = r.run("edit a file", CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(
            hooks.asks.lock().unwrap().as_slice(),
            &["Which file should I edit?".to_string()]
        );
    }

    #[tokio::test]
    async fn edits_are_reported_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("same.txt");
        let write = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "first version here"}}}}"#,
            target.display()
        );
        let rewrite = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "second version here"}}}}"#,
            target.display()
        );
        let provider = ScriptedProvider::new(&[&write, &rewrite, &complete_call("Wrote twice")]);
        let hooks = Arc::new(RecordingHooks::default());
        let r = runner(provider.clone(), dir.path(), config()).with_hooks(hooks.clone());

        let outcome = r.run("write it", CancellationToken::new()).await;
        match outcome {
            RunOutcome::Completed { modified_files, .. } => {
                assert_eq!(modified_files.len(), 1);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        // on_editing fires per touch, the outcome deduplicates.
        assert_eq!(hooks.edits.lock().unwrap().len(), 2);
        assert_eq!(hooks.summaries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn provider_errors_exhaust_the_retry_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        // Empty script: every call errors.
        let provider = ScriptedProvider::new(&[]);
        let r = runner(
            provider.clone(),
            dir.path(),
            RunnerConfig {
                retry_ceiling: 2,
                ..config()
            },
        );

        let outcome = r.run("anything", CancellationToken::new()).await;
        match outcome {
            RunOutcome::Failed { reason, .. } => assert!(reason.contains("provider")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn recalled_memories_reach_the_system_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SimilarityStore::open(
            dir.path().join("memory.jsonl"),
            Arc::new(StubEmbedder),
            2048,
            8,
        ));
        store
            .remember("The project builds with `make release`", "task")
            .await;

        let provider = ScriptedProvider::new(&[&complete_call("Recalled")]);
        let registry = Arc::new(default_registry(dir.path().join("backups"), None));
        let r = TaskRunner::new(provider.clone(), registry, config(), "test-model")
            .with_memory(store);

        r.run("how do I build this?", CancellationToken::new()).await;
        let first = provider.request_text(0);
        assert!(first.contains("make release"), "prompt missing recall: {first}");
    }

    #[tokio::test]
    async fn completion_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SimilarityStore::open(
            dir.path().join("memory.jsonl"),
            Arc::new(StubEmbedder),
            2048,
            8,
        ));
        let provider = ScriptedProvider::new(&[&complete_call("Renamed the module")]);
        let registry = Arc::new(default_registry(dir.path().join("backups"), None));
        let r = TaskRunner::new(provider, registry, config(), "test-model")
            .with_memory(store.clone());

        r.run("rename the module", CancellationToken::new()).await;
        // One exchange plus the task outcome.
        assert_eq!(store.len().await, 2);
        let entries = store.entries().await;
        assert_eq!(entries[1].source, "task");
        assert!(entries[1].content.contains("Outcome: Renamed the module"));
    }

    #[tokio::test]
    async fn every_exchange_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SimilarityStore::open(
            dir.path().join("memory.jsonl"),
            Arc::new(StubEmbedder),
            2048,
            8,
        ));
        let write = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "real file contents"}}}}"#,
            dir.path().join("w.txt").display()
        );
        let provider = ScriptedProvider::new(&[&write, &complete_call("Wrote the file")]);
        let registry = Arc::new(default_registry(dir.path().join("backups"), None));
        let r = TaskRunner::new(provider, registry, config(), "test-model")
            .with_memory(store.clone());

        r.run("write the file", CancellationToken::new()).await;
        let entries = store.entries().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].source, "conversation");
        assert_eq!(entries[1].source, "conversation");
        assert_eq!(entries[2].source, "task");
        assert!(entries[0].content.contains("While working on 'write the file'"));
    }

    #[tokio::test]
    async fn partial_completion_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SimilarityStore::open(
            dir.path().join("memory.jsonl"),
            Arc::new(StubEmbedder),
            2048,
            8,
        ));
        let write = format!(
            r#"{{"tool": "write_file", "args": {{"path": "{}", "content": "real file contents"}}}}"#,
            dir.path().join("w.txt").display()
        );
        let provider = ScriptedProvider::new(&[&write, &write]);
        let registry = Arc::new(default_registry(dir.path().join("backups"), None));
        let r = TaskRunner::new(
            provider,
            registry,
            RunnerConfig {
                step_ceiling: 2,
                ..config()
            },
            "test-model",
        )
        .with_memory(store.clone());

        let outcome = r.run("write the file", CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::PartialCompletion { .. }));
        let entries = store.entries().await;
        // Two exchanges plus the step-limit outcome.
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].source, "task");
        assert!(entries[2].content.contains("step limit"));
    }

    #[tokio::test]
    async fn reconfigure_applies_to_the_next_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();
        let read = format!(
            r#"{{"tool": "read_file", "args": {{"path": "{}"}}}}"#,
            dir.path().join("f.txt").display()
        );
        let provider = ScriptedProvider::new(&[&read, &read]);
        let mut r = runner(provider.clone(), dir.path(), config());
        r.reconfigure(RunnerConfig {
            step_ceiling: 1,
            ..config()
        });

        let outcome = r.run("look around", CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::Failed { .. }));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn fold_results_numbers_in_batch_order() {
        let batch = vec![
            ToolInvocation::new("read_file", serde_json::json!({"path": "a"})),
            ToolInvocation::new("write_file", serde_json::json!({"path": "b"})),
        ];
        let results = vec![
            ToolResult::ok("contents of a"),
            ToolResult::failed("disk full"),
        ];
        let folded = fold_results(&batch, &results);
        assert!(folded.contains("1. read_file succeeded"));
        assert!(folded.contains("2. write_file failed: disk full"));
    }
}
