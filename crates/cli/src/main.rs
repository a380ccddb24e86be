//! The `codequill` terminal front end.
//!
//! Wires configuration, the provider client, the capability registry, and
//! the memory stores into one [`TaskRunner`], then drives a task to its
//! terminal outcome. Ctrl-C cancels the run cooperatively.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use codequill_agent::TaskRunner;
use codequill_config::AppConfig;
use codequill_core::host::HostHooks;
use codequill_core::outcome::RunOutcome;
use codequill_core::provider::Embedder;
use codequill_memory::{ShortTermMemory, SimilarityStore};
use codequill_providers::OpenAiCompatProvider;
use codequill_tools::default_registry;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// How many recent exchanges seed a new conversation.
const SHORT_TERM_LIMIT: usize = 10;

#[derive(Parser)]
#[command(name = "codequill", version, about = "Local AI coding assistant")]
struct Cli {
    /// Config file path (default: ~/.codequill/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a task to completion
    Run {
        /// The task, in plain language
        #[arg(required = true)]
        task: Vec<String>,

        /// Override the configured chat model
        #[arg(long)]
        model: Option<String>,

        /// Skip memory recall and persistence for this run
        #[arg(long)]
        no_memory: bool,
    },

    /// Inspect or clear the durable memory index
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// List all stored memories, oldest first
    List,

    /// Recall memories similar to a query
    Recall {
        #[arg(required = true)]
        query: Vec<String>,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Delete every stored memory
    Clear,
}

/// Prints loop progress to the terminal.
struct TerminalHooks;

impl HostHooks for TerminalHooks {
    fn on_editing(&self, path: &str) {
        println!("  editing {path}");
    }

    fn on_progress(&self, status: &str) {
        println!("[{status}]");
    }

    fn on_ask(&self, question: &str) {
        println!("\nThe assistant needs input:\n  {question}");
    }

    fn on_summary(&self, lines: &str, files: &[String]) {
        println!("\n{lines}");
        if !files.is_empty() {
            println!("\nModified files:");
            for file in files {
                println!("  {file}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codequill=warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Run {
            task,
            model,
            no_memory,
        } => run_task(config, task.join(" "), model, no_memory).await,
        Command::Memory { action } => memory_command(config, action).await,
    }
}

fn build_provider(config: &AppConfig) -> Arc<OpenAiCompatProvider> {
    Arc::new(OpenAiCompatProvider::new(
        "openai-compat",
        &config.api_url,
        config.api_key.clone().unwrap_or_else(|| "ollama".into()),
        &config.embedding_model,
    ))
}

fn open_store(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Arc<SimilarityStore> {
    Arc::new(SimilarityStore::open(
        config.memory.index_path.clone(),
        embedder,
        config.memory.capacity,
        config.memory.min_content_len,
    ))
}

async fn run_task(
    config: AppConfig,
    task: String,
    model: Option<String>,
    no_memory: bool,
) -> anyhow::Result<()> {
    let provider = build_provider(&config);
    let registry = Arc::new(default_registry(config.backup_dir.clone(), None));
    let model = model.unwrap_or_else(|| config.model.clone());

    let short_term = ShortTermMemory::open(config.memory.short_term_path.clone(), SHORT_TERM_LIMIT);
    let task_with_context = if no_memory {
        task.clone()
    } else {
        seed_task(&short_term, &task)
    };

    let mut runner = TaskRunner::new(provider.clone(), registry, config.runner, &model)
        .with_sampling(config.temperature, Some(config.max_tokens))
        .with_hooks(Arc::new(TerminalHooks))
        .with_recall_limit(config.memory.recall_limit);
    if !no_memory {
        runner = runner.with_memory(open_store(&config, provider));
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            signal_token.cancel();
        }
    });

    let outcome = runner.run(&task_with_context, cancel).await;

    match &outcome {
        RunOutcome::Completed { summary, .. } => {
            if !no_memory {
                if let Err(e) = short_term.record(&task, summary) {
                    debug!(error = %e, "Could not record exchange");
                }
            }
            Ok(())
        }
        RunOutcome::PartialCompletion { summary, .. } => {
            if !no_memory {
                if let Err(e) = short_term.record(&task, summary) {
                    debug!(error = %e, "Could not record exchange");
                }
            }
            Ok(())
        }
        RunOutcome::Failed { reason, modified_files } => {
            if !modified_files.is_empty() {
                eprintln!("Files touched before the failure:");
                for file in modified_files {
                    eprintln!("  {file}");
                }
            }
            anyhow::bail!("run failed: {reason}");
        }
        RunOutcome::Cancelled => {
            eprintln!("Run cancelled.");
            std::process::exit(130);
        }
    }
}

/// Prefix the task with recent exchanges so consecutive invocations keep
/// some continuity.
fn seed_task(short_term: &ShortTermMemory, task: &str) -> String {
    let exchanges = short_term.load();
    if exchanges.is_empty() {
        return task.to_string();
    }

    let mut text = String::from("Recent work in this project:\n");
    for ex in &exchanges {
        text.push_str(&format!("- {}: {}\n", ex.task, ex.summary));
    }
    text.push_str("\nCurrent task: ");
    text.push_str(task);
    text
}

async fn memory_command(config: AppConfig, action: MemoryAction) -> anyhow::Result<()> {
    let provider = build_provider(&config);
    let store = open_store(&config, provider);

    match action {
        MemoryAction::List => {
            let entries = store.entries().await;
            if entries.is_empty() {
                println!("No memories stored.");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "[{} | {}] {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.source,
                    entry.content
                );
            }
        }
        MemoryAction::Recall { query, limit } => {
            let hits = store.recall(&query.join(" "), limit).await;
            if hits.is_empty() {
                println!("Nothing recalled (is the embedding endpoint up?).");
                return Ok(());
            }
            for hit in hits {
                println!("[score {:.2}] {}", hit.score, hit.content);
            }
        }
        MemoryAction::Clear => {
            store.clear().await.context("clearing the memory index")?;
            println!("Memory cleared.");
        }
    }
    Ok(())
}
