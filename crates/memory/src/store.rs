//! The durable similarity store — an append-only JSONL index with
//! brute-force cosine recall.
//!
//! Recall is O(n) per query over the full corpus with no index structure.
//! That is a deliberate simplicity tradeoff while the corpus is small; the
//! capacity bound keeps n from growing past low thousands.
//!
//! Storage assumes single-process, single-run access. Concurrent
//! multi-process writers are out of scope.

use chrono::{DateTime, Utc};
use codequill_core::error::MemoryError;
use codequill_core::provider::Embedder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::vector::cosine_similarity;

/// A durable context fragment. Append-only — never updated or deleted
/// individually (capacity eviction drops whole oldest entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique ID for this memory
    pub id: String,

    /// The remembered content
    pub content: String,

    /// Embedding vector from the external provider
    pub embedding: Vec<f32>,

    /// Where this memory came from (e.g. "conversation", "task")
    pub source: String,

    /// When this memory was created
    pub created_at: DateTime<Utc>,
}

/// One recall hit: content annotated with its stored timestamp and score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recalled {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub score: f32,
}

/// The similarity memory store.
///
/// Entries are loaded into memory on open and flushed to disk on every
/// append. Both `remember` and `recall` degrade to no-ops when the
/// embedding provider is unavailable.
pub struct SimilarityStore {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    capacity: usize,
    min_content_len: usize,
}

impl SimilarityStore {
    /// Open (or create) the store at `path`.
    pub fn open(
        path: PathBuf,
        embedder: Arc<dyn Embedder>,
        capacity: usize,
        min_content_len: usize,
    ) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "Similarity store loaded");
        Self {
            path,
            embedder,
            entries: Arc::new(RwLock::new(entries)),
            capacity,
            min_content_len,
        }
    }

    /// Load entries from a JSONL file, skipping corrupted lines.
    fn load_from_disk(path: &PathBuf) -> Vec<MemoryEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // File doesn't exist yet — start empty
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory entry");
                    None
                }
            })
            .collect()
    }

    /// Flush all entries to disk as JSONL.
    async fn flush(&self) -> Result<(), MemoryError> {
        let entries = self.entries.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries.iter() {
            let line = serde_json::to_string(entry).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))
    }

    /// Remember `content` tagged with `source`.
    ///
    /// Silently drops content shorter than the minimum length (noise) and
    /// entries the provider returns no vector for. Appending past capacity
    /// evicts the oldest entries first.
    pub async fn remember(&self, content: &str, source: &str) {
        let content = content.trim();
        if content.len() < self.min_content_len {
            return;
        }

        let embedding = match self.embedder.embed(content).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, dropping memory");
                return;
            }
        };

        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            embedding,
            source: source.to_string(),
            created_at: Utc::now(),
        };

        {
            let mut entries = self.entries.write().await;
            entries.push(entry);
            if entries.len() > self.capacity {
                let excess = entries.len() - self.capacity;
                entries.drain(0..excess);
            }
        }

        if let Err(e) = self.flush().await {
            warn!(error = %e, "Failed to persist memory index");
        }
    }

    /// Recall the top-`k` entries most similar to `query`.
    ///
    /// Returns an empty list when the query embedding is unavailable.
    pub async fn recall(&self, query: &str, k: usize) -> Vec<Recalled> {
        let query_embedding = match self.embedder.embed(query).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Embedding unavailable, recall returns nothing");
                return Vec::new();
            }
        };

        let entries = self.entries.read().await;
        let mut scored: Vec<Recalled> = entries
            .iter()
            .map(|e| Recalled {
                content: e.content.clone(),
                created_at: e.created_at,
                score: cosine_similarity(&e.embedding, &query_embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All stored entries, oldest first. Used by the CLI listing.
    pub async fn entries(&self) -> Vec<MemoryEntry> {
        self.entries.read().await.clone()
    }

    /// Drop every entry and truncate the index file.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        self.entries.write().await.clear();
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codequill_core::error::ProviderError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Embeds text as a deterministic 4-dim vector from byte statistics so
    /// identical strings embed identically.
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
                bytes.last().copied().unwrap_or(0) as f32,
            ])
        }
    }

    /// An embedder that is always down.
    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn temp_path() -> PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        path
    }

    fn store_at(path: PathBuf) -> SimilarityStore {
        SimilarityStore::open(path, Arc::new(StubEmbedder), 100, 10)
    }

    #[tokio::test]
    async fn remember_then_recall_roundtrip() {
        let store = store_at(temp_path());
        store
            .remember("The project uses tokio for async runtime", "test")
            .await;

        let hits = store.recall("The project uses tokio for async runtime", 1).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "The project uses tokio for async runtime");
        // Self-similarity ≈ 1.0 within float tolerance
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn recall_is_idempotent() {
        let store = store_at(temp_path());
        store.remember("Alpha entry about parsing code", "test").await;
        store.remember("Beta entry about shell safety", "test").await;

        let first = store.recall("parsing", 5).await;
        let second = store.recall("parsing", 5).await;
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.score, b.score);
        }
    }

    #[tokio::test]
    async fn short_content_is_dropped() {
        let store = store_at(temp_path());
        store.remember("tiny", "test").await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn down_embedder_degrades_to_noop() {
        let path = temp_path();
        let store = SimilarityStore::open(path, Arc::new(DownEmbedder), 100, 10);

        store.remember("This entry will not be stored anywhere", "test").await;
        assert!(store.is_empty().await);

        let hits = store.recall("anything", 3).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let path = temp_path();
        let store = SimilarityStore::open(path, Arc::new(StubEmbedder), 3, 10);

        for i in 0..5 {
            store
                .remember(&format!("entry number {i} padded for length"), "test")
                .await;
        }

        assert_eq!(store.len().await, 3);
        let entries = store.entries().await;
        assert!(entries[0].content.contains("number 2"));
        assert!(entries[2].content.contains("number 4"));
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let path = temp_path();
        {
            let store = store_at(path.clone());
            store.remember("A durable fact about the codebase", "test").await;
        }

        let store2 = store_at(path);
        assert_eq!(store2.len().await, 1);
        let hits = store2.recall("A durable fact about the codebase", 1).await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn skips_corrupted_lines_on_load() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"id":"1","content":"valid entry one","embedding":[1.0,0.0],"source":"t","created_at":"2026-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(tmp, "not json at all").unwrap();
        let path = tmp.path().to_path_buf();

        let store = store_at(path);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clear_truncates_file() {
        let path = temp_path();
        let store = store_at(path.clone());
        store.remember("Something worth remembering here", "test").await;
        store.clear().await.unwrap();

        assert!(store.is_empty().await);
        let reopened = store_at(path);
        assert!(reopened.is_empty().await);
    }
}
