//! Similarity-based memory for CodeQuill.
//!
//! Two stores with different lifetimes:
//! - [`SimilarityStore`] — durable (content, embedding) index with
//!   brute-force cosine nearest-neighbor recall.
//! - [`ShortTermMemory`] — bounded file of recent exchanges used to seed
//!   new conversations.
//!
//! Both degrade to no-ops rather than raising when their backing resources
//! (embedding endpoint, disk) are unavailable, so memory failures never
//! abort a run.

pub mod short_term;
pub mod store;
pub mod vector;

pub use short_term::ShortTermMemory;
pub use store::{MemoryEntry, Recalled, SimilarityStore};
pub use vector::cosine_similarity;
