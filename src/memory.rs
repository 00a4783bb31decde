//! # Memory Store - Collaborator Contract and In-Process Stub
//!
//! Persistent memory backends (vector stores, full-text indexes) live
//! outside the core. The core only requires relevance-ordered search and a
//! stats snapshot; the in-process store below backs demos, tests and
//! single-node operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One search hit, relevance in `[0, 1]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub content: String,
    pub relevance: f64,
}

/// Store-level statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub bytes: usize,
}

/// Contract consumed by the core; backends are collaborator concerns
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Vec<MemoryHit>;
    async fn stats(&self) -> MemoryStats;
    async fn insert(&self, content: String);
}

/// Process-local store with word-overlap relevance scoring
pub struct InMemoryStore {
    entries: RwLock<Vec<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn score(query: &str, entry: &str) -> f64 {
        let query_lower = query.to_lowercase();
        let entry_lower = entry.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return 0.0;
        }
        let hits = terms
            .iter()
            .filter(|term| entry_lower.contains(**term))
            .count();
        hits as f64 / terms.len() as f64
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn search(&self, query: &str, limit: usize) -> Vec<MemoryHit> {
        let entries = self.entries.read().await;
        let mut hits: Vec<MemoryHit> = entries
            .iter()
            .map(|entry| MemoryHit {
                content: entry.clone(),
                relevance: Self::score(query, entry),
            })
            .filter(|hit| hit.relevance > 0.0)
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        hits
    }

    async fn stats(&self) -> MemoryStats {
        let entries = self.entries.read().await;
        MemoryStats {
            entries: entries.len(),
            bytes: entries.iter().map(String::len).sum(),
        }
    }

    async fn insert(&self, content: String) {
        self.entries.write().await.push(content);
    }
}
