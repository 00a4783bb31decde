//! # Shared Context - Append-Only Result Store and Summary Projector
//!
//! Every agent in a DAG shares one context: an immutable task description, an
//! append-only map of agent results with a strictly increasing version, an
//! optional codebase-map projection, and a small memory cache. Agents never
//! see raw sibling results; they receive a compact summary projection sized
//! for their prompt window.
//!
//! Waves isolate generations of work: a wave context is a fresh store seeded
//! only with a compressed summary of its parent, so no parent results leak
//! across the boundary.

use crate::types::AgentResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// One retrieved memory available to agents via the summary projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub content: String,
    pub relevance: f64,
}

/// Per-agent transfer DTO derived purely from the shared context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: String,
    pub source_agent: String,
    pub input_data: Value,
    pub intermediate_results: Vec<IntermediateResult>,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateResult {
    pub agent_id: String,
    pub role: String,
    pub summary: String,
}

#[derive(Debug, Default)]
struct ContextInner {
    results: HashMap<String, AgentResult>,
    order: Vec<String>,
    version: u64,
    codebase_map: Option<String>,
    memory: Vec<MemoryEntry>,
    memory_version: u64,
}

/// Append-only store shared by all agents of one DAG
pub struct SharedContext {
    id: Uuid,
    task_description: String,
    inner: RwLock<ContextInner>,
}

impl SharedContext {
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_description: task_description.into(),
            inner: RwLock::new(ContextInner::default()),
        }
    }

    pub fn task_description(&self) -> &str {
        &self.task_description
    }

    /// Append an agent result; returns the new context version
    ///
    /// Results are never removed or mutated afterwards.
    pub async fn add_result(
        &self,
        agent_id: impl Into<String>,
        role: impl Into<String>,
        output: Value,
        tokens_used: u64,
    ) -> u64 {
        let agent_id = agent_id.into();
        let mut inner = self.inner.write().await;

        if !inner.results.contains_key(&agent_id) {
            inner.order.push(agent_id.clone());
        }
        inner.results.insert(
            agent_id.clone(),
            AgentResult {
                agent_id: agent_id.clone(),
                role: role.into(),
                output,
                tokens_used,
                timestamp: Utc::now(),
            },
        );
        inner.version += 1;
        debug!(agent_id = %agent_id, version = inner.version, "result appended");
        inner.version
    }

    pub async fn get_result(&self, agent_id: &str) -> Option<AgentResult> {
        self.inner.read().await.results.get(agent_id).cloned()
    }

    /// All results in append order
    pub async fn results(&self) -> Vec<AgentResult> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.results.get(id))
            .cloned()
            .collect()
    }

    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    /// Compact projection for one agent, excluding its own result
    pub async fn get_summary_for(&self, agent_id: &str, max_length: usize) -> String {
        self.project(Some(agent_id), max_length).await
    }

    /// Compact projection over every result
    pub async fn summarize(&self, max_length: usize) -> String {
        self.project(None, max_length).await
    }

    async fn project(&self, exclude: Option<&str>, max_length: usize) -> String {
        let inner = self.inner.read().await;
        let mut lines = vec![truncate(&self.task_description, 100)];

        for id in &inner.order {
            if Some(id.as_str()) == exclude {
                continue;
            }
            if let Some(result) = inner.results.get(id) {
                let output = match &result.output {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                lines.push(format!("[{}] {}", result.role, truncate(&output, 150)));
            }
        }

        if !inner.memory.is_empty() {
            lines.push("memory:".to_string());
            for entry in &inner.memory {
                lines.push(format!(
                    "  ({:.1}) {}",
                    entry.relevance,
                    truncate(&entry.content, 150)
                ));
            }
        }

        truncate(&lines.join("\n"), max_length)
    }

    /// Build the transfer DTO for a downstream consumer
    pub async fn create_task_context(&self, source_agent: &str, input_data: Value) -> TaskContext {
        let inner = self.inner.read().await;
        let intermediate_results = inner
            .order
            .iter()
            .filter_map(|id| inner.results.get(id))
            .map(|r| IntermediateResult {
                agent_id: r.agent_id.clone(),
                role: r.role.clone(),
                summary: truncate(
                    &match &r.output {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                    150,
                ),
            })
            .collect();

        TaskContext {
            task_id: self.id.to_string(),
            source_agent: source_agent.to_string(),
            input_data,
            intermediate_results,
            errors: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Store the codebase-map projection; a second call overwrites
    pub async fn inject_codebase_map(&self, summary: impl Into<String>) {
        self.inner.write().await.codebase_map = Some(summary.into());
    }

    pub async fn get_codebase_map(&self) -> Option<String> {
        self.inner.read().await.codebase_map.clone()
    }

    pub async fn add_memory(&self, content: impl Into<String>, relevance: f64) {
        let mut inner = self.inner.write().await;
        inner.memory.push(MemoryEntry {
            content: content.into(),
            relevance,
        });
        inner.memory_version += 1;
    }

    pub async fn memory_cache(&self) -> Vec<MemoryEntry> {
        self.inner.read().await.memory.clone()
    }

    /// Create an isolated context for a new wave
    ///
    /// The child's memory cache is seeded with a single full-relevance entry
    /// holding the parent's summary; no parent results are carried over.
    pub async fn create_wave_context(parent: &SharedContext, wave_id: u32) -> SharedContext {
        let child = SharedContext::new(format!("[Wave {wave_id}] {}", parent.task_description));
        let parent_summary = parent.summarize(500).await;
        child.add_memory(parent_summary, 1.0).await;
        child
    }
}

/// Progressively compress a context into a bounded summary
///
/// Tokens are estimated at one per four characters. A full summary is
/// produced first; only when its estimate exceeds `max_tokens` is the
/// tighter bound of roughly `3 × max_tokens` characters requested.
/// Compression never mutates the context.
pub async fn compress_context(ctx: &SharedContext, max_tokens: usize) -> String {
    compress_context_with(ctx, max_tokens, |text| text.len() / 4).await
}

/// [`compress_context`] with a caller-supplied token estimator
pub async fn compress_context_with<F>(ctx: &SharedContext, max_tokens: usize, estimate: F) -> String
where
    F: Fn(&str) -> usize,
{
    let full = ctx.summarize(10_000).await;
    if estimate(&full) <= max_tokens {
        return full;
    }
    ctx.summarize(max_tokens * 3).await
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
