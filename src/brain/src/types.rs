//! # Brain Types - LLM Routing Data Structures
//!
//! Request options, responses and the error enum for the LLM router, plus the
//! `DailyTokenSource` seam consumed by the swarm budget when the router is the
//! authoritative token counter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options accepted by [`crate::LlmRouter::think`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkOptions {
    /// Task complexity in `[1, 10]`; routes to a capable provider
    pub complexity: u8,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl Default for ThinkOptions {
    fn default() -> Self {
        Self {
            complexity: 5,
            max_tokens: None,
            temperature: None,
            system_prompt: None,
        }
    }
}

impl ThinkOptions {
    pub fn with_complexity(complexity: u8) -> Self {
        Self {
            complexity,
            ..Default::default()
        }
    }
}

/// Response from a routed completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub cached: bool,
}

/// Raw completion handed back by a provider before routing metadata is added
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    pub content: String,
    pub tokens_used: u64,
}

/// Source of truth for "tokens consumed today"
///
/// The router implements this; the swarm budget consumes it when present so
/// daily accounting has exactly one owner.
#[async_trait]
pub trait DailyTokenSource: Send + Sync {
    async fn daily_tokens_used(&self) -> u64;
}

/// Error types for the routing layer
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    #[error("no available provider for complexity {0}")]
    NoProvider(u8),

    #[error("daily budget exhausted: {used} of {cap} tokens")]
    DailyBudgetExhausted { used: u64, cap: u64 },

    #[error("provider failure: {0}")]
    ProviderFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for routing operations
pub type BrainResult<T> = Result<T, BrainError>;

/// Configuration recognised by the router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Time a cached response stays servable
    pub cache_ttl_secs: u64,
    /// Hard cap on tokens spent per day; `None` disables the gate
    pub daily_token_cap: Option<u64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            daily_token_cap: None,
        }
    }
}
