//! # LLM Router - Complexity Cascade, Caching and Daily Budget
//!
//! The router is the single authoritative token counter in the core. It
//! selects providers by declared capability, serves repeated prompts from a
//! TTL cache, and refuses all work once the daily token cap is reached.
//!
//! ## Selection
//!
//! Providers are kept sorted by `max_complexity` descending. A request with
//! complexity N is handed to the first *available* provider whose declared
//! ceiling covers N; a provider exception is swallowed and the cascade falls
//! through to the next candidate. Per-provider retries and timeouts are the
//! provider's own concern.

use crate::provider::Provider;
use crate::types::*;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

struct CacheEntry {
    response: LlmResponse,
    expires_at: Instant,
}

/// Cascading router over registered providers
pub struct LlmRouter {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_ttl: Duration,
    daily_token_cap: Option<u64>,
    tokens_today: RwLock<u64>,
}

impl LlmRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            daily_token_cap: config.daily_token_cap,
            tokens_today: RwLock::new(0),
        }
    }

    /// Register a provider; the cascade order is re-derived on insert
    pub async fn register(&self, provider: Arc<dyn Provider>) {
        let mut providers = self.providers.write().await;
        info!(
            provider = provider.name(),
            max_complexity = provider.max_complexity(),
            "provider registered"
        );
        providers.push(provider);
        providers.sort_by(|a, b| b.max_complexity().cmp(&a.max_complexity()));
    }

    pub async fn provider_count(&self) -> usize {
        self.providers.read().await.len()
    }

    /// Route a prompt to a capable provider
    ///
    /// Checks the cache, then the daily cap, then cascades providers by
    /// declared complexity ceiling. The granted response is cached under a
    /// digest of prompt and options.
    pub async fn think(&self, prompt: &str, options: &ThinkOptions) -> BrainResult<LlmResponse> {
        let key = Self::cache_key(prompt, options);

        if let Some(hit) = self.cache_lookup(&key).await {
            debug!(provider = %hit.provider, "cache hit");
            return Ok(hit);
        }

        if let Some(cap) = self.daily_token_cap {
            let used = *self.tokens_today.read().await;
            if used >= cap {
                warn!(used, cap, "daily budget exhausted");
                return Err(BrainError::DailyBudgetExhausted { used, cap });
            }
        }

        let candidates: Vec<Arc<dyn Provider>> = self
            .providers
            .read()
            .await
            .iter()
            .filter(|p| p.max_complexity() >= options.complexity)
            .cloned()
            .collect();

        for provider in candidates {
            if !provider.is_available().await {
                debug!(provider = provider.name(), "provider unavailable, falling through");
                continue;
            }

            let started = Instant::now();
            match provider.complete(prompt, options).await {
                Ok(completion) => {
                    let response = LlmResponse {
                        content: completion.content,
                        provider: provider.name().to_string(),
                        model: provider.model().to_string(),
                        tokens_used: completion.tokens_used,
                        latency_ms: started.elapsed().as_millis() as u64,
                        cached: false,
                    };

                    *self.tokens_today.write().await += completion.tokens_used;
                    self.cache_store(key, &response).await;

                    debug!(
                        provider = %response.provider,
                        tokens = response.tokens_used,
                        latency_ms = response.latency_ms,
                        "completion routed"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, falling through");
                    continue;
                }
            }
        }

        Err(BrainError::NoProvider(options.complexity))
    }

    /// Tokens spent through this router since process start
    pub async fn tokens_used_today(&self) -> u64 {
        *self.tokens_today.read().await
    }

    /// Drop every cached response
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    async fn cache_lookup(&self, key: &str) -> Option<LlmResponse> {
        let now = Instant::now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(key) {
                if now < entry.expires_at {
                    let mut response = entry.response.clone();
                    response.cached = true;
                    return Some(response);
                }
            } else {
                return None;
            }
        }

        // Expired entry observed under the read lock; evict it.
        self.cache.write().await.remove(key);
        None
    }

    async fn cache_store(&self, key: String, response: &LlmResponse) {
        let entry = CacheEntry {
            response: response.clone(),
            expires_at: Instant::now() + self.cache_ttl,
        };
        self.cache.write().await.insert(key, entry);
    }

    /// Deterministic digest of prompt and options
    fn cache_key(prompt: &str, options: &ThinkOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update([0x1f, options.complexity]);
        if let Some(max_tokens) = options.max_tokens {
            hasher.update(max_tokens.to_le_bytes());
        }
        if let Some(temperature) = options.temperature {
            hasher.update(temperature.to_le_bytes());
        }
        if let Some(system) = &options.system_prompt {
            hasher.update(system.as_bytes());
        }

        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[async_trait]
impl DailyTokenSource for LlmRouter {
    async fn daily_tokens_used(&self) -> u64 {
        self.tokens_used_today().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EchoProvider, FlakyProvider};

    fn router_with_ttl(ttl_secs: u64) -> LlmRouter {
        LlmRouter::new(RouterConfig {
            cache_ttl_secs: ttl_secs,
            daily_token_cap: None,
        })
    }

    #[tokio::test]
    async fn test_routes_to_capable_provider() {
        let router = router_with_ttl(300);
        router.register(Arc::new(EchoProvider::new("small", 3))).await;
        router.register(Arc::new(EchoProvider::new("large", 9))).await;

        let response = router
            .think("plan the migration", &ThinkOptions::with_complexity(7))
            .await
            .unwrap();

        assert_eq!(response.provider, "large");
        assert!(!response.cached);
    }

    #[tokio::test]
    async fn test_no_provider_for_complexity() {
        let router = router_with_ttl(300);
        router.register(Arc::new(EchoProvider::new("small", 3))).await;

        let err = router
            .think("hard problem", &ThinkOptions::with_complexity(9))
            .await
            .unwrap_err();

        assert!(matches!(err, BrainError::NoProvider(9)));
    }

    #[tokio::test]
    async fn test_unavailable_provider_falls_through() {
        let router = router_with_ttl(300);
        let big = Arc::new(EchoProvider::new("big", 10));
        big.set_available(false);
        router.register(big).await;
        router.register(Arc::new(EchoProvider::new("backup", 6))).await;

        let response = router
            .think("p", &ThinkOptions::with_complexity(5))
            .await
            .unwrap();
        assert_eq!(response.provider, "backup");
    }

    #[tokio::test]
    async fn test_provider_error_falls_through() {
        let router = router_with_ttl(300);
        router
            .register(Arc::new(FlakyProvider::new("flaky", 10, 99)))
            .await;
        router.register(Arc::new(EchoProvider::new("steady", 8))).await;

        let response = router
            .think("p", &ThinkOptions::with_complexity(5))
            .await
            .unwrap();
        assert_eq!(response.provider, "steady");
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let router = router_with_ttl(300);
        router.register(Arc::new(EchoProvider::new("echo", 8))).await;
        let opts = ThinkOptions::default();

        let first = router.think("same prompt", &opts).await.unwrap();
        let second = router.think("same prompt", &opts).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.content, second.content);
        // Cached responses never re-charge the daily counter.
        assert_eq!(router.tokens_used_today().await, first.tokens_used);
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let router = LlmRouter::new(RouterConfig {
            cache_ttl_secs: 0,
            daily_token_cap: None,
        });
        router.register(Arc::new(EchoProvider::new("echo", 8))).await;
        let opts = ThinkOptions::default();

        router.think("prompt", &opts).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let again = router.think("prompt", &opts).await.unwrap();

        assert!(!again.cached);
    }

    #[tokio::test]
    async fn test_distinct_options_miss_cache() {
        let router = router_with_ttl(300);
        router.register(Arc::new(EchoProvider::new("echo", 10))).await;

        router
            .think("prompt", &ThinkOptions::with_complexity(3))
            .await
            .unwrap();
        let other = router
            .think("prompt", &ThinkOptions::with_complexity(8))
            .await
            .unwrap();

        assert!(!other.cached);
    }

    #[tokio::test]
    async fn test_daily_cap_blocks_before_providers() {
        let router = LlmRouter::new(RouterConfig {
            cache_ttl_secs: 300,
            daily_token_cap: Some(10),
        });
        router.register(Arc::new(EchoProvider::new("echo", 10))).await;

        // 100 chars => 25 tokens, blowing straight past the cap of 10.
        let long_prompt = "x".repeat(100);
        router.think(&long_prompt, &ThinkOptions::default()).await.unwrap();

        let err = router
            .think("another", &ThinkOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrainError::DailyBudgetExhausted { .. }));
    }

    #[tokio::test]
    async fn test_daily_token_source_reads_router_counter() {
        let router = router_with_ttl(300);
        router.register(Arc::new(EchoProvider::new("echo", 10))).await;
        router.think("some prompt", &ThinkOptions::default()).await.unwrap();

        let source: &dyn DailyTokenSource = &router;
        assert_eq!(source.daily_tokens_used().await, router.tokens_used_today().await);
        assert!(source.daily_tokens_used().await > 0);
    }
}
