//! # Providers - Pluggable Completion Backends
//!
//! A provider declares the maximum task complexity it can handle and an
//! availability probe; the router cascades across registered providers by
//! declared capability. Concrete network transports live outside the core;
//! the in-process providers here back tests, demos and offline operation.

use crate::types::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// A completion backend registered with the router
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    /// Highest complexity (1-10) this provider should be handed
    fn max_complexity(&self) -> u8;
    /// Liveness probe consulted before every attempt
    async fn is_available(&self) -> bool;
    async fn complete(&self, prompt: &str, options: &ThinkOptions) -> BrainResult<ProviderCompletion>;
}

/// Deterministic in-process provider
///
/// Echoes a digest of the prompt back and charges roughly one token per four
/// prompt characters. Used for offline operation and as the test double.
pub struct EchoProvider {
    name: String,
    model: String,
    max_complexity: u8,
    available: AtomicBool,
}

impl EchoProvider {
    pub fn new(name: impl Into<String>, max_complexity: u8) -> Self {
        let name = name.into();
        Self {
            model: format!("{name}-echo"),
            name,
            max_complexity,
            available: AtomicBool::new(true),
        }
    }

    /// Flip the availability probe; lets tests exercise the cascade
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_complexity(&self) -> u8 {
        self.max_complexity
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &ThinkOptions,
    ) -> BrainResult<ProviderCompletion> {
        let preview: String = prompt.chars().take(60).collect();
        Ok(ProviderCompletion {
            content: format!("[{}] {}", self.name, preview),
            tokens_used: (prompt.len() as u64 / 4).max(1),
        })
    }
}

/// Provider that fails a configured number of times before succeeding
///
/// Exercises the router's swallow-and-fall-through failure semantics.
pub struct FlakyProvider {
    inner: EchoProvider,
    failures_remaining: AtomicU32,
}

impl FlakyProvider {
    pub fn new(name: impl Into<String>, max_complexity: u8, failures: u32) -> Self {
        Self {
            inner: EchoProvider::new(name, max_complexity),
            failures_remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Provider for FlakyProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn max_complexity(&self) -> u8 {
        self.inner.max_complexity()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &ThinkOptions,
    ) -> BrainResult<ProviderCompletion> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(BrainError::ProviderFailure(format!(
                "{} transient failure",
                self.name()
            )));
        }
        self.inner.complete(prompt, options).await
    }
}
