//! # Plugin Registry - Named Kernel Extensions
//!
//! Plugins extend the kernel with optional subsystems. Registration is
//! fail-fast on duplicate names; stop and health hooks are optional with
//! healthy defaults.

use crate::types::{KernelError, KernelResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A named kernel extension
#[async_trait]
pub trait KernelPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called during kernel shutdown
    async fn stop(&self) {}

    /// Absence of an override means healthy
    async fn health_check(&self) -> bool {
        true
    }
}

/// Registry of unique-named plugins
pub struct PluginRegistry {
    plugins: RwLock<Vec<Arc<dyn KernelPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Register a plugin; duplicate names are rejected outright
    pub async fn register(&self, plugin: Arc<dyn KernelPlugin>) -> KernelResult<()> {
        let mut plugins = self.plugins.write().await;
        if plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(KernelError::DuplicatePlugin(plugin.name().to_string()));
        }
        info!(plugin = plugin.name(), "plugin registered");
        plugins.push(plugin);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }

    pub async fn names(&self) -> Vec<String> {
        self.plugins
            .read()
            .await
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Run every plugin's health hook
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let plugins: Vec<Arc<dyn KernelPlugin>> = self.plugins.read().await.clone();
        let mut results = HashMap::new();
        for plugin in plugins {
            let healthy = plugin.health_check().await;
            if !healthy {
                warn!(plugin = plugin.name(), "plugin unhealthy");
            }
            results.insert(plugin.name().to_string(), healthy);
        }
        results
    }

    /// Stop every plugin in registration order
    pub async fn stop_all(&self) {
        let plugins: Vec<Arc<dyn KernelPlugin>> = self.plugins.read().await.clone();
        for plugin in plugins {
            info!(plugin = plugin.name(), "stopping plugin");
            plugin.stop().await;
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestPlugin {
        name: String,
        healthy: bool,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl KernelPlugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        async fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        async fn health_check(&self) -> bool {
            self.healthy
        }
    }

    fn plugin(name: &str, healthy: bool) -> (Arc<TestPlugin>, Arc<AtomicBool>) {
        let stopped = Arc::new(AtomicBool::new(false));
        (
            Arc::new(TestPlugin {
                name: name.to_string(),
                healthy,
                stopped: Arc::clone(&stopped),
            }),
            stopped,
        )
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let registry = PluginRegistry::new();
        let (first, _) = plugin("metrics", true);
        let (second, _) = plugin("metrics", true);

        registry.register(first).await.unwrap();
        assert!(matches!(
            registry.register(second).await,
            Err(KernelError::DuplicatePlugin(_))
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_health_check_all() {
        let registry = PluginRegistry::new();
        let (good, _) = plugin("good", true);
        let (bad, _) = plugin("bad", false);
        registry.register(good).await.unwrap();
        registry.register(bad).await.unwrap();

        let results = registry.health_check_all().await;
        assert_eq!(results["good"], true);
        assert_eq!(results["bad"], false);
    }

    #[tokio::test]
    async fn test_stop_all() {
        let registry = PluginRegistry::new();
        let (p, stopped) = plugin("p", true);
        registry.register(p).await.unwrap();

        registry.stop_all().await;
        assert!(stopped.load(Ordering::SeqCst));
    }
}
