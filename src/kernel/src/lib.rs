//! # Aegis Kernel - Lifecycle, Events, Plugins and Health
//!
//! The kernel owns process-wide concerns: bootstrap configuration, the typed
//! event bus, the plugin registry, the watchdog with its safe-mode latch,
//! context health monitoring, the metric bus, and the unified task pipeline.
//!
//! ## Lifecycle
//!
//! `start()` must run before any operation; `stop()` tears plugins down in
//! registration order. Mode changes and config reloads are broadcast on the
//! event bus so subsystems can adapt without polling.

pub mod context_health;
pub mod event_bus;
pub mod metric_bus;
pub mod pipeline;
pub mod plugin;
pub mod types;
pub mod watchdog;

pub use context_health::{
    ContextHealthConfig, ContextHealthMonitor, ContextHealthReport, ContextSample,
    ContextVersionInfo, FullHealthReport, HealthDashboard, SelfCheck,
};
pub use event_bus::{EventBus, EventKind, HandlerId, KernelEvent};
pub use metric_bus::{
    emit_brain_metrics, emit_swarm_metrics, BrainSample, MetricBus, MetricEvent, SwarmSample,
};
pub use pipeline::{PipelineOutcome, PipelineStatus, StructuredTask, TaskType, UnifiedPipeline};
pub use plugin::{KernelPlugin, PluginRegistry};
pub use types::*;
pub use watchdog::{WatchTarget, Watchdog, WatchdogConfig};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;

/// Process-wide kernel: configuration, events, plugins, lifecycle
pub struct Kernel {
    config: RwLock<KernelConfig>,
    event_bus: Arc<EventBus>,
    plugins: PluginRegistry,
    running: AtomicBool,
    started_at: RwLock<Option<Instant>>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config: RwLock::new(config),
            event_bus: Arc::new(EventBus::new()),
            plugins: PluginRegistry::new(),
            running: AtomicBool::new(false),
            started_at: RwLock::new(None),
        }
    }

    pub async fn start(&self) {
        *self.started_at.write().await = Some(Instant::now());
        self.running.store(true, Ordering::SeqCst);
        let name = self.config.read().await.name.clone();
        info!(kernel = %name, "🚀 kernel started");
        self.log(LogLevel::Info, format!("kernel {name} started")).await;
    }

    /// Stop every plugin, then the kernel itself
    pub async fn stop(&self) {
        self.plugins.stop_all().await;
        self.running.store(false, Ordering::SeqCst);
        info!("🛑 kernel stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn register_plugin(&self, plugin: Arc<dyn KernelPlugin>) -> KernelResult<()> {
        self.plugins.register(plugin).await
    }

    /// Per-plugin health; a plugin without a hook reports healthy
    pub async fn health_check(&self) -> HashMap<String, bool> {
        self.plugins.health_check_all().await
    }

    pub async fn set_mode(&self, mode: KernelMode) {
        {
            self.config.write().await.mode = mode;
        }
        self.event_bus
            .dispatch(KernelEvent::ConfigReload { mode })
            .await;
        info!(?mode, "kernel mode changed");
    }

    /// Apply a partial configuration and broadcast the reload
    pub async fn reload_config(&self, patch: KernelConfigPatch) {
        let mode = {
            let mut config = self.config.write().await;
            if let Some(mode) = patch.mode {
                config.mode = mode;
            }
            if let Some(max_per_hour) = patch.max_tokens_per_hour {
                config.token_budget.max_per_hour = max_per_hour;
            }
            config.mode
        };

        self.event_bus
            .dispatch(KernelEvent::ConfigReload { mode })
            .await;
        info!("configuration reloaded");
    }

    pub async fn config(&self) -> KernelConfig {
        self.config.read().await.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Dispatch a redacted log event on the bus
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.event_bus
            .dispatch(KernelEvent::Log {
                level,
                message: message.into(),
            })
            .await;
    }

    pub async fn get_status(&self) -> KernelStatus {
        let config = self.config.read().await;
        let uptime_seconds = self
            .started_at
            .read()
            .await
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0);

        KernelStatus {
            name: config.name.clone(),
            version: config.version.clone(),
            mode: config.mode,
            running: self.is_running(),
            plugin_count: self.plugins.len().await,
            uptime_seconds,
        }
    }
}

impl Kernel {
    /// Convenience constructor used by tests and the boot binary
    pub fn with_defaults() -> Self {
        Self::new(KernelConfig::default())
    }
}
