//! # Metric Bus - Ring-Buffered Events with Pattern Subscriptions
//!
//! An in-memory bus for dotted metric events. The buffer is ring-bounded
//! (oldest evicted first); subscribers register glob-lite patterns (`*`,
//! `prefix.*`, or an exact name) and are notified synchronously on emit.
//! Snapshots group buffered events by their first dotted segment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One emitted metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    pub name: String,
    pub value: f64,
    pub tags: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

type MetricHandler = Arc<dyn Fn(&MetricEvent) + Send + Sync>;

struct BusInner {
    events: VecDeque<MetricEvent>,
    subscriptions: Vec<(String, MetricHandler)>,
}

/// In-memory metric bus
pub struct MetricBus {
    capacity: usize,
    inner: RwLock<BusInner>,
}

impl MetricBus {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(BusInner {
                events: VecDeque::new(),
                subscriptions: Vec::new(),
            }),
        }
    }

    /// Append an event and notify matching subscribers
    pub async fn emit(&self, name: impl Into<String>, value: f64, tags: HashMap<String, String>) {
        let event = MetricEvent {
            name: name.into(),
            value,
            tags,
            timestamp: Utc::now(),
        };

        let handlers: Vec<MetricHandler> = {
            let mut inner = self.inner.write().await;
            if inner.events.len() >= self.capacity {
                inner.events.pop_front();
            }
            inner.events.push_back(event.clone());

            inner
                .subscriptions
                .iter()
                .filter(|(pattern, _)| Self::matches(pattern, &event.name))
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in handlers {
            handler(&event);
        }
    }

    /// Subscribe to events whose name matches `pattern`
    pub async fn on<F>(&self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&MetricEvent) + Send + Sync + 'static,
    {
        self.inner
            .write()
            .await
            .subscriptions
            .push((pattern.into(), Arc::new(handler)));
    }

    fn matches(pattern: &str, name: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix(".*") {
            return name.starts_with(&format!("{prefix}."));
        }
        pattern == name
    }

    /// Buffered events grouped by their first dotted segment
    pub async fn snapshot(&self) -> HashMap<String, Vec<MetricEvent>> {
        let inner = self.inner.read().await;
        let mut grouped: HashMap<String, Vec<MetricEvent>> = HashMap::new();
        for event in &inner.events {
            let group = event
                .name
                .split('.')
                .next()
                .unwrap_or(&event.name)
                .to_string();
            grouped.entry(group).or_default().push(event.clone());
        }
        grouped
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.events.is_empty()
    }
}

impl Default for MetricBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample emitted after each routed completion
#[derive(Debug, Clone)]
pub struct BrainSample {
    pub tokens_used: u64,
    pub provider: String,
    pub latency_ms: u64,
    pub cached: bool,
}

/// Emit the router's per-completion metrics
pub async fn emit_brain_metrics(bus: &MetricBus, sample: &BrainSample) {
    let tags: HashMap<String, String> =
        [("provider".to_string(), sample.provider.clone())].into();

    bus.emit("brain.tokens_used", sample.tokens_used as f64, tags.clone())
        .await;
    bus.emit("brain.latency", sample.latency_ms as f64, tags.clone())
        .await;
    if sample.cached {
        bus.emit("brain.cache_hit", 1.0, tags).await;
    }
}

/// Sample emitted on each agent spawn
#[derive(Debug, Clone)]
pub struct SwarmSample {
    pub role: String,
    pub budget_remaining: u64,
}

/// Emit the swarm's per-spawn metrics
pub async fn emit_swarm_metrics(bus: &MetricBus, sample: &SwarmSample) {
    let tags: HashMap<String, String> = [("role".to_string(), sample.role.clone())].into();

    bus.emit("swarm.agent_spawned", 1.0, tags.clone()).await;
    bus.emit("swarm.budget_remaining", sample.budget_remaining as f64, tags)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_ring_buffer_evicts_oldest() {
        let bus = MetricBus::with_capacity(3);
        for i in 0..5 {
            bus.emit(format!("m.{i}"), i as f64, HashMap::new()).await;
        }

        assert_eq!(bus.len().await, 3);
        let snapshot = bus.snapshot().await;
        let names: Vec<String> = snapshot["m"].iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["m.2", "m.3", "m.4"]);
    }

    #[tokio::test]
    async fn test_pattern_matching() {
        assert!(MetricBus::matches("*", "anything.at.all"));
        assert!(MetricBus::matches("brain.*", "brain.tokens_used"));
        assert!(!MetricBus::matches("brain.*", "brainstorm"));
        assert!(!MetricBus::matches("brain.*", "swarm.spawned"));
        assert!(MetricBus::matches("exact.name", "exact.name"));
        assert!(!MetricBus::matches("exact.name", "exact.name.deeper"));
    }

    #[tokio::test]
    async fn test_subscriptions_notified() {
        let bus = MetricBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = Arc::clone(&seen);
            bus.on("brain.*", move |event| {
                seen.lock().unwrap().push(event.name.clone());
            })
            .await;
        }

        bus.emit("brain.latency", 12.0, HashMap::new()).await;
        bus.emit("swarm.agent_spawned", 1.0, HashMap::new()).await;

        assert_eq!(*seen.lock().unwrap(), vec!["brain.latency"]);
    }

    #[tokio::test]
    async fn test_snapshot_groups_by_prefix() {
        let bus = MetricBus::new();
        bus.emit("brain.latency", 1.0, HashMap::new()).await;
        bus.emit("brain.tokens_used", 2.0, HashMap::new()).await;
        bus.emit("swarm.agent_spawned", 1.0, HashMap::new()).await;

        let snapshot = bus.snapshot().await;
        assert_eq!(snapshot["brain"].len(), 2);
        assert_eq!(snapshot["swarm"].len(), 1);
    }

    #[tokio::test]
    async fn test_brain_collector() {
        let bus = MetricBus::new();
        emit_brain_metrics(
            &bus,
            &BrainSample {
                tokens_used: 100,
                provider: "echo".to_string(),
                latency_ms: 40,
                cached: true,
            },
        )
        .await;

        let snapshot = bus.snapshot().await;
        let names: Vec<&str> = snapshot["brain"].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["brain.tokens_used", "brain.latency", "brain.cache_hit"]);
    }

    #[tokio::test]
    async fn test_swarm_collector_skips_nothing() {
        let bus = MetricBus::new();
        emit_swarm_metrics(
            &bus,
            &SwarmSample {
                role: "coder".to_string(),
                budget_remaining: 4000,
            },
        )
        .await;

        let snapshot = bus.snapshot().await;
        assert_eq!(snapshot["swarm"].len(), 2);
        assert_eq!(snapshot["swarm"][0].tags["role"], "coder");
    }
}
