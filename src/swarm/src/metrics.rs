//! # Swarm Metrics - Prometheus Collection for the Execution Engine
//!
//! Counters, gauges and histograms tracking agent spawns, node outcomes and
//! token spend across coordinator runs, with a serialisable snapshot for the
//! gateway's swarm endpoint.

use anyhow::Result;
use chrono::{DateTime, Utc};
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Registry, TextEncoder};
use tracing::info;

/// Metrics collector for the swarm
pub struct SwarmMetrics {
    registry: Registry,

    agents_spawned: Counter,
    nodes_completed: Counter,
    nodes_failed: Counter,
    nodes_cancelled: Counter,
    retries: Counter,

    tokens_spent: Counter,
    node_tokens: Histogram,
    budget_utilization: Gauge,
}

impl SwarmMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let metrics = Self {
            registry,
            agents_spawned: Counter::new("swarm_agents_spawned_total", "Total agents spawned")?,
            nodes_completed: Counter::new("swarm_nodes_completed_total", "Total nodes completed")?,
            nodes_failed: Counter::new("swarm_nodes_failed_total", "Total nodes finally failed")?,
            nodes_cancelled: Counter::new(
                "swarm_nodes_cancelled_total",
                "Total nodes cancelled by collapse",
            )?,
            retries: Counter::new("swarm_retries_total", "Total node retry attempts")?,
            tokens_spent: Counter::new("swarm_tokens_spent_total", "Total tokens spent")?,
            node_tokens: Histogram::with_opts(HistogramOpts::new(
                "swarm_node_tokens",
                "Tokens consumed per completed node",
            ))?,
            budget_utilization: Gauge::new(
                "swarm_budget_utilization_percent",
                "Budget spend as a percentage of total",
            )?,
        };

        metrics.register_all()?;
        info!("swarm metrics initialized");
        Ok(metrics)
    }

    fn register_all(&self) -> Result<()> {
        self.registry.register(Box::new(self.agents_spawned.clone()))?;
        self.registry.register(Box::new(self.nodes_completed.clone()))?;
        self.registry.register(Box::new(self.nodes_failed.clone()))?;
        self.registry.register(Box::new(self.nodes_cancelled.clone()))?;
        self.registry.register(Box::new(self.retries.clone()))?;
        self.registry.register(Box::new(self.tokens_spent.clone()))?;
        self.registry.register(Box::new(self.node_tokens.clone()))?;
        self.registry.register(Box::new(self.budget_utilization.clone()))?;
        Ok(())
    }

    pub fn record_spawn(&self) {
        self.agents_spawned.inc();
    }

    pub fn record_completion(&self, tokens_used: u64) {
        self.nodes_completed.inc();
        self.tokens_spent.inc_by(tokens_used as f64);
        self.node_tokens.observe(tokens_used as f64);
    }

    pub fn record_failure(&self) {
        self.nodes_failed.inc();
    }

    pub fn record_retry(&self) {
        self.retries.inc();
    }

    pub fn record_cancelled(&self, count: usize) {
        self.nodes_cancelled.inc_by(count as f64);
    }

    pub fn set_budget_utilization(&self, percent: f64) {
        self.budget_utilization.set(percent);
    }

    pub fn snapshot(&self) -> SwarmMetricsSnapshot {
        SwarmMetricsSnapshot {
            timestamp: Utc::now(),
            agents_spawned: self.agents_spawned.get(),
            nodes_completed: self.nodes_completed.get(),
            nodes_failed: self.nodes_failed.get(),
            nodes_cancelled: self.nodes_cancelled.get(),
            retries: self.retries.get(),
            tokens_spent: self.tokens_spent.get(),
            budget_utilization: self.budget_utilization.get(),
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Metrics snapshot for reporting
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SwarmMetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub agents_spawned: f64,
    pub nodes_completed: f64,
    pub nodes_failed: f64,
    pub nodes_cancelled: f64,
    pub retries: f64,
    pub tokens_spent: f64,
    pub budget_utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = SwarmMetrics::new().unwrap();

        metrics.record_spawn();
        metrics.record_completion(500);
        metrics.record_failure();
        metrics.record_cancelled(2);
        metrics.set_budget_utilization(42.0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.agents_spawned, 1.0);
        assert_eq!(snapshot.nodes_completed, 1.0);
        assert_eq!(snapshot.nodes_failed, 1.0);
        assert_eq!(snapshot.nodes_cancelled, 2.0);
        assert_eq!(snapshot.tokens_spent, 500.0);
        assert_eq!(snapshot.budget_utilization, 42.0);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = SwarmMetrics::new().unwrap();
        metrics.record_spawn();

        let text = metrics.export_prometheus().unwrap();
        assert!(text.contains("swarm_agents_spawned_total"));
    }
}
