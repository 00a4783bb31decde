//! # Context Health Monitor - Token, Staleness and Memory Pressure
//!
//! Derives a healthy/warning/critical band from a sample of context state:
//! token usage against the window ceiling, context entries that have gone
//! stale, and process memory pressure. The scheduler and kernel sample this
//! each iteration; a critical band forces compression and can demote the
//! kernel to minimal mode.

use crate::types::HealthLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds applied when assessing a sample
#[derive(Debug, Clone)]
pub struct ContextHealthConfig {
    pub max_tokens: u64,
    pub stale_threshold_ms: i64,
}

impl Default for ContextHealthConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            stale_threshold_ms: 5 * 60 * 1000,
        }
    }
}

/// One tracked context's freshness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextVersionInfo {
    pub name: String,
    pub last_updated: DateTime<Utc>,
}

/// Sample handed to the monitor each assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSample {
    pub current_tokens: u64,
    pub context_versions: Vec<ContextVersionInfo>,
    pub memory_used_bytes: u64,
    pub memory_limit_bytes: u64,
}

/// Band plus the measurements that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextHealthReport {
    pub level: HealthLevel,
    pub token_usage_percent: f64,
    pub stale_context_count: usize,
    pub memory_pressure: bool,
    pub recommendations: Vec<String>,
}

/// Monitor deriving health bands from context samples
pub struct ContextHealthMonitor {
    config: ContextHealthConfig,
}

impl ContextHealthMonitor {
    pub fn new(config: ContextHealthConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, sample: &ContextSample) -> ContextHealthReport {
        let token_usage_percent = if self.config.max_tokens == 0 {
            100.0
        } else {
            sample.current_tokens as f64 * 100.0 / self.config.max_tokens as f64
        };

        let now = Utc::now();
        let stale_context_count = sample
            .context_versions
            .iter()
            .filter(|v| (now - v.last_updated).num_milliseconds() > self.config.stale_threshold_ms)
            .count();

        let memory_pressure = sample.memory_limit_bytes > 0
            && sample.memory_used_bytes as f64 > 0.85 * sample.memory_limit_bytes as f64;

        let mut level = HealthLevel::Healthy;
        let mut recommendations = Vec::new();

        if token_usage_percent > 90.0 {
            level = HealthLevel::Critical;
            recommendations.push("compress context immediately".to_string());
        } else if token_usage_percent > 70.0 {
            level = level.max(HealthLevel::Warning);
            recommendations.push("schedule context compression".to_string());
        }

        if memory_pressure {
            level = HealthLevel::Critical;
            recommendations.push("reduce memory footprint; drop caches".to_string());
        }

        if stale_context_count > 0 {
            level = level.max(HealthLevel::Warning);
            recommendations.push("refresh stale context entries".to_string());
        }

        ContextHealthReport {
            level,
            token_usage_percent,
            stale_context_count,
            memory_pressure,
            recommendations,
        }
    }
}

impl Default for ContextHealthMonitor {
    fn default() -> Self {
        Self::new(ContextHealthConfig::default())
    }
}

/// One component's pass/fail self-check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCheck {
    pub name: String,
    pub passed: bool,
}

/// Combined report across self-checks and context health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullHealthReport {
    pub overall: HealthLevel,
    pub context: ContextHealthReport,
    pub checks: Vec<SelfCheck>,
}

/// Aggregates self-checks with the context band
pub struct HealthDashboard {
    monitor: ContextHealthMonitor,
}

impl HealthDashboard {
    pub fn new(monitor: ContextHealthMonitor) -> Self {
        Self { monitor }
    }

    /// Any failed self-check forces critical; otherwise the context band wins
    pub fn full_report(&self, checks: Vec<SelfCheck>, sample: &ContextSample) -> FullHealthReport {
        let context = self.monitor.assess(sample);
        let overall = if checks.iter().any(|c| !c.passed) {
            HealthLevel::Critical
        } else {
            context.level
        };

        FullHealthReport {
            overall,
            context,
            checks,
        }
    }
}

impl Default for HealthDashboard {
    fn default() -> Self {
        Self::new(ContextHealthMonitor::default())
    }
}
