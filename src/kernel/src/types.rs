//! # Kernel Types - Configuration, Status and Health Structures
//!
//! Shared data structures for the kernel lifecycle, the watchdog and the
//! health monitors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Operating mode of the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelMode {
    Minimal,
    Standard,
    FreeTime,
    Auto,
}

/// Token ceiling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    pub max_per_hour: u64,
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self { max_per_hour: 50_000 }
    }
}

/// Bootstrap configuration for the kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    pub name: String,
    pub version: String,
    pub mode: KernelMode,
    pub token_budget: TokenBudgetConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "aegis".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: KernelMode::Standard,
            token_budget: TokenBudgetConfig::default(),
        }
    }
}

/// Partial configuration applied by `reload_config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelConfigPatch {
    pub mode: Option<KernelMode>,
    pub max_tokens_per_hour: Option<u64>,
}

/// Status snapshot exposed to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelStatus {
    pub name: String,
    pub version: String,
    pub mode: KernelMode,
    pub running: bool,
    pub plugin_count: usize,
    pub uptime_seconds: u64,
}

/// Health band derived by the monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

/// Snapshot of process state taken before a risky transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorePoint {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub data: HashMap<String, serde_json::Value>,
}

/// Log severity carried on kernel events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Error types for the kernel
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("plugin already registered: {0}")]
    DuplicatePlugin(String),

    #[error("kernel is not running")]
    NotRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;
