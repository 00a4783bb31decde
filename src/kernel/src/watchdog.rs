//! # Watchdog - Periodic Health Probes and Safe Mode
//!
//! The watchdog polls registered targets, counts consecutive failures, and
//! escalates: while a target's failure count stays within the allowance its
//! restart hook is invoked; past the allowance the watchdog activates safe
//! mode. Safe mode is a sticky latch inspected by the kernel to suppress
//! non-essential work; only an explicit deactivation clears it.
//!
//! Restore points capture opaque snapshots before risky transitions and are
//! ring-bounded to the ten most recent. The watchdog never restarts the
//! kernel itself.

use crate::types::RestorePoint;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_RESTORE_POINTS: usize = 10;

/// A subsystem the watchdog probes
#[async_trait]
pub trait WatchTarget: Send + Sync {
    fn name(&self) -> &str;

    /// Liveness probe; `false` counts as a failure
    async fn check(&self) -> bool;

    /// Whether a restart hook exists for this target
    fn restartable(&self) -> bool {
        false
    }

    /// Attempt to bring the target back; only called when `restartable`
    async fn restart(&self) {}
}

/// Watchdog configuration
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Consecutive failures tolerated before safe mode
    pub max_failures: u32,
    /// Poll cadence for the background loop
    pub interval_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            interval_ms: 30_000,
        }
    }
}

/// Periodic health prober with escalation to safe mode
pub struct Watchdog {
    config: WatchdogConfig,
    targets: RwLock<Vec<Arc<dyn WatchTarget>>>,
    fail_counts: RwLock<HashMap<String, u32>>,
    restore_points: RwLock<VecDeque<RestorePoint>>,
    safe_mode: AtomicBool,
    is_running: Arc<RwLock<bool>>,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            targets: RwLock::new(Vec::new()),
            fail_counts: RwLock::new(HashMap::new()),
            restore_points: RwLock::new(VecDeque::new()),
            safe_mode: AtomicBool::new(false),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn register(&self, target: Arc<dyn WatchTarget>) {
        info!(target = target.name(), "watchdog target registered");
        self.targets.write().await.push(target);
    }

    /// Probe every target once, applying the escalation ladder
    pub async fn health_check(&self) {
        let targets: Vec<Arc<dyn WatchTarget>> = self.targets.read().await.clone();

        for target in targets {
            let healthy = target.check().await;
            let name = target.name().to_string();

            if healthy {
                self.fail_counts.write().await.remove(&name);
                continue;
            }

            let failures = {
                let mut counts = self.fail_counts.write().await;
                let entry = counts.entry(name.clone()).or_insert(0);
                *entry += 1;
                *entry
            };

            if failures <= self.config.max_failures {
                warn!(target = %name, failures, "health check failed");
                if target.restartable() {
                    info!(target = %name, "restarting target");
                    target.restart().await;
                }
            } else {
                error!(target = %name, failures, "failure allowance exhausted, entering safe mode");
                self.activate_safe_mode();
            }
        }
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::SeqCst)
    }

    pub fn activate_safe_mode(&self) {
        self.safe_mode.store(true, Ordering::SeqCst);
    }

    /// The only way out of safe mode
    pub fn deactivate_safe_mode(&self) {
        info!("safe mode deactivated");
        self.safe_mode.store(false, Ordering::SeqCst);
    }

    /// Capture a snapshot, evicting the oldest past the ring bound
    pub async fn create_restore_point(
        &self,
        reason: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
    ) -> RestorePoint {
        let point = RestorePoint {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            reason: reason.into(),
            data,
        };

        let mut points = self.restore_points.write().await;
        if points.len() >= MAX_RESTORE_POINTS {
            points.pop_front();
        }
        points.push_back(point.clone());
        point
    }

    pub async fn restore_points(&self) -> Vec<RestorePoint> {
        self.restore_points.read().await.iter().cloned().collect()
    }

    pub async fn fail_count(&self, target: &str) -> u32 {
        self.fail_counts
            .read()
            .await
            .get(target)
            .copied()
            .unwrap_or(0)
    }

    /// Launch the periodic probe loop
    pub async fn start(self: &Arc<Self>) {
        *self.is_running.write().await = true;

        let watchdog = Arc::clone(self);
        let is_running = Arc::clone(&self.is_running);
        let period = Duration::from_millis(self.config.interval_ms);

        tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "watchdog started");
            let mut ticker = interval(period);
            // The first tick fires immediately; skip it so registration can settle.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !*is_running.read().await {
                    break;
                }
                watchdog.health_check().await;
            }

            info!("watchdog stopped");
        });
    }

    /// Cancel the periodic loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(WatchdogConfig::default())
    }
}
