//! # Aegis - Assistant-Orchestrator Kernel
//!
//! The platform crate wires the Aegis subsystems into one runnable unit:
//! the kernel (lifecycle, events, plugins), the policy layer (risk, approval,
//! contracts), the brain (LLM routing), and the swarm (DAG execution). The
//! gateway module exposes the REST and streaming surface an external gateway
//! consumes.

pub mod gateway;
pub mod memory;

use aegis_brain::{DailyTokenSource, EchoProvider, LlmRouter, RouterConfig, ThinkOptions};
use aegis_kernel::{
    emit_brain_metrics, emit_swarm_metrics, BrainSample, ContextHealthMonitor, ContextSample,
    ContextVersionInfo, EventKind, FullHealthReport, HealthDashboard, Kernel, KernelConfig,
    KernelEvent, KernelPlugin, LogLevel, MetricBus, PipelineOutcome, PipelineStatus, SelfCheck,
    SwarmSample, UnifiedPipeline, WatchTarget, Watchdog, WatchdogConfig,
};
use aegis_policy::{ActionContext, ApprovalRequest, HealthStatus, PolicyConfig, PolicyService};
use aegis_swarm::{
    Coordinator, CoordinatorConfig, CoordinatorStats, Executor, ExecutorOutput, NodeType,
    PolicyDecision, PolicyGuard, RoleRegistry, RunSummary,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use uuid::Uuid;

pub use memory::{InMemoryStore, MemoryHit, MemoryStats, MemoryStore};

/// Bootstrap configuration for the whole platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub kernel: KernelConfig,
    /// Token budget handed to each task's coordinator
    pub total_budget: u64,
    /// Daily cap enforced by the router; `None` disables it
    pub daily_token_cap: Option<u64>,
    pub cache_ttl_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            total_budget: 10_000,
            daily_token_cap: None,
            cache_ttl_secs: 300,
        }
    }
}

/// One log item relayed onto the streaming surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogItem {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Result of driving one task through pipeline and swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub pipeline: PipelineOutcome,
    pub run: Option<RunSummary>,
}

/// Bridges the swarm's policy seam onto the risk engine
struct PolicyBridge {
    policy: Arc<PolicyService>,
}

#[async_trait]
impl PolicyGuard for PolicyBridge {
    async fn assess(&self, operation: &str, target: &str) -> PolicyDecision {
        let ctx = match operation {
            "spawn_agent" => ActionContext::new("execute", "sandbox"),
            "execute_task" => ActionContext::new("edit", "workspace"),
            other => ActionContext::new(other, target),
        };

        let decision = self.policy.gate(&ctx).await;
        PolicyDecision {
            approved: decision.assessment.approved,
            reason: decision.assessment.reason,
        }
    }
}

/// Executor backing agents with the LLM router
struct RouterExecutor {
    router: Arc<LlmRouter>,
    bus: Arc<MetricBus>,
    roles: RoleRegistry,
}

#[async_trait]
impl Executor for RouterExecutor {
    async fn execute(
        &self,
        node_id: &str,
        role: &str,
        context_summary: &str,
    ) -> Result<ExecutorOutput> {
        let info = self.roles.get(role)?;

        if info.category == NodeType::Tool {
            return Ok(ExecutorOutput {
                output: json!({ "node": node_id, "role": role, "status": "ok" }),
                tokens_used: 0,
            });
        }

        let complexity = if info.category == NodeType::Llm { 7 } else { 5 };
        let response = self
            .router
            .think(
                &format!("[{role}] {context_summary}"),
                &ThinkOptions::with_complexity(complexity),
            )
            .await?;

        emit_brain_metrics(
            &self.bus,
            &BrainSample {
                tokens_used: response.tokens_used,
                provider: response.provider.clone(),
                latency_ms: response.latency_ms,
                cached: response.cached,
            },
        )
        .await;

        Ok(ExecutorOutput {
            output: json!(response.content),
            tokens_used: response.tokens_used,
        })
    }
}

struct PolicyWatch(Arc<PolicyService>);

#[async_trait]
impl WatchTarget for PolicyWatch {
    fn name(&self) -> &str {
        "policy"
    }

    async fn check(&self) -> bool {
        matches!(self.0.health_check().await, HealthStatus::Healthy)
    }
}

struct RouterWatch(Arc<LlmRouter>);

#[async_trait]
impl WatchTarget for RouterWatch {
    fn name(&self) -> &str {
        "router"
    }

    async fn check(&self) -> bool {
        self.0.provider_count().await > 0
    }
}

struct WatchdogPlugin(Arc<Watchdog>);

#[async_trait]
impl KernelPlugin for WatchdogPlugin {
    fn name(&self) -> &str {
        "watchdog"
    }

    async fn stop(&self) {
        self.0.stop().await;
    }

    async fn health_check(&self) -> bool {
        !self.0.safe_mode()
    }
}

struct RouterPlugin(Arc<LlmRouter>);

#[async_trait]
impl KernelPlugin for RouterPlugin {
    fn name(&self) -> &str {
        "router"
    }

    async fn health_check(&self) -> bool {
        self.0.provider_count().await > 0
    }
}

/// The assembled platform
pub struct Platform {
    config: PlatformConfig,
    kernel: Arc<Kernel>,
    policy: Arc<PolicyService>,
    router: Arc<LlmRouter>,
    watchdog: Arc<Watchdog>,
    metric_bus: Arc<MetricBus>,
    memory: Arc<dyn MemoryStore>,
    pipeline: UnifiedPipeline,
    dashboard: HealthDashboard,
    current: RwLock<Option<Arc<Coordinator>>>,
    log_tx: broadcast::Sender<LogItem>,
}

/// Build the platform from bootstrap configuration
pub async fn init_platform(config: PlatformConfig) -> Result<Platform> {
    let kernel = Arc::new(Kernel::new(config.kernel.clone()));
    let policy = Arc::new(PolicyService::new(PolicyConfig::default()));

    let router = Arc::new(LlmRouter::new(RouterConfig {
        cache_ttl_secs: config.cache_ttl_secs,
        daily_token_cap: config.daily_token_cap,
    }));
    router.register(Arc::new(EchoProvider::new("local", 10))).await;

    let watchdog = Arc::new(Watchdog::new(WatchdogConfig::default()));
    watchdog.register(Arc::new(PolicyWatch(Arc::clone(&policy)))).await;
    watchdog.register(Arc::new(RouterWatch(Arc::clone(&router)))).await;

    kernel
        .register_plugin(Arc::new(WatchdogPlugin(Arc::clone(&watchdog))))
        .await?;
    kernel
        .register_plugin(Arc::new(RouterPlugin(Arc::clone(&router))))
        .await?;

    let guard: Arc<dyn PolicyGuard> = Arc::new(PolicyBridge {
        policy: Arc::clone(&policy),
    });
    let pipeline = UnifiedPipeline::new()
        .with_policy(guard)
        .with_contracts(policy.contract_checker());

    // Relay redacted log events onto the streaming surface.
    let (log_tx, _) = broadcast::channel(256);
    {
        let log_tx = log_tx.clone();
        kernel
            .event_bus()
            .on(EventKind::Log, move |event| {
                if let KernelEvent::Log { level, message } = event {
                    let _ = log_tx.send(LogItem {
                        timestamp: Utc::now(),
                        level: *level,
                        message: message.clone(),
                    });
                }
            })
            .await;
    }

    info!("platform assembled");
    Ok(Platform {
        config,
        kernel,
        policy,
        router,
        watchdog,
        metric_bus: Arc::new(MetricBus::new()),
        memory: Arc::new(InMemoryStore::new()),
        pipeline,
        dashboard: HealthDashboard::new(ContextHealthMonitor::default()),
        current: RwLock::new(None),
        log_tx,
    })
}

impl Platform {
    pub async fn start(&self) {
        self.kernel.start().await;
        self.watchdog.start().await;
    }

    pub async fn stop(&self) {
        self.kernel.stop().await;
    }

    /// Drive one task text through pipeline, DAG and contracts
    pub async fn run_task(&self, text: &str) -> Result<TaskReport> {
        if self.watchdog.safe_mode() {
            bail!("safe mode active: new tasks are refused");
        }

        let outcome = self.pipeline.prepare(text).await;
        if outcome.status != PipelineStatus::Success {
            self.kernel
                .log(
                    LogLevel::Warn,
                    format!(
                        "task rejected by pipeline: {}",
                        outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| "contract violations".to_string())
                    ),
                )
                .await;
            return Ok(TaskReport {
                pipeline: outcome,
                run: None,
            });
        }

        let task = outcome
            .task
            .clone()
            .context("successful outcome carries a task")?;
        let node = outcome
            .node
            .clone()
            .context("successful outcome carries a node")?;

        let guard: Arc<dyn PolicyGuard> = Arc::new(PolicyBridge {
            policy: Arc::clone(&self.policy),
        });
        let daily: Arc<dyn DailyTokenSource> = self.router.clone();

        let coordinator = Arc::new(
            Coordinator::with_parts(
                task.name.clone(),
                CoordinatorConfig {
                    total_budget: self.config.total_budget,
                    ..Default::default()
                },
                Some(guard),
                Some(daily),
            )
            .await?,
        );
        coordinator
            .add_node(node)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        let executor: Arc<dyn Executor> = Arc::new(RouterExecutor {
            router: Arc::clone(&self.router),
            bus: Arc::clone(&self.metric_bus),
            roles: RoleRegistry::new(),
        });

        let summary = coordinator
            .run(executor)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        let remaining = coordinator.budget().stats().await.remaining;
        for result in coordinator.context().results().await {
            emit_swarm_metrics(
                &self.metric_bus,
                &SwarmSample {
                    role: result.role.clone(),
                    budget_remaining: remaining,
                },
            )
            .await;
        }

        self.kernel
            .log(
                LogLevel::Info,
                format!(
                    "task '{}' finished: {} completed, {} failed, {} tokens",
                    task.name, summary.nodes_completed, summary.nodes_failed, summary.tokens_used
                ),
            )
            .await;

        *self.current.write().await = Some(coordinator);
        Ok(TaskReport {
            pipeline: outcome,
            run: Some(summary),
        })
    }

    pub async fn status(&self) -> aegis_kernel::KernelStatus {
        self.kernel.get_status().await
    }

    /// Full health report combining plugin self-checks and context health
    pub async fn health_report(&self) -> FullHealthReport {
        let mut checks: Vec<SelfCheck> = self
            .kernel
            .health_check()
            .await
            .into_iter()
            .map(|(name, passed)| SelfCheck { name, passed })
            .collect();
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        checks.push(SelfCheck {
            name: "safe-mode".to_string(),
            passed: !self.watchdog.safe_mode(),
        });

        let context_versions = match self.current.read().await.as_ref() {
            Some(_) => vec![ContextVersionInfo {
                name: "active-task".to_string(),
                last_updated: Utc::now(),
            }],
            None => Vec::new(),
        };

        let sample = ContextSample {
            current_tokens: self.router.tokens_used_today().await,
            context_versions,
            memory_used_bytes: 0,
            memory_limit_bytes: 0,
        };

        self.dashboard.full_report(checks, &sample)
    }

    /// Apply the context-pressure recovery ladder
    ///
    /// On a critical context band the active context is force-compressed and
    /// re-assessed against the compressed estimate; if the pressure persists
    /// the kernel is demoted to minimal mode.
    pub async fn enforce_context_health(&self) -> FullHealthReport {
        let report = self.health_report().await;
        if report.context.level != aegis_kernel::HealthLevel::Critical {
            return report;
        }

        let compressed_tokens = match self.current.read().await.as_ref() {
            Some(coordinator) => {
                let compressed =
                    aegis_swarm::compress_context(&coordinator.context(), 2_000).await;
                self.kernel
                    .log(
                        LogLevel::Warn,
                        format!("forced context compression to {} chars", compressed.len()),
                    )
                    .await;
                (compressed.len() / 4) as u64
            }
            None => self.router.tokens_used_today().await,
        };

        let recheck = ContextHealthMonitor::default().assess(&ContextSample {
            current_tokens: compressed_tokens,
            context_versions: Vec::new(),
            memory_used_bytes: 0,
            memory_limit_bytes: 0,
        });
        if recheck.level == aegis_kernel::HealthLevel::Critical {
            self.kernel.set_mode(aegis_kernel::KernelMode::Minimal).await;
        }

        report
    }

    /// Stats of the most recent coordinator run, if any
    pub async fn swarm_stats(&self) -> Option<CoordinatorStats> {
        match self.current.read().await.as_ref() {
            Some(coordinator) => Some(coordinator.stats().await),
            None => None,
        }
    }

    pub async fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        self.policy.approval_queue().get_pending().await
    }

    pub async fn approve(&self, id: Uuid) -> bool {
        self.policy.approval_queue().approve(id).await
    }

    pub async fn reject(&self, id: Uuid) -> bool {
        self.policy.approval_queue().reject(id).await
    }

    pub fn memory(&self) -> Arc<dyn MemoryStore> {
        Arc::clone(&self.memory)
    }

    pub fn metric_bus(&self) -> Arc<MetricBus> {
        Arc::clone(&self.metric_bus)
    }

    pub fn kernel(&self) -> Arc<Kernel> {
        Arc::clone(&self.kernel)
    }

    pub fn watchdog(&self) -> Arc<Watchdog> {
        Arc::clone(&self.watchdog)
    }

    pub fn router(&self) -> Arc<LlmRouter> {
        Arc::clone(&self.router)
    }

    pub fn policy(&self) -> Arc<PolicyService> {
        Arc::clone(&self.policy)
    }

    /// Subscribe to the redacted log stream
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogItem> {
        self.log_tx.subscribe()
    }
}
