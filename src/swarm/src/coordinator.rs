//! # Coordinator - Driving a DAG to Terminal Status
//!
//! The coordinator owns one DAG run. Each loop iteration asks the scheduler
//! for a batch, gates every member through the policy guard, executes the
//! batch concurrently, and feeds results into the shared context. Failed
//! nodes retry until their budget of attempts is spent; a finally-failed
//! node collapses its pending descendants.
//!
//! The iteration cap is a last-resort fuse: a healthy run terminates because
//! the DAG completes, the budget exhausts, or the scheduler degrades.

use crate::agent::Agent;
use crate::budget::Budget;
use crate::context::SharedContext;
use crate::dag::{DagConfig, TaskDag};
use crate::metrics::{SwarmMetrics, SwarmMetricsSnapshot};
use crate::roles::RoleRegistry;
use crate::scheduler::{SchedulerStats, SwarmScheduler};
use crate::types::*;
use aegis_brain::DailyTokenSource;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Combined run-time statistics exposed to the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub scheduler: SchedulerStats,
    pub budget: BudgetStats,
    pub metrics: SwarmMetricsSnapshot,
    pub context_version: u64,
}

/// Orchestrates one DAG under scheduling, budget and policy rules
pub struct Coordinator {
    config: CoordinatorConfig,
    dag: Arc<RwLock<TaskDag>>,
    scheduler: Arc<SwarmScheduler>,
    context: Arc<SharedContext>,
    budget: Arc<Budget>,
    policy_guard: Option<Arc<dyn PolicyGuard>>,
    metrics: Arc<SwarmMetrics>,
    iterations: AtomicU32,
}

impl Coordinator {
    pub async fn new(task_description: impl Into<String>, config: CoordinatorConfig) -> Result<Self> {
        Self::with_parts(task_description, config, None, None).await
    }

    /// Full constructor wiring the optional policy guard and daily source
    pub async fn with_parts(
        task_description: impl Into<String>,
        config: CoordinatorConfig,
        policy_guard: Option<Arc<dyn PolicyGuard>>,
        daily_source: Option<Arc<dyn DailyTokenSource>>,
    ) -> Result<Self> {
        let budget = Arc::new(match daily_source {
            Some(source) => Budget::with_daily_source(config.total_budget, source),
            None => Budget::new(config.total_budget),
        });

        let dag = Arc::new(RwLock::new(TaskDag::new(DagConfig {
            max_nodes: config.max_nodes,
            max_depth: config.max_depth,
        })));

        let scheduler = Arc::new(SwarmScheduler::new(
            SchedulerConfig {
                max_concurrent: config.max_concurrent,
                cpu_threshold: config.cpu_threshold,
            },
            Arc::clone(&dag),
            Arc::clone(&budget),
            Arc::new(RoleRegistry::new()),
        ));

        let context = Arc::new(SharedContext::new(task_description));
        if let Some(map) = &config.codebase_map_summary {
            context.inject_codebase_map(map.clone()).await;
        }

        Ok(Self {
            config,
            dag,
            scheduler,
            context,
            budget,
            policy_guard,
            metrics: Arc::new(SwarmMetrics::new()?),
            iterations: AtomicU32::new(0),
        })
    }

    pub async fn add_node(&self, node: TaskNode) -> SwarmResult<()> {
        self.dag.write().await.add_node(node)
    }

    /// Drive the DAG until every node is terminal or a gate stops the run
    pub async fn run(&self, executor: Arc<dyn Executor>) -> SwarmResult<RunSummary> {
        info!(task = self.context.task_description(), "coordinator run started");
        let mut iterations = 0u32;

        loop {
            if self.dag.read().await.is_complete() {
                break;
            }
            if iterations >= self.config.max_iterations {
                warn!(iterations, "iteration fuse tripped");
                break;
            }
            iterations += 1;

            if self.budget.is_exhausted().await {
                warn!("budget exhausted, stopping run");
                break;
            }
            if self.scheduler.should_degrade().await {
                warn!("scheduler degraded, stopping run");
                break;
            }

            let batch = self.scheduler.get_next_batch().await;
            if batch.is_empty() {
                if self.scheduler.running_count().await == 0 {
                    // Nothing running and nothing schedulable: deadlock guard.
                    break;
                }
                tokio::task::yield_now().await;
                continue;
            }

            let work = batch
                .into_iter()
                .map(|node| self.run_node(node, Arc::clone(&executor)));
            futures::future::join_all(work).await;

            let utilization = self.budget.stats().await.utilization;
            self.metrics.set_budget_utilization(utilization);
        }

        self.iterations.store(iterations, Ordering::SeqCst);
        let summary = self.get_result().await;
        info!(
            completed = summary.nodes_completed,
            failed = summary.nodes_failed,
            tokens = summary.tokens_used,
            "coordinator run finished"
        );
        Ok(summary)
    }

    /// Execute one batch member end to end
    async fn run_node(&self, node: TaskNode, executor: Arc<dyn Executor>) {
        if let Some(guard) = &self.policy_guard {
            let decision = guard.assess("spawn_agent", &node.role).await;
            if !decision.approved {
                let reason = format!("Policy denied: {}", decision.reason);
                self.handle_failure(&node.id, &reason, false).await;
                return;
            }
        }

        let mut agent: Agent = match self.scheduler.spawn_agent(&node).await {
            Ok(agent) => agent,
            Err(e) => {
                self.handle_failure(&node.id, &e.to_string(), true).await;
                return;
            }
        };
        self.metrics.record_spawn();

        let summary = self.context.get_summary_for(&node.id, 500).await;
        let execution = agent.execute(&summary, executor.as_ref()).await;

        if execution.succeeded() {
            let output = execution.output.unwrap_or(Value::Null);
            self.context
                .add_result(&node.id, &node.role, output.clone(), execution.tokens_used)
                .await;
            if let Err(e) = self
                .scheduler
                .complete_agent(&node.id, output, execution.tokens_used)
                .await
            {
                error!(node = %node.id, error = %e, "failed to record completion");
            }
            self.metrics.record_completion(execution.tokens_used);
        } else {
            let error = execution.error.unwrap_or_else(|| "unknown failure".to_string());
            self.handle_failure(&node.id, &error, true).await;
        }
    }

    /// Route a failed attempt into retry or final failure + collapse
    async fn handle_failure(&self, id: &str, reason: &str, collapse_on_final: bool) {
        match self.scheduler.fail_agent(id, reason).await {
            Ok(true) => {
                self.metrics.record_retry();
            }
            Ok(false) => {
                self.metrics.record_failure();
                if collapse_on_final {
                    let cancelled = self.dag.write().await.collapse(id);
                    self.metrics.record_cancelled(cancelled.len());
                }
            }
            Err(e) => error!(node = id, error = %e, "failed to record failure"),
        }
    }

    /// Summarise the run; success means no node finally failed
    pub async fn get_result(&self) -> RunSummary {
        let (completed, failed, cancelled) = {
            let dag = self.dag.read().await;
            (
                dag.count_by_status(NodeStatus::Done),
                dag.count_by_status(NodeStatus::Failed),
                dag.count_by_status(NodeStatus::Cancelled),
            )
        };

        RunSummary {
            success: failed == 0,
            nodes_completed: completed,
            nodes_failed: failed,
            nodes_cancelled: cancelled,
            tokens_used: self.budget.spent().await,
            iterations: self.iterations.load(Ordering::SeqCst),
        }
    }

    pub async fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            scheduler: self.scheduler.stats().await,
            budget: self.budget.stats().await,
            metrics: self.metrics.snapshot(),
            context_version: self.context.version().await,
        }
    }

    pub fn context(&self) -> Arc<SharedContext> {
        Arc::clone(&self.context)
    }

    pub fn budget(&self) -> Arc<Budget> {
        Arc::clone(&self.budget)
    }

    pub fn scheduler(&self) -> Arc<SwarmScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn metrics(&self) -> Arc<SwarmMetrics> {
        Arc::clone(&self.metrics)
    }
}
