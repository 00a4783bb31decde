//! # Swarm Scheduler - Lazy Spawn Selection Under Pressure
//!
//! The scheduler decides, each tick, which ready nodes become agents. Agents
//! are constructed only when every gate permits: readiness, token budget,
//! CPU headroom and the interactive flag. Under pressure the scheduler
//! degrades in steps rather than failing outright.
//!
//! ## Degradation ladder
//!
//! - CPU above the threshold (default 80): only tool nodes are scheduled
//! - CPU above 90: nothing is scheduled
//! - Interactive task active: nothing is scheduled
//!
//! Within a batch, tool nodes precede budgeted nodes and ties break by
//! ascending budget, so cheap work drains first when headroom is scarce.

use crate::agent::Agent;
use crate::budget::Budget;
use crate::dag::TaskDag;
use crate::roles::RoleRegistry;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Scheduler statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub running: usize,
    pub pending: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub cpu_usage: f64,
    pub interactive: bool,
}

/// Lazy agent spawner over a shared DAG and budget
pub struct SwarmScheduler {
    config: SchedulerConfig,
    dag: Arc<RwLock<TaskDag>>,
    budget: Arc<Budget>,
    roles: Arc<RoleRegistry>,
    running: Arc<RwLock<HashMap<String, Agent>>>,
    cpu_usage: Arc<RwLock<f64>>,
    interactive: Arc<RwLock<bool>>,
}

impl SwarmScheduler {
    pub fn new(
        config: SchedulerConfig,
        dag: Arc<RwLock<TaskDag>>,
        budget: Arc<Budget>,
        roles: Arc<RoleRegistry>,
    ) -> Self {
        Self {
            config,
            dag,
            budget,
            roles,
            running: Arc::new(RwLock::new(HashMap::new())),
            cpu_usage: Arc::new(RwLock::new(0.0)),
            interactive: Arc::new(RwLock::new(false)),
        }
    }

    /// Select the nodes to spawn this tick
    pub async fn get_next_batch(&self) -> Vec<TaskNode> {
        let cpu = *self.cpu_usage.read().await;
        if cpu > 90.0 {
            warn!(cpu, "full degradation, no spawning");
            return Vec::new();
        }

        if *self.interactive.read().await {
            debug!("interactive task active, no spawning");
            return Vec::new();
        }

        let mut ready = self.dag.read().await.get_ready();

        // Tool nodes first, then cheapest budgets
        ready.sort_by_key(|n| (n.node_type != NodeType::Tool, n.budget));

        if cpu > self.config.cpu_threshold {
            debug!(cpu, threshold = self.config.cpu_threshold, "tool-only batch");
            ready.retain(|n| n.node_type == NodeType::Tool);
        }

        let slots = self
            .config
            .max_concurrent
            .saturating_sub(self.running_count().await);
        ready.truncate(slots);
        ready
    }

    /// Construct an agent for a node, reserving its budget
    ///
    /// Non-tool nodes are refused when the budget cannot cover them; tool
    /// nodes reserve nothing.
    pub async fn spawn_agent(&self, node: &TaskNode) -> SwarmResult<Agent> {
        let role = self.roles.get(&node.role)?.clone();

        if node.node_type != NodeType::Tool {
            if !self.budget.can_spend(node.budget).await {
                return Err(SwarmError::BudgetExhausted {
                    requested: node.budget,
                });
            }
            self.budget.reserve(&node.id, node.budget).await;
        }

        self.dag
            .write()
            .await
            .set_status(&node.id, NodeStatus::Running, None, None)?;

        let agent = Agent::from_node(node, &role);
        self.running
            .write()
            .await
            .insert(node.id.clone(), agent.clone());

        info!(node = %node.id, role = %node.role, "agent spawned");
        Ok(agent)
    }

    /// Record a successful execution: spend, release, mark done
    pub async fn complete_agent(
        &self,
        id: &str,
        result: serde_json::Value,
        tokens_used: u64,
    ) -> SwarmResult<()> {
        self.budget.spend(id, tokens_used).await;
        self.budget.release(id).await;
        self.running.write().await.remove(id);
        self.dag
            .write()
            .await
            .set_status(id, NodeStatus::Done, Some(result), None)?;
        debug!(node = id, tokens_used, "agent completed");
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// Releases the reservation and reverts the node to pending while retries
    /// remain; returns `false` once the node is finally failed.
    pub async fn fail_agent(&self, id: &str, error: &str) -> SwarmResult<bool> {
        self.budget.release(id).await;
        self.running.write().await.remove(id);
        self.dag.write().await.record_failure(id, error)
    }

    pub async fn running_count(&self) -> usize {
        self.running.read().await.len()
    }

    /// Inject the latest CPU reading
    pub async fn set_cpu_usage(&self, percent: f64) {
        *self.cpu_usage.write().await = percent;
    }

    /// Flag that an interactive task wants the machine
    pub async fn set_interactive(&self, active: bool) {
        *self.interactive.write().await = active;
    }

    pub async fn should_degrade(&self) -> bool {
        *self.cpu_usage.read().await > 90.0
    }

    pub async fn stats(&self) -> SchedulerStats {
        let dag = self.dag.read().await;
        SchedulerStats {
            running: self.running_count().await,
            pending: dag.count_by_status(NodeStatus::Pending),
            done: dag.count_by_status(NodeStatus::Done),
            failed: dag.count_by_status(NodeStatus::Failed),
            cancelled: dag.count_by_status(NodeStatus::Cancelled),
            cpu_usage: *self.cpu_usage.read().await,
            interactive: *self.interactive.read().await,
        }
    }
}
