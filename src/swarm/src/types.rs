//! # Swarm Types - Core Data Structures for the Execution Engine
//!
//! This module defines the task-node model, agent results, run summaries and
//! configuration structs used throughout the swarm, plus the two interface
//! seams the coordinator composes: [`Executor`] and [`PolicyGuard`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of work a node (and its role) performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Llm,
    Hybrid,
    Tool,
}

/// Lifecycle of a task node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl NodeStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Done | NodeStatus::Failed | NodeStatus::Cancelled)
    }
}

/// Lifecycle of an agent during one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Suspended,
    Done,
    Failed,
}

/// One node of the task DAG
///
/// Immutable except for the status fields (`status`, `retries`, `result`,
/// `error`), which only the DAG mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    /// Unique id within the owning DAG
    pub id: String,
    /// Role key resolved against the role registry at spawn time
    pub role: String,
    pub node_type: NodeType,
    pub description: String,
    /// Ids of nodes that must be `done` before this node is ready
    pub dependencies: Vec<String>,
    /// Token budget for this node; tool nodes always carry zero
    pub budget: u64,
    pub max_retries: u32,
    /// 0 = root; must stay strictly below the DAG's max depth
    pub depth: u32,
    pub parent_id: Option<String>,
    pub status: NodeStatus,
    pub retries: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TaskNode {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        node_type: NodeType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            node_type,
            description: description.into(),
            dependencies: Vec::new(),
            budget: 0,
            max_retries: 2,
            depth: 0,
            parent_id: None,
            status: NodeStatus::Pending,
            retries: 0,
            result: None,
            error: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Assign a token budget; tool nodes stay at zero
    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = if self.node_type == NodeType::Tool { 0 } else { budget };
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A role an agent can be spawned as
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub category: NodeType,
    pub description: String,
    /// Expected token consumption for one execution; zero for tool roles
    pub avg_tokens: u64,
    /// Human-readable condition under which the role may be skipped
    pub skip_condition: String,
}

/// Result appended to the shared context when an agent finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub role: String,
    pub output: Value,
    pub tokens_used: u64,
    pub timestamp: DateTime<Utc>,
}

/// Output of one executor invocation
#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    pub output: Value,
    pub tokens_used: u64,
}

/// The callable that performs a node's actual work
///
/// Exceptions never propagate past the coordinator loop; an `Err` here marks
/// the agent failed and feeds the retry path.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        node_id: &str,
        role: &str,
        context_summary: &str,
    ) -> anyhow::Result<ExecutorOutput>;
}

/// Adapter turning a plain closure into an [`Executor`]
pub struct FnExecutor<F>(F);

impl<F> FnExecutor<F>
where
    F: Fn(&str, &str, &str) -> anyhow::Result<ExecutorOutput> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Executor for FnExecutor<F>
where
    F: Fn(&str, &str, &str) -> anyhow::Result<ExecutorOutput> + Send + Sync,
{
    async fn execute(
        &self,
        node_id: &str,
        role: &str,
        context_summary: &str,
    ) -> anyhow::Result<ExecutorOutput> {
        (self.0)(node_id, role, context_summary)
    }
}

/// Verdict from the policy guard consulted before every spawn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub approved: bool,
    pub reason: String,
}

/// The policy seam the coordinator consults before spawning agents
#[async_trait]
pub trait PolicyGuard: Send + Sync {
    async fn assess(&self, operation: &str, target: &str) -> PolicyDecision;
}

/// Summary of one coordinator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// True iff no node finished `failed`
    pub success: bool,
    pub nodes_completed: usize,
    pub nodes_failed: usize,
    pub nodes_cancelled: usize,
    /// Read from the budget's single source of truth
    pub tokens_used: u64,
    pub iterations: u32,
}

/// Snapshot of budget accounting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStats {
    pub total: u64,
    pub spent: u64,
    pub reserved: u64,
    pub remaining: u64,
    /// Spent as a percentage of total
    pub utilization: f64,
}

/// Error types for the swarm
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("dependency does not exist: {0}")]
    DependencyMissing(String),

    #[error("adding node {0} would introduce a cycle")]
    CycleDetected(String),

    #[error("node limit reached ({0} nodes)")]
    NodeLimitExceeded(usize),

    #[error("depth {depth} exceeds maximum {max_depth}")]
    DepthExceeded { depth: u32, max_depth: u32 },

    #[error("Budget exhausted: cannot spend {requested} tokens")]
    BudgetExhausted { requested: u64 },

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("invalid agent transition from {0:?}")]
    InvalidTransition(AgentStatus),

    #[error("Policy denied: {0}")]
    PolicyDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for swarm operations
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Configuration recognised by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently running agents
    pub max_concurrent: usize,
    /// CPU percentage above which only tool nodes are scheduled
    pub cpu_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            cpu_threshold: 80.0,
        }
    }
}

/// Configuration recognised by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub total_budget: u64,
    pub max_nodes: usize,
    pub max_depth: u32,
    pub max_concurrent: usize,
    pub cpu_threshold: f64,
    /// Safety fuse on scheduler-loop iterations
    pub max_iterations: u32,
    /// Optional single-string projection of an external code map
    pub codebase_map_summary: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            total_budget: 10_000,
            max_nodes: 10,
            max_depth: 3,
            max_concurrent: 5,
            cpu_threshold: 80.0,
            max_iterations: 50,
            codebase_map_summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_nodes_never_carry_budget() {
        let node = TaskNode::new("t", "tester", NodeType::Tool, "run tests").with_budget(500);
        assert_eq!(node.budget, 0);
    }

    #[test]
    fn test_node_defaults() {
        let node = TaskNode::new("n", "coder", NodeType::Hybrid, "write code");
        assert_eq!(node.status, NodeStatus::Pending);
        assert_eq!(node.retries, 0);
        assert_eq!(node.max_retries, 2);
        assert_eq!(node.depth, 0);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(NodeStatus::Done.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(NodeStatus::Cancelled.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
    }

    #[tokio::test]
    async fn test_fn_executor_adapter() {
        let executor = FnExecutor::new(|node_id, role, _summary| {
            Ok(ExecutorOutput {
                output: serde_json::json!(format!("{role} result for {node_id}")),
                tokens_used: 5,
            })
        });

        let out = executor.execute("n1", "coder", "").await.unwrap();
        assert_eq!(out.tokens_used, 5);
    }
}
