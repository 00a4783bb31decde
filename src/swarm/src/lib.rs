//! # Aegis Swarm - Concurrent Task Execution Engine
//!
//! The swarm crate turns a free-form task into completed work: a bounded
//! task DAG, a token budget with per-agent reservations, a lazy scheduler
//! gated by CPU and interactivity, single-shot agents, and the coordinator
//! that drives everything to a terminal state under policy control.
//!
//! ## Core Components
//!
//! - **TaskDag**: validated dependency graph with collapse semantics
//! - **Budget**: hierarchical token accounting, 30%-of-remaining reservations
//! - **SharedContext**: append-only result store with summary projection
//! - **Agent**: one node, one attempt, budget-enforced
//! - **SwarmScheduler**: readiness + budget + CPU + interactive spawn gates
//! - **Coordinator**: the drive loop composing all of the above

pub mod agent;
pub mod budget;
pub mod context;
pub mod coordinator;
pub mod dag;
pub mod metrics;
pub mod roles;
pub mod scheduler;
pub mod types;

pub use agent::{Agent, AgentExecution};
pub use budget::Budget;
pub use context::{
    compress_context, compress_context_with, MemoryEntry, SharedContext, TaskContext,
};
pub use coordinator::{Coordinator, CoordinatorStats};
pub use dag::{DagConfig, TaskDag};
pub use metrics::{SwarmMetrics, SwarmMetricsSnapshot};
pub use roles::RoleRegistry;
pub use scheduler::{SchedulerStats, SwarmScheduler};
pub use types::*;
