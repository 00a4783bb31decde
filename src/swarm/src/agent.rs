//! # Agent - Single-Shot Executor for One Task Node
//!
//! An agent lives only for one execution attempt of one node. It guards
//! against double-runs, delegates the real work to the supplied executor, and
//! settles into `done` or `failed`. Non-tool agents that overrun their token
//! budget fail with `Budget exceeded`; tool agents are budget-exempt.

use crate::types::*;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of one [`Agent::execute`] call
#[derive(Debug, Clone)]
pub struct AgentExecution {
    pub output: Option<Value>,
    pub tokens_used: u64,
    pub error: Option<String>,
}

impl AgentExecution {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Stateful executor of one node
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub role: String,
    pub parent_id: Option<String>,
    pub budget_tokens: u64,
    pub tokens_used: u64,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub result: Option<Value>,
    category: NodeType,
}

impl Agent {
    /// Create an agent bound to a node and its resolved role
    pub fn from_node(node: &TaskNode, role: &Role) -> Self {
        Self {
            id: node.id.clone(),
            role: role.name.clone(),
            parent_id: node.parent_id.clone(),
            budget_tokens: node.budget,
            tokens_used: 0,
            status: AgentStatus::Idle,
            created_at: Utc::now(),
            result: None,
            category: role.category,
        }
    }

    pub fn category(&self) -> NodeType {
        self.category
    }

    /// Run the node's work through the executor
    ///
    /// Executor errors are contained here: they mark the agent failed and
    /// come back inside the execution record, never as a panic or a
    /// propagated error.
    pub async fn execute(&mut self, input: &str, executor: &dyn Executor) -> AgentExecution {
        if self.status == AgentStatus::Running {
            warn!(agent = %self.id, "rejected double-run");
            self.status = AgentStatus::Failed;
            return AgentExecution {
                output: None,
                tokens_used: 0,
                error: Some("already running".to_string()),
            };
        }

        self.status = AgentStatus::Running;
        debug!(agent = %self.id, role = %self.role, "agent executing");

        match executor.execute(&self.id, &self.role, input).await {
            Ok(out) => {
                self.tokens_used += out.tokens_used;

                if self.category != NodeType::Tool && self.tokens_used > self.budget_tokens {
                    self.status = AgentStatus::Failed;
                    warn!(
                        agent = %self.id,
                        used = self.tokens_used,
                        budget = self.budget_tokens,
                        "budget exceeded"
                    );
                    return AgentExecution {
                        output: None,
                        tokens_used: out.tokens_used,
                        error: Some("Budget exceeded".to_string()),
                    };
                }

                self.status = AgentStatus::Done;
                self.result = Some(out.output.clone());
                AgentExecution {
                    output: Some(out.output),
                    tokens_used: out.tokens_used,
                    error: None,
                }
            }
            Err(e) => {
                self.status = AgentStatus::Failed;
                AgentExecution {
                    output: None,
                    tokens_used: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Park a running agent
    pub fn suspend(&mut self) -> SwarmResult<()> {
        if self.status != AgentStatus::Running {
            return Err(SwarmError::InvalidTransition(self.status));
        }
        self.status = AgentStatus::Suspended;
        Ok(())
    }

    /// Resume a suspended agent
    pub fn resume(&mut self) -> SwarmResult<()> {
        if self.status != AgentStatus::Suspended {
            return Err(SwarmError::InvalidTransition(self.status));
        }
        self.status = AgentStatus::Running;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleRegistry;
    use serde_json::json;

    fn hybrid_agent(budget: u64) -> Agent {
        let registry = RoleRegistry::new();
        let node = TaskNode::new("n1", "coder", NodeType::Hybrid, "work").with_budget(budget);
        Agent::from_node(&node, registry.get("coder").unwrap())
    }

    fn tool_agent() -> Agent {
        let registry = RoleRegistry::new();
        let node = TaskNode::new("t1", "tester", NodeType::Tool, "verify");
        Agent::from_node(&node, registry.get("tester").unwrap())
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let mut agent = hybrid_agent(1000);
        let executor = FnExecutor::new(|_, _, _| {
            Ok(ExecutorOutput {
                output: json!("done"),
                tokens_used: 400,
            })
        });

        let execution = agent.execute("summary", &executor).await;
        assert!(execution.succeeded());
        assert_eq!(agent.status, AgentStatus::Done);
        assert_eq!(agent.tokens_used, 400);
        assert_eq!(agent.result, Some(json!("done")));
    }

    #[tokio::test]
    async fn test_budget_overrun_fails() {
        let mut agent = hybrid_agent(100);
        let executor = FnExecutor::new(|_, _, _| {
            Ok(ExecutorOutput {
                output: json!("too much"),
                tokens_used: 250,
            })
        });

        let execution = agent.execute("", &executor).await;
        assert_eq!(execution.error.as_deref(), Some("Budget exceeded"));
        assert_eq!(agent.status, AgentStatus::Failed);
    }

    #[tokio::test]
    async fn test_tool_agents_skip_budget_check() {
        let mut agent = tool_agent();
        let executor = FnExecutor::new(|_, _, _| {
            Ok(ExecutorOutput {
                output: json!("ok"),
                tokens_used: 0,
            })
        });

        let execution = agent.execute("", &executor).await;
        assert!(execution.succeeded());
        assert_eq!(agent.status, AgentStatus::Done);
    }

    #[tokio::test]
    async fn test_executor_error_is_contained() {
        let mut agent = hybrid_agent(1000);
        let executor = FnExecutor::new(|_, _, _| Err(anyhow::anyhow!("connector down")));

        let execution = agent.execute("", &executor).await;
        assert_eq!(execution.error.as_deref(), Some("connector down"));
        assert_eq!(agent.status, AgentStatus::Failed);
        assert_eq!(execution.tokens_used, 0);
    }

    #[tokio::test]
    async fn test_double_run_rejected() {
        let mut agent = hybrid_agent(1000);
        agent.status = AgentStatus::Running;

        let executor = FnExecutor::new(|_, _, _| {
            Ok(ExecutorOutput {
                output: json!("x"),
                tokens_used: 1,
            })
        });

        let execution = agent.execute("", &executor).await;
        assert_eq!(execution.error.as_deref(), Some("already running"));
        assert_eq!(agent.status, AgentStatus::Failed);
    }

    #[test]
    fn test_suspend_resume_transitions() {
        let mut agent = hybrid_agent(1000);

        assert!(agent.suspend().is_err());

        agent.status = AgentStatus::Running;
        agent.suspend().unwrap();
        assert_eq!(agent.status, AgentStatus::Suspended);

        agent.resume().unwrap();
        assert_eq!(agent.status, AgentStatus::Running);

        assert!(agent.resume().is_err());
    }
}
