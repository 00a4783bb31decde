//! # Unified Pipeline - From Task Text to a Schedulable Node
//!
//! The pipeline is the single entry point for inbound tasks. It parses the
//! structured task format, validates required fields, consults the policy
//! guard, maps the task onto a DAG node deterministically, and runs the
//! contract gate. Any stage can stop the pipeline: parse and validation
//! problems surface as errors, policy and contract refusals as `blocked`.
//!
//! ## Input format
//!
//! ```text
//! [TASK: <name>]
//! type: auto|manual|review
//! files: a, b, c
//! action: <free text>
//! verify: <command or assertion>
//! done: <completion criterion>
//! wave: <positive int, optional>
//! ```
//!
//! Field names are case-insensitive and values are trimmed.

use aegis_policy::{ContractChecker, ContractInput};
use aegis_swarm::{NodeType, PolicyGuard, TaskNode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

static TASK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\[TASK:\s*(.+?)\]\s*$").expect("task header pattern"));

/// Kind of structured task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Auto,
    Manual,
    Review,
}

/// Parsed and validated structured task
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct StructuredTask {
    #[validate(length(min = 1))]
    pub name: String,
    pub task_type: TaskType,
    #[validate(length(min = 1))]
    pub files: Vec<String>,
    #[validate(length(min = 1))]
    pub action: String,
    #[validate(length(min = 1))]
    pub verify: String,
    #[validate(length(min = 1))]
    pub done: String,
    pub wave: Option<u32>,
}

/// Terminal status of one pipeline pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Blocked,
    Error,
}

/// Everything a caller learns from `prepare`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub status: PipelineStatus,
    pub task: Option<StructuredTask>,
    pub node: Option<TaskNode>,
    pub node_id: Option<String>,
    pub violations: Vec<String>,
    pub error: Option<String>,
}

impl PipelineOutcome {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: PipelineStatus::Error,
            task: None,
            node: None,
            node_id: None,
            violations: Vec::new(),
            error: Some(message.into()),
        }
    }

    fn blocked(task: StructuredTask, reason: Option<String>, violations: Vec<String>) -> Self {
        Self {
            status: PipelineStatus::Blocked,
            task: Some(task),
            node: None,
            node_id: None,
            violations,
            error: reason,
        }
    }
}

/// Parse → validate → policy → node → contracts
pub struct UnifiedPipeline {
    policy: Option<Arc<dyn PolicyGuard>>,
    contracts: Option<Arc<ContractChecker>>,
    counter: AtomicUsize,
}

impl UnifiedPipeline {
    pub fn new() -> Self {
        Self {
            policy: None,
            contracts: None,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn with_policy(mut self, guard: Arc<dyn PolicyGuard>) -> Self {
        self.policy = Some(guard);
        self
    }

    pub fn with_contracts(mut self, checker: Arc<ContractChecker>) -> Self {
        self.contracts = Some(checker);
        self
    }

    /// Run the full pipeline over one task text
    pub async fn prepare(&self, text: &str) -> PipelineOutcome {
        let task = match Self::parse(text) {
            Ok(task) => task,
            Err(message) => return PipelineOutcome::error(message),
        };

        if let Err(missing) = Self::validate(&task) {
            return PipelineOutcome::error(format!("Missing fields: {missing}"));
        }

        if let Some(policy) = &self.policy {
            let decision = policy.assess("execute_task", &task.files.join(",")).await;
            if !decision.approved {
                info!(task = %task.name, reason = %decision.reason, "task blocked by policy");
                return PipelineOutcome::blocked(task, Some(decision.reason), Vec::new());
            }
        }

        let node = self.build_node(&task);

        if let Some(contracts) = &self.contracts {
            let report = contracts
                .check_all(&ContractInput {
                    changed_files: task.files.clone(),
                    diff: String::new(),
                    project_root: String::new(),
                    codebase_map: None,
                })
                .await;
            if !report.all_passed {
                info!(task = %task.name, "task blocked by contracts");
                return PipelineOutcome::blocked(task, None, report.violations());
            }
        }

        debug!(node = %node.id, "pipeline produced node");
        PipelineOutcome {
            status: PipelineStatus::Success,
            node_id: Some(node.id.clone()),
            node: Some(node),
            task: Some(task),
            violations: Vec::new(),
            error: None,
        }
    }

    /// Parse the structured task text
    fn parse(text: &str) -> Result<StructuredTask, String> {
        let name = TASK_HEADER
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .ok_or_else(|| "missing [TASK: <name>] header".to_string())?;

        let mut task = StructuredTask {
            name,
            task_type: TaskType::Auto,
            files: Vec::new(),
            action: String::new(),
            verify: String::new(),
            done: String::new(),
            wave: None,
        };

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "type" => {
                    task.task_type = match value.to_lowercase().as_str() {
                        "auto" | "" => TaskType::Auto,
                        "manual" => TaskType::Manual,
                        "review" => TaskType::Review,
                        other => return Err(format!("unknown task type: {other}")),
                    };
                }
                "files" => {
                    task.files = value
                        .split(',')
                        .map(|f| f.trim().to_string())
                        .filter(|f| !f.is_empty())
                        .collect();
                }
                "action" => task.action = value.to_string(),
                "verify" => task.verify = value.to_string(),
                "done" => task.done = value.to_string(),
                "wave" => {
                    let wave: u32 = value
                        .parse()
                        .map_err(|_| format!("invalid wave: {value}"))?;
                    if wave == 0 {
                        return Err("wave must be a positive integer".to_string());
                    }
                    task.wave = Some(wave);
                }
                _ => {}
            }
        }

        Ok(task)
    }

    /// Collect missing required fields into a sorted, comma-joined list
    fn validate(task: &StructuredTask) -> Result<(), String> {
        match task.validate() {
            Ok(()) => Ok(()),
            Err(errors) => {
                let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
                fields.sort_unstable();
                Err(fields.join(", "))
            }
        }
    }

    /// Deterministic task-to-node mapping
    fn build_node(&self, task: &StructuredTask) -> TaskNode {
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("task_{index}_{}", snake_case(&task.name));

        let (role, node_type) = match task.task_type {
            TaskType::Auto => ("coder", NodeType::Hybrid),
            TaskType::Manual => ("coder", NodeType::Llm),
            TaskType::Review => ("reviewer", NodeType::Llm),
        };

        TaskNode::new(
            id,
            role,
            node_type,
            format!(
                "{} [verify: {}] [done: {}]",
                task.action, task.verify, task.done
            ),
        )
        .with_budget(2000)
        .with_max_retries(2)
    }
}

impl Default for UnifiedPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_end_matches('_').to_string()
}
