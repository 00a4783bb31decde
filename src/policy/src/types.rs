//! # Policy Types - Core Data Structures for Risk and Approval
//!
//! This module defines the data structures shared by the risk engine, the
//! approval queue, the file guard and the contract checker. These types
//! describe action contexts, risk verdicts, pending approvals and contract
//! reports as they flow through the policy layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Risk band assigned to an assessed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Context describing a side-effecting action about to be performed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    /// Action token, e.g. `read`, `write`, `deploy`, `secrets`
    pub action: String,
    /// Target surface, e.g. `workspace`, `config`, `production`
    pub target: String,
    /// Whether the action can be undone
    pub reversible: bool,
    /// Whether the action touches sensitive data
    pub sensitive_data: bool,
    /// Whether the action is time-pressured
    pub urgent: bool,
}

impl ActionContext {
    /// Create a context with the default reversibility/sensitivity/urgency flags
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            reversible: true,
            sensitive_data: false,
            urgent: false,
        }
    }

    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive_data = true;
        self
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

/// Verdict produced by the risk engine for one action context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk: RiskLevel,
    /// Raw weighted score in `[0, 1]`; rounded to two decimals for display only
    pub score: f64,
    /// Whether the action may proceed without a human in the loop
    pub approved: bool,
    /// HIGH-risk actions require explicit human approval
    pub requires_human_approval: bool,
    /// Terse trace of the two largest weighted contributions
    pub reason: String,
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2}): {}", self.risk, self.score, self.reason)
    }
}

/// Lifecycle of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A HIGH-risk request awaiting a human decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub risk: RiskLevel,
    pub operation: String,
    pub target: String,
    pub reason: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

/// Gate decision combining a risk verdict with an optional pending approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub assessment: RiskAssessment,
    /// Set when the action was parked on the approval queue
    pub approval_id: Option<Uuid>,
}

/// Input handed to every registered contract
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractInput {
    /// Paths touched by the change under review
    pub changed_files: Vec<String>,
    /// Unified diff of the change; may be empty
    pub diff: String,
    /// Root of the project the change applies to
    pub project_root: String,
    /// Optional single-string projection of the codebase map
    pub codebase_map: Option<String>,
}

/// Result of evaluating a single contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractOutcome {
    pub contract: String,
    pub passed: bool,
    pub violations: Vec<String>,
}

/// Aggregate report across all registered contracts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractReport {
    pub all_passed: bool,
    pub results: Vec<ContractOutcome>,
}

impl ContractReport {
    /// Flattened violation list across every failed contract
    pub fn violations(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .flat_map(|r| r.violations.iter().cloned())
            .collect()
    }
}

/// Health status reported by policy components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded { issues: Vec<String> },
}

/// Error types for the policy layer
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Policy denied: {0}")]
    Denied(String),

    #[error("Approval request not found: {0}")]
    ApprovalNotFound(Uuid),

    #[error("Approval timed out: {0}")]
    ApprovalTimeout(Uuid),

    #[error("Contract violation: {0:?}")]
    ContractViolation(Vec<String>),

    #[error("Path rejected: {0}")]
    PathRejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Configuration recognised by the policy layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Roots a path must live under to be touchable
    pub allowed_roots: Vec<String>,
    /// Window an approval may stay pending before it is implicitly rejected
    pub approval_timeout_secs: u64,
    /// Extensions the naming contract applies to
    pub naming_extensions: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_roots: vec!["workspace/".to_string()],
            approval_timeout_secs: 30 * 60,
            naming_extensions: vec!["ts".to_string(), "tsx".to_string()],
        }
    }
}
