//! # Aegis Policy - Risk, Approval and Contract Gating
//!
//! The policy layer gates every agent spawn and every side-effecting
//! operation in the Aegis kernel. It combines four components:
//!
//! - **RiskEngine**: weighted LOW/MEDIUM/HIGH scoring of action contexts
//! - **ApprovalQueue**: pending HIGH-risk requests awaiting a human decision
//! - **FileGuard**: path allow-listing and secret redaction at boundaries
//! - **ContractChecker**: pre-output invariants over changed files and diffs
//!
//! `PolicyService` composes them behind one façade consumed by the
//! coordinator and the unified pipeline.

pub mod approval_queue;
pub mod contract_checker;
pub mod file_guard;
pub mod risk_engine;
pub mod types;

pub use approval_queue::ApprovalQueue;
pub use contract_checker::{
    ApiSignatureContract, ContractCheck, ContractChecker, NamingConventionContract,
    NoEnvAccessContract,
};
pub use file_guard::{redact, FileGuard};
pub use risk_engine::RiskEngine;
pub use types::*;

use std::sync::Arc;
use tracing::info;

/// Façade over the policy components
pub struct PolicyService {
    risk_engine: Arc<RiskEngine>,
    approval_queue: Arc<ApprovalQueue>,
    file_guard: Arc<FileGuard>,
    contract_checker: Arc<ContractChecker>,
}

impl PolicyService {
    pub fn new(config: PolicyConfig) -> Self {
        let service = Self {
            risk_engine: Arc::new(RiskEngine::new()),
            approval_queue: Arc::new(ApprovalQueue::with_timeout(
                std::time::Duration::from_secs(config.approval_timeout_secs),
            )),
            file_guard: Arc::new(FileGuard::with_roots(config.allowed_roots)),
            contract_checker: Arc::new(ContractChecker::new()),
        };

        info!(
            contracts = service.contract_checker.contract_names().len(),
            "policy service initialized"
        );
        service
    }

    /// Assess an action and, for HIGH risk, park it on the approval queue
    ///
    /// LOW and MEDIUM actions come back approved with no approval id. HIGH
    /// actions come back unapproved with the id of a pending request the
    /// caller may await.
    pub async fn gate(&self, ctx: &ActionContext) -> GateDecision {
        let assessment = self.risk_engine.assess(ctx);

        let approval_id = if assessment.requires_human_approval {
            Some(
                self.approval_queue
                    .enqueue(
                        assessment.risk,
                        ctx.action.clone(),
                        ctx.target.clone(),
                        assessment.reason.clone(),
                    )
                    .await,
            )
        } else {
            None
        };

        GateDecision {
            assessment,
            approval_id,
        }
    }

    pub fn risk_engine(&self) -> Arc<RiskEngine> {
        Arc::clone(&self.risk_engine)
    }

    pub fn approval_queue(&self) -> Arc<ApprovalQueue> {
        Arc::clone(&self.approval_queue)
    }

    pub fn file_guard(&self) -> Arc<FileGuard> {
        Arc::clone(&self.file_guard)
    }

    pub fn contract_checker(&self) -> Arc<ContractChecker> {
        Arc::clone(&self.contract_checker)
    }

    /// Health check across policy components
    pub async fn health_check(&self) -> HealthStatus {
        let mut issues = Vec::new();

        if self.contract_checker.contract_names().is_empty() {
            issues.push("no contracts registered".to_string());
        }

        if issues.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded { issues }
        }
    }
}

impl Default for PolicyService {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
