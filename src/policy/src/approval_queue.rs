//! # Approval Queue - Pending Human Decisions for HIGH-Risk Actions
//!
//! Holds approval requests raised by the risk engine until a human (or the
//! gateway acting for one) approves or rejects them by id. A caller may await
//! the decision for its request; the wait resolves with the next decision or
//! times out into an implicit reject after a configurable window.

use crate::types::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Process-scoped queue of pending approval requests
pub struct ApprovalQueue {
    requests: Arc<RwLock<HashMap<Uuid, ApprovalRequest>>>,
    waiters: Arc<RwLock<HashMap<Uuid, Vec<oneshot::Sender<bool>>>>>,
    default_timeout: Duration,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30 * 60))
    }

    /// Create a queue with a custom await window
    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            waiters: Arc::new(RwLock::new(HashMap::new())),
            default_timeout,
        }
    }

    /// Enqueue a request and return its id
    pub async fn enqueue(
        &self,
        risk: RiskLevel,
        operation: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Uuid {
        let request = ApprovalRequest {
            id: Uuid::new_v4(),
            risk,
            operation: operation.into(),
            target: target.into(),
            reason: reason.into(),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
        };

        let id = request.id;
        info!(%id, operation = %request.operation, "approval request enqueued");
        self.requests.write().await.insert(id, request);
        id
    }

    /// Requests still awaiting a decision
    pub async fn get_pending(&self) -> Vec<ApprovalRequest> {
        let mut pending: Vec<ApprovalRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// Approve a pending request; returns `false` for unknown or terminal ids
    pub async fn approve(&self, id: Uuid) -> bool {
        self.decide(id, ApprovalStatus::Approved).await
    }

    /// Reject a pending request; returns `false` for unknown or terminal ids
    pub async fn reject(&self, id: Uuid) -> bool {
        self.decide(id, ApprovalStatus::Rejected).await
    }

    async fn decide(&self, id: Uuid, status: ApprovalStatus) -> bool {
        let decided = {
            let mut requests = self.requests.write().await;
            match requests.get_mut(&id) {
                Some(request) if request.status == ApprovalStatus::Pending => {
                    request.status = status;
                    true
                }
                Some(_) => false,
                None => false,
            }
        };

        if decided {
            let approved = status == ApprovalStatus::Approved;
            info!(%id, approved, "approval request decided");
            if let Some(waiters) = self.waiters.write().await.remove(&id) {
                for waiter in waiters {
                    let _ = waiter.send(approved);
                }
            }
        }

        decided
    }

    /// Await the decision for a request using the queue's default window
    pub async fn await_decision(&self, id: Uuid) -> PolicyResult<bool> {
        self.await_decision_within(id, self.default_timeout).await
    }

    /// Await the decision for a request
    ///
    /// Resolves with the decision when one arrives. Expiry of the window
    /// implicitly rejects the request and resolves `Ok(false)`.
    pub async fn await_decision_within(&self, id: Uuid, window: Duration) -> PolicyResult<bool> {
        let rx = {
            let requests = self.requests.read().await;
            match requests.get(&id) {
                None => return Err(PolicyError::ApprovalNotFound(id)),
                Some(request) if request.status != ApprovalStatus::Pending => {
                    return Ok(request.status == ApprovalStatus::Approved);
                }
                Some(_) => {
                    let (tx, rx) = oneshot::channel();
                    self.waiters.write().await.entry(id).or_default().push(tx);
                    rx
                }
            }
        };

        match tokio::time::timeout(window, rx).await {
            Ok(Ok(approved)) => Ok(approved),
            Ok(Err(_)) => Err(PolicyError::Internal(format!(
                "approval waiter dropped for {id}"
            ))),
            Err(_) => {
                warn!(%id, "approval window expired, rejecting");
                self.reject(id).await;
                Ok(false)
            }
        }
    }

    /// Look up a request regardless of status
    pub async fn get(&self, id: Uuid) -> Option<ApprovalRequest> {
        self.requests.read().await.get(&id).cloned()
    }
}

impl Default for ApprovalQueue {
    fn default() -> Self {
        Self::new()
    }
}
