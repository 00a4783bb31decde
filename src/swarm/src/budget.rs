//! # Budget - Hierarchical Token Accounting
//!
//! One budget instance is the single source of truth for token spend across
//! a DAG run. Reservations are advisory per-agent caps granted at spawn time:
//! a reservation never exceeds 30% of what remains after spend and prior
//! reservations, so no single agent can monopolise the pool.
//!
//! When a [`DailyTokenSource`] is attached (normally the LLM router), daily
//! consumption readings come from it exclusively; the local `spent` counter
//! still owns per-run accounting.

use crate::types::BudgetStats;
use aegis_brain::DailyTokenSource;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct BudgetInner {
    spent: u64,
    reservations: HashMap<String, u64>,
}

/// Token budget with per-agent reservations
pub struct Budget {
    total: u64,
    inner: RwLock<BudgetInner>,
    daily_source: Option<Arc<dyn DailyTokenSource>>,
}

impl Budget {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            inner: RwLock::new(BudgetInner::default()),
            daily_source: None,
        }
    }

    /// Budget whose daily readings defer to an external source of truth
    pub fn with_daily_source(total: u64, source: Arc<dyn DailyTokenSource>) -> Self {
        Self {
            total,
            inner: RwLock::new(BudgetInner::default()),
            daily_source: Some(source),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Reserve tokens for an agent
    ///
    /// Grants `min(requested, floor(0.30 × remaining))` where remaining
    /// excludes spend and every prior reservation, and records the grant.
    pub async fn reserve(&self, agent_id: &str, requested: u64) -> u64 {
        let mut inner = self.inner.write().await;
        let reserved_total: u64 = inner.reservations.values().sum();
        let remaining = self
            .total
            .saturating_sub(inner.spent)
            .saturating_sub(reserved_total);
        let granted = requested.min(remaining * 3 / 10);

        *inner.reservations.entry(agent_id.to_string()).or_insert(0) += granted;
        debug!(agent_id, requested, granted, "tokens reserved");
        granted
    }

    /// Whether `n` tokens can still be spent outside existing reservations
    pub async fn can_spend(&self, n: u64) -> bool {
        let inner = self.inner.read().await;
        let reserved_total: u64 = inner.reservations.values().sum();
        n <= self
            .total
            .saturating_sub(inner.spent)
            .saturating_sub(reserved_total)
    }

    /// Record actual spend for an agent, consuming its reservation first
    pub async fn spend(&self, agent_id: &str, n: u64) {
        let mut inner = self.inner.write().await;
        inner.spent += n;

        if let Some(reservation) = inner.reservations.get_mut(agent_id) {
            *reservation = reservation.saturating_sub(n);
        }

        if inner.spent >= self.total {
            warn!(spent = inner.spent, total = self.total, "budget exhausted");
        }
    }

    /// Clear an agent's reservation
    pub async fn release(&self, agent_id: &str) {
        self.inner.write().await.reservations.remove(agent_id);
    }

    pub async fn is_exhausted(&self) -> bool {
        self.inner.read().await.spent >= self.total
    }

    pub async fn spent(&self) -> u64 {
        self.inner.read().await.spent
    }

    pub async fn stats(&self) -> BudgetStats {
        let inner = self.inner.read().await;
        let reserved: u64 = inner.reservations.values().sum();
        BudgetStats {
            total: self.total,
            spent: inner.spent,
            reserved,
            remaining: self.total.saturating_sub(inner.spent).saturating_sub(reserved),
            utilization: if self.total == 0 {
                100.0
            } else {
                inner.spent as f64 * 100.0 / self.total as f64
            },
        }
    }

    /// Tokens consumed today
    ///
    /// Reads the attached [`DailyTokenSource`] when present; otherwise local
    /// spend stands in.
    pub async fn daily_tokens_used(&self) -> u64 {
        match &self.daily_source {
            Some(source) => source.daily_tokens_used().await,
            None => self.spent().await,
        }
    }
}
