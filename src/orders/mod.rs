//! Purchase requests that came out of the chat approval flow.
//!
//! Rejecting a reorder suggestion files a [`PendingOrder`] for manager
//! review; approving one synthesizes a [`PurchaseOrder`]. Pending orders move
//! through `pending -> approved | rejected -> archived`, and a retention sweep
//! archives and eventually purges decided orders. Orders still pending are
//! never touched by the sweep.

use crate::agents::suggestions::ReorderSuggestion;
use crate::memory::SessionStore;
use crate::types::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

/// Reason recorded when the user turns a suggestion down in chat.
pub const DEFAULT_REJECTION_REASON: &str = "User rejected via chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Archived,
}

/// A purchase request awaiting a manager's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PendingOrder {
    pub id: Uuid,
    pub item: String,
    pub quantity: u32,
    pub location: String,
    pub reason: String,
    pub status: OrderStatus,
    pub manager_approved: bool,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl PendingOrder {
    pub fn from_rejection(reorder: &ReorderSuggestion, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item: reorder.item.clone(),
            quantity: reorder.quantity,
            location: reorder.location.clone(),
            reason: reason.into(),
            status: OrderStatus::Pending,
            manager_approved: false,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Manager sign-off.
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.decide(OrderStatus::Approved, now)?;
        self.manager_approved = true;
        Ok(())
    }

    /// Manager turns the request down.
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.decide(OrderStatus::Rejected, now)
    }

    fn decide(&mut self, status: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.is_pending() {
            return Err(AppError::InvalidInput(format!(
                "Order {} is already {:?}",
                self.id, self.status
            )));
        }
        self.status = status;
        self.decided_at = Some(now);
        Ok(())
    }
}

/// An approved reorder. Only kept in session memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub item: String,
    pub quantity: u32,
    pub location: String,
    pub estimated_delivery: String,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn from_reorder(reorder: &ReorderSuggestion) -> Self {
        Self {
            id: Uuid::new_v4(),
            item: reorder.item.clone(),
            quantity: reorder.quantity,
            location: reorder.location.clone(),
            estimated_delivery: reorder.estimated_delivery.clone(),
            created_at: Utc::now(),
        }
    }
}

// ============= Retention =============

/// How long decided orders are kept around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Decided orders older than this become `archived`
    pub archive_after: Duration,
    /// Archived orders older than this (since decision) are dropped
    pub purge_after: Duration,
}

impl RetentionPolicy {
    pub fn from_hours(archive_after_hours: i64, purge_after_hours: i64) -> Self {
        Self {
            archive_after: Duration::hours(archive_after_hours),
            purge_after: Duration::hours(purge_after_hours),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    pub archived: usize,
    pub purged: usize,
}

impl std::ops::AddAssign for SweepReport {
    fn add_assign(&mut self, other: Self) {
        self.archived += other.archived;
        self.purged += other.purged;
    }
}

/// Archive and purge decided orders in one list.
pub fn apply_retention(
    orders: &mut Vec<PendingOrder>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = SweepReport::default();

    for order in orders.iter_mut() {
        if matches!(order.status, OrderStatus::Approved | OrderStatus::Rejected) {
            if let Some(decided_at) = order.decided_at {
                if now - decided_at >= policy.archive_after {
                    order.status = OrderStatus::Archived;
                    report.archived += 1;
                }
            }
        }
    }

    let before = orders.len();
    orders.retain(|order| {
        !(order.status == OrderStatus::Archived
            && order
                .decided_at
                .map(|decided_at| now - decided_at >= policy.purge_after)
                .unwrap_or(false))
    });
    report.purged = before - orders.len();

    report
}

/// Run the retention sweep over every session in the store.
pub async fn sweep_sessions(
    sessions: &dyn SessionStore,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut total = SweepReport::default();
    for key in sessions.keys().await {
        if let Some(mut memory) = sessions.checkout_existing(&key).await {
            let report = apply_retention(&mut memory.pending_orders, policy, now);
            if report != SweepReport::default() {
                debug!(
                    "Retention for {}: archived {}, purged {}",
                    key, report.archived, report.purged
                );
            }
            total += report;
        }
    }
    total
}

/// Spawn the periodic retention sweep.
///
/// The policy is re-read from `policy_source` on every tick so configuration
/// reloads take effect without a restart.
pub fn spawn_retention_sweeper<F>(
    sessions: Arc<dyn SessionStore>,
    interval: std::time::Duration,
    policy_source: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> RetentionPolicy + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = sweep_sessions(sessions.as_ref(), &policy_source(), Utc::now()).await;
            if report.archived > 0 || report.purged > 0 {
                info!(
                    "Order retention sweep archived {} and purged {} orders",
                    report.archived, report.purged
                );
            }
        }
    })
}
