//! Approve / reject handling for a session's pending bundle.
//!
//! A session is either idle or awaiting approval of exactly one bundle.
//! Approving a transfer moves stock atomically through the inventory store;
//! approving the reorder records a purchase order; rejecting files the reorder
//! as a pending order for manager review. Every successful decision clears the
//! bundle and leaves an audit line in the conversation history.

use super::intent::ApprovalTarget;
use super::suggestions::{SuggestionBundle, TransferSuggestion};
use crate::inventory::{InventoryStore, TransferReceipt};
use crate::memory::ConversationMemory;
use crate::orders::{PendingOrder, PurchaseOrder, DEFAULT_REJECTION_REASON};
use crate::types::{AppError, Result};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Transferred(TransferReceipt),
    Ordered(PurchaseOrder),
    Rejected(PendingOrder),
    /// Approve or reject arrived with no bundle
    NothingPending,
    /// The approval did not say which suggestion; bundle kept
    NeedsClarification(String),
    /// Execution failed; bundle kept
    Failed(String),
}

impl ApprovalOutcome {
    /// Reply shown in the chat.
    pub fn message(&self) -> String {
        match self {
            ApprovalOutcome::Transferred(r) => format!(
                "✅ Transferred {} {} from {} to {}. {} now has {}, {} now has {}.",
                r.quantity,
                r.item,
                r.from_location,
                r.to_location,
                r.from_location,
                r.source_after,
                r.to_location,
                r.destination_after
            ),
            ApprovalOutcome::Ordered(po) => format!(
                "✅ Purchase order {} placed: {} {} for {}. Estimated delivery: {}.",
                po.id, po.quantity, po.item, po.location, po.estimated_delivery
            ),
            ApprovalOutcome::Rejected(order) => format!(
                "Understood. The reorder of {} {} for {} was sent to a manager for review (order {}).",
                order.quantity, order.item, order.location, order.id
            ),
            ApprovalOutcome::NothingPending => {
                "There is nothing pending approval right now.".to_string()
            }
            ApprovalOutcome::NeedsClarification(text) | ApprovalOutcome::Failed(text) => {
                text.clone()
            }
        }
    }
}

enum Choice {
    Transfer(TransferSuggestion),
    Reorder,
}

pub struct ApprovalExecutor {
    inventory: Arc<dyn InventoryStore>,
}

impl ApprovalExecutor {
    pub fn new(inventory: Arc<dyn InventoryStore>) -> Self {
        Self { inventory }
    }

    fn choose(bundle: &SuggestionBundle, target: ApprovalTarget) -> std::result::Result<Choice, String> {
        match target {
            ApprovalTarget::Reorder => Ok(Choice::Reorder),
            ApprovalTarget::Any if bundle.transfers.is_empty() => Ok(Choice::Reorder),
            ApprovalTarget::Any => Err(format!(
                "There are {} suggestions pending. Which one should I apply?\n{}",
                bundle.len(),
                bundle.options_text()
            )),
            ApprovalTarget::Transfer(Some(rank)) => bundle
                .transfer(rank)
                .cloned()
                .map(Choice::Transfer)
                .ok_or_else(|| {
                    format!(
                        "There is no transfer option {}.\n{}",
                        rank,
                        bundle.options_text()
                    )
                }),
            ApprovalTarget::Transfer(None) => match bundle.transfers.as_slice() {
                [only] => Ok(Choice::Transfer(only.clone())),
                [] => Err(format!(
                    "No other location has surplus {}. Say \"approve reorder\" to order more.",
                    bundle.context.item
                )),
                _ => Err(format!(
                    "Several transfers are possible. Which one?\n{}",
                    bundle.options_text()
                )),
            },
        }
    }

    /// Apply the targeted suggestion of the pending bundle.
    pub async fn approve(
        &self,
        memory: &mut ConversationMemory,
        target: ApprovalTarget,
    ) -> Result<ApprovalOutcome> {
        let Some(bundle) = memory.pending_approvals.as_ref() else {
            return Ok(ApprovalOutcome::NothingPending);
        };

        let choice = match Self::choose(bundle, target) {
            Ok(choice) => choice,
            Err(question) => return Ok(ApprovalOutcome::NeedsClarification(question)),
        };

        match choice {
            Choice::Transfer(t) => {
                let receipt = match self
                    .inventory
                    .transfer(&t.from_location, &t.to_location, &t.item, t.quantity)
                    .await
                {
                    Ok(receipt) => receipt,
                    Err(
                        e @ (AppError::InsufficientStock(_)
                        | AppError::NotFound(_)
                        | AppError::InvalidInput(_)),
                    ) => {
                        warn!("Transfer approval failed for {}: {}", memory.key, e);
                        return Ok(ApprovalOutcome::Failed(format!(
                            "❌ Could not transfer {} {} from {}: {}. The suggestions are still pending.",
                            t.quantity, t.item, t.from_location, e
                        )));
                    }
                    Err(e) => return Err(e),
                };

                memory.clear_bundle();
                memory.audit(format!(
                    "Transferred {} {} from {} to {} ({}: {} -> {}, {}: {} -> {})",
                    receipt.quantity,
                    receipt.item,
                    receipt.from_location,
                    receipt.to_location,
                    receipt.from_location,
                    receipt.source_before,
                    receipt.source_after,
                    receipt.to_location,
                    receipt.destination_before,
                    receipt.destination_after
                ));
                info!(
                    "Session {} approved transfer of {} {}",
                    memory.key, receipt.quantity, receipt.item
                );
                Ok(ApprovalOutcome::Transferred(receipt))
            }
            Choice::Reorder => {
                let order = PurchaseOrder::from_reorder(&bundle.reorder);
                memory.clear_bundle();
                memory.purchase_orders.push(order.clone());
                memory.audit(format!(
                    "Purchase order {} approved: {} {} for {}",
                    order.id, order.quantity, order.item, order.location
                ));
                info!(
                    "Session {} approved reorder of {} {}",
                    memory.key, order.quantity, order.item
                );
                Ok(ApprovalOutcome::Ordered(order))
            }
        }
    }

    /// Turn the pending bundle down, filing its reorder for manager review.
    pub fn reject(&self, memory: &mut ConversationMemory, reason: Option<&str>) -> ApprovalOutcome {
        let Some(bundle) = memory.clear_bundle() else {
            return ApprovalOutcome::NothingPending;
        };

        let order = PendingOrder::from_rejection(
            &bundle.reorder,
            reason.unwrap_or(DEFAULT_REJECTION_REASON),
        );
        memory.pending_orders.push(order.clone());
        memory.audit(format!(
            "Reorder of {} {} for {} rejected ({}); pending order {} filed",
            order.quantity, order.item, order.location, order.reason, order.id
        ));
        info!("Session {} rejected bundle {}", memory.key, bundle.id);
        ApprovalOutcome::Rejected(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::suggestions::{SuggestionGenerator, SuggestionSettings};
    use crate::inventory::{Adjustment, InMemoryInventory, InventoryRecord};
    use crate::memory::SessionKey;
    use crate::orders::OrderStatus;

    async fn setup(records: Vec<InventoryRecord>) -> (Arc<InMemoryInventory>, ConversationMemory) {
        let inventory = Arc::new(InMemoryInventory::with_records(records));
        let change = inventory
            .adjust("ICU-01", "N95 Masks", Adjustment::Delta(-5))
            .await
            .unwrap();
        let generator = SuggestionGenerator::new(inventory.clone(), SuggestionSettings::default());
        let bundle = generator.generate(&change).await.unwrap().unwrap();
        let mut memory = ConversationMemory::new(SessionKey::new("u", "s"));
        memory.set_bundle(bundle);
        (inventory, memory)
    }

    fn demo() -> Vec<InventoryRecord> {
        vec![
            InventoryRecord::new("ICU-01", "N95 Masks", 71, 75),
            InventoryRecord::new("ER-01", "N95 Masks", 30, 15),
            InventoryRecord::new("WARD-02", "N95 Masks", 40, 30),
        ]
    }

    #[tokio::test]
    async fn test_approve_with_nothing_pending() {
        let inventory = Arc::new(InMemoryInventory::new());
        let executor = ApprovalExecutor::new(inventory);
        let mut memory = ConversationMemory::new(SessionKey::new("u", "s"));

        let outcome = executor
            .approve(&mut memory, ApprovalTarget::Any)
            .await
            .unwrap();
        assert_eq!(outcome, ApprovalOutcome::NothingPending);
        assert!(memory.history.is_empty());
        assert_eq!(executor.reject(&mut memory, None), ApprovalOutcome::NothingPending);
    }

    #[tokio::test]
    async fn test_ambiguous_yes_changes_nothing() {
        let (inventory, mut memory) = setup(demo()).await;
        let executor = ApprovalExecutor::new(inventory.clone());

        let outcome = executor
            .approve(&mut memory, ApprovalTarget::Any)
            .await
            .unwrap();
        assert!(matches!(outcome, ApprovalOutcome::NeedsClarification(_)));
        assert!(memory.pending_approvals.is_some());
        let er = inventory.get("ER-01", "N95 Masks").await.unwrap().unwrap();
        assert_eq!(er.quantity, 30);
    }

    #[tokio::test]
    async fn test_approve_top_transfer() {
        let (inventory, mut memory) = setup(demo()).await;
        let executor = ApprovalExecutor::new(inventory.clone());

        let outcome = executor
            .approve(&mut memory, ApprovalTarget::Transfer(Some(1)))
            .await
            .unwrap();
        let ApprovalOutcome::Transferred(receipt) = outcome else {
            panic!("expected a transfer");
        };
        assert_eq!(receipt.source_after, receipt.source_before - receipt.quantity);
        assert_eq!(
            receipt.destination_after,
            receipt.destination_before + receipt.quantity
        );
        assert_eq!((receipt.source_after, receipt.destination_after), (15, 81));
        assert!(memory.pending_approvals.is_none());
        assert!(memory.history.last().unwrap().content.starts_with("[audit]"));
    }

    #[tokio::test]
    async fn test_failed_transfer_keeps_bundle() {
        let (inventory, mut memory) = setup(demo()).await;
        // Stock drained elsewhere after the suggestion was made
        inventory
            .adjust("ER-01", "N95 Masks", Adjustment::Set(3))
            .await
            .unwrap();
        let executor = ApprovalExecutor::new(inventory.clone());

        let outcome = executor
            .approve(&mut memory, ApprovalTarget::Transfer(Some(1)))
            .await
            .unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Failed(_)));
        assert!(memory.pending_approvals.is_some());
        let icu = inventory.get("ICU-01", "N95 Masks").await.unwrap().unwrap();
        assert_eq!(icu.quantity, 66);
    }

    #[tokio::test]
    async fn test_bare_yes_with_only_reorder_places_order() {
        let (inventory, mut memory) = setup(vec![InventoryRecord::new("ICU-01", "N95 Masks", 71, 75)]).await;
        let executor = ApprovalExecutor::new(inventory);

        let outcome = executor
            .approve(&mut memory, ApprovalTarget::Any)
            .await
            .unwrap();
        let ApprovalOutcome::Ordered(po) = outcome else {
            panic!("expected a purchase order");
        };
        assert_eq!(po.quantity, 84);
        assert_eq!(memory.purchase_orders.len(), 1);
        assert!(memory.pending_approvals.is_none());
    }

    #[tokio::test]
    async fn test_reject_files_one_order() {
        let (inventory, mut memory) = setup(demo()).await;
        let executor = ApprovalExecutor::new(inventory);

        let outcome = executor.reject(&mut memory, None);
        let ApprovalOutcome::Rejected(order) = outcome else {
            panic!("expected a rejection");
        };
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.reason, DEFAULT_REJECTION_REASON);
        assert_eq!(memory.pending_orders.len(), 1);
        assert!(memory.pending_approvals.is_none());

        assert_eq!(executor.reject(&mut memory, Some("again")), ApprovalOutcome::NothingPending);
        assert_eq!(memory.pending_orders.len(), 1);
    }
}
