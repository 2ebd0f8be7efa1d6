//! Dashboard event hub.
//!
//! Stock changes and low-stock alerts are broadcast to every connected
//! WebSocket client. Delivery is best effort: a client that falls behind the
//! channel capacity skips the events it missed.

use crate::agents::suggestions::SuggestionBundle;
use crate::inventory::{InventoryRecord, TransferReceipt};
use crate::orders::{PendingOrder, PurchaseOrder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast capacity per subscriber.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Wire format: `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    DashboardUpdate(Value),
    NewAlert(Value),
}

impl DashboardEvent {
    pub fn stock_changed(record: &InventoryRecord, before: u32) -> Self {
        DashboardEvent::DashboardUpdate(json!({
            "kind": "stock_changed",
            "location": record.location,
            "item": record.item,
            "before": before,
            "quantity": record.quantity,
            "min_threshold": record.min_threshold,
        }))
    }

    pub fn transferred(receipt: &TransferReceipt) -> Self {
        DashboardEvent::DashboardUpdate(json!({
            "kind": "transfer",
            "receipt": receipt,
        }))
    }

    pub fn purchase_ordered(order: &PurchaseOrder) -> Self {
        DashboardEvent::DashboardUpdate(json!({
            "kind": "purchase_order",
            "order": order,
        }))
    }

    pub fn order_changed(order: &PendingOrder) -> Self {
        DashboardEvent::DashboardUpdate(json!({
            "kind": "order",
            "order": order,
        }))
    }

    pub fn low_stock(bundle: &SuggestionBundle) -> Self {
        DashboardEvent::NewAlert(json!({
            "kind": "low_stock",
            "context": bundle.context,
            "suggestions": bundle.len(),
            "bundle_id": bundle.id,
        }))
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::DashboardUpdate(_) => "dashboard_update",
            DashboardEvent::NewAlert(_) => "new_alert",
        }
    }
}

/// Broadcast hub; cheap to clone.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<DashboardEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    /// Send to all current subscribers; returns how many received it.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        let kind = event.event_type();
        match self.sender.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!("No subscribers for {} event", kind);
                0
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let record = InventoryRecord::new("ICU-01", "N95 Masks", 66, 75);
        let json = serde_json::to_value(DashboardEvent::stock_changed(&record, 71)).unwrap();
        assert_eq!(json["type"], "dashboard_update");
        assert_eq!(json["data"]["quantity"], 66);
        assert_eq!(json["data"]["before"], 71);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = EventHub::new(8);
        assert_eq!(hub.publish(DashboardEvent::NewAlert(json!({}))), 0);

        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.receiver_count(), 2);

        let event = DashboardEvent::NewAlert(json!({"kind": "low_stock"}));
        assert_eq!(hub.publish(event.clone()), 2);
        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips() {
        let hub = EventHub::new(2);
        let mut rx = hub.subscribe();
        for i in 0..5 {
            hub.publish(DashboardEvent::DashboardUpdate(json!({ "n": i })));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        let next = rx.recv().await.unwrap();
        assert_eq!(next, DashboardEvent::DashboardUpdate(json!({ "n": 3 })));
    }
}
