//! Low-stock suggestions.
//!
//! When a modification leaves a location below its minimum threshold the
//! generator builds a [`SuggestionBundle`]: transfers from locations holding
//! surplus of the same item, ranked by surplus, plus one automatic reorder.

use crate::inventory::{InventoryRecord, InventoryStore, StockChange};
use crate::types::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Target stock is this multiple of the minimum threshold.
pub const DEFAULT_REORDER_MULTIPLIER: f64 = 2.0;

/// Transfer options offered per bundle.
pub const DEFAULT_MAX_TRANSFER_CANDIDATES: usize = 3;

pub const DEFAULT_ESTIMATED_DELIVERY: &str = "2-3 business days";

/// How urgently a location needs restocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    /// Tier from how far below threshold the stock fell.
    pub fn from_levels(quantity: u32, min_threshold: u32) -> Self {
        if quantity >= min_threshold {
            return Urgency::Low;
        }
        if quantity == 0 {
            return Urgency::High;
        }
        let ratio = f64::from(min_threshold - quantity) / f64::from(min_threshold);
        if ratio >= 0.5 {
            Urgency::High
        } else if ratio >= 0.2 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

/// The inventory situation that triggered a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LowStockContext {
    pub location: String,
    pub item: String,
    pub quantity: u32,
    pub min_threshold: u32,
    pub shortfall: u32,
    pub unit: String,
    pub urgency: Urgency,
}

impl From<&InventoryRecord> for LowStockContext {
    fn from(record: &InventoryRecord) -> Self {
        Self {
            location: record.location.clone(),
            item: record.item.clone(),
            quantity: record.quantity,
            min_threshold: record.min_threshold,
            shortfall: record.shortfall(),
            unit: record.unit.clone(),
            urgency: Urgency::from_levels(record.quantity, record.min_threshold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransferSuggestion {
    pub id: Uuid,
    /// 1-based position, highest surplus first
    pub rank: usize,
    pub item: String,
    pub from_location: String,
    pub to_location: String,
    pub quantity: u32,
    /// Source surplus when the suggestion was made
    pub source_surplus: u32,
    pub urgency: Urgency,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReorderSuggestion {
    pub id: Uuid,
    pub item: String,
    pub location: String,
    pub current_quantity: u32,
    pub quantity: u32,
    pub urgency: Urgency,
    pub estimated_delivery: String,
    pub created_at: DateTime<Utc>,
}

/// One suggestion, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    InterTransfer(TransferSuggestion),
    AutomaticReorder(ReorderSuggestion),
}

/// Suggestions generated together after one modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuggestionBundle {
    pub id: Uuid,
    pub context: LowStockContext,
    pub transfers: Vec<TransferSuggestion>,
    pub reorder: ReorderSuggestion,
    pub created_at: DateTime<Utc>,
}

impl SuggestionBundle {
    /// Number of suggestions; always at least one (the reorder).
    pub fn len(&self) -> usize {
        self.transfers.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn transfer(&self, rank: usize) -> Option<&TransferSuggestion> {
        self.transfers.iter().find(|t| t.rank == rank)
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.transfers
            .iter()
            .cloned()
            .map(Suggestion::InterTransfer)
            .chain(std::iter::once(Suggestion::AutomaticReorder(
                self.reorder.clone(),
            )))
            .collect()
    }

    /// Chat-facing list of the options and how to pick one.
    pub fn options_text(&self) -> String {
        let mut text = String::new();
        for t in &self.transfers {
            let _ = writeln!(
                text,
                "  {}. Transfer {} {} from {} to {} (surplus there: {})",
                t.rank, t.quantity, t.item, t.from_location, t.to_location, t.source_surplus
            );
        }
        let _ = writeln!(
            text,
            "  {}. Reorder {} {} for {} (estimated delivery {})",
            self.transfers.len() + 1,
            self.reorder.quantity,
            self.reorder.item,
            self.reorder.location,
            self.reorder.estimated_delivery
        );
        if self.transfers.is_empty() {
            text.push_str("Reply \"yes\" to place the reorder or \"no\" to send it for manager review.");
        } else {
            text.push_str(
                "Reply \"approve transfer\" (optionally with its number), \"approve reorder\", \
                 or \"no\" to send the reorder for manager review.",
            );
        }
        text
    }

    /// Alert line plus the options.
    pub fn summary(&self) -> String {
        let c = &self.context;
        format!(
            "⚠ {} at {} is below its minimum ({} of {} {}, {} urgency).\nSuggested actions:\n{}",
            c.item,
            c.location,
            c.quantity,
            c.min_threshold,
            c.unit,
            c.urgency.as_str(),
            self.options_text()
        )
    }
}

/// Tuning for the generator, taken from `[inventory]` config.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionSettings {
    pub reorder_multiplier: f64,
    pub max_transfer_candidates: usize,
    pub estimated_delivery: String,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            reorder_multiplier: DEFAULT_REORDER_MULTIPLIER,
            max_transfer_candidates: DEFAULT_MAX_TRANSFER_CANDIDATES,
            estimated_delivery: DEFAULT_ESTIMATED_DELIVERY.to_string(),
        }
    }
}

impl SuggestionSettings {
    /// Stock level a reorder aims for.
    pub fn target_level(&self, min_threshold: u32) -> u32 {
        let target = (f64::from(min_threshold) * self.reorder_multiplier).ceil();
        if target >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            target as u32
        }
    }

    /// Units to order so the location reaches its target; at least one.
    pub fn reorder_quantity(&self, quantity: u32, min_threshold: u32) -> u32 {
        self.target_level(min_threshold)
            .saturating_sub(quantity)
            .max(1)
    }
}

pub struct SuggestionGenerator {
    inventory: Arc<dyn InventoryStore>,
    settings: SuggestionSettings,
}

impl SuggestionGenerator {
    pub fn new(inventory: Arc<dyn InventoryStore>, settings: SuggestionSettings) -> Self {
        Self {
            inventory,
            settings,
        }
    }

    pub fn settings(&self) -> &SuggestionSettings {
        &self.settings
    }

    /// Build a bundle if the change left the location below threshold.
    pub async fn generate(&self, change: &StockChange) -> Result<Option<SuggestionBundle>> {
        let record = &change.record;
        if !record.is_low() {
            return Ok(None);
        }

        let context = LowStockContext::from(record);
        let now = Utc::now();
        let target = self.settings.target_level(record.min_threshold);
        let needed = target.saturating_sub(record.quantity).max(1);

        let mut candidates: Vec<InventoryRecord> = self
            .inventory
            .holdings(&record.item)
            .await?
            .into_iter()
            .filter(|r| !r.location.eq_ignore_ascii_case(&record.location) && r.surplus() > 0)
            .collect();
        candidates.sort_by(|a, b| {
            b.surplus()
                .cmp(&a.surplus())
                .then_with(|| a.location.cmp(&b.location))
        });

        let transfers: Vec<TransferSuggestion> = candidates
            .iter()
            .take(self.settings.max_transfer_candidates)
            .enumerate()
            .map(|(i, source)| TransferSuggestion {
                id: Uuid::new_v4(),
                rank: i + 1,
                item: record.item.clone(),
                from_location: source.location.clone(),
                to_location: record.location.clone(),
                quantity: source.surplus().min(needed),
                source_surplus: source.surplus(),
                urgency: context.urgency,
                created_at: now,
            })
            .collect();

        let reorder = ReorderSuggestion {
            id: Uuid::new_v4(),
            item: record.item.clone(),
            location: record.location.clone(),
            current_quantity: record.quantity,
            quantity: self
                .settings
                .reorder_quantity(record.quantity, record.min_threshold),
            urgency: context.urgency,
            estimated_delivery: self.settings.estimated_delivery.clone(),
            created_at: now,
        };

        info!(
            "Low stock: {} at {} ({}/{}), {} transfer option(s), reorder {}",
            record.item,
            record.location,
            record.quantity,
            record.min_threshold,
            transfers.len(),
            reorder.quantity
        );

        Ok(Some(SuggestionBundle {
            id: Uuid::new_v4(),
            context,
            transfers,
            reorder,
            created_at: now,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Adjustment, InMemoryInventory};

    fn store() -> Arc<InMemoryInventory> {
        Arc::new(InMemoryInventory::with_records(vec![
            InventoryRecord::new("ICU-01", "N95 Masks", 71, 75),
            InventoryRecord::new("ER-01", "N95 Masks", 30, 15),
            InventoryRecord::new("WARD-02", "N95 Masks", 40, 30),
            InventoryRecord::new("OR-03", "N95 Masks", 10, 20),
            InventoryRecord::new("ICU-01", "Surgical Gloves", 200, 100),
        ]))
    }

    #[test]
    fn test_urgency_tiers() {
        assert_eq!(Urgency::from_levels(66, 75), Urgency::Low);
        assert_eq!(Urgency::from_levels(55, 75), Urgency::Medium);
        assert_eq!(Urgency::from_levels(30, 75), Urgency::High);
        assert_eq!(Urgency::from_levels(0, 75), Urgency::High);
        assert_eq!(Urgency::from_levels(80, 75), Urgency::Low);
    }

    #[test]
    fn test_reorder_quantity() {
        let settings = SuggestionSettings::default();
        assert_eq!(settings.target_level(75), 150);
        assert_eq!(settings.reorder_quantity(66, 75), 84);
        assert_eq!(settings.reorder_quantity(500, 75), 1);
    }

    #[tokio::test]
    async fn test_bundle_ranks_transfers_by_surplus() {
        let inventory = store();
        let change = inventory
            .adjust("ICU-01", "N95 Masks", Adjustment::Delta(-5))
            .await
            .unwrap();
        assert_eq!(change.after, 66);

        let generator = SuggestionGenerator::new(inventory, SuggestionSettings::default());
        let bundle = generator.generate(&change).await.unwrap().unwrap();

        assert!(bundle.len() >= 1);
        assert_eq!(bundle.transfers.len(), 2);
        assert_eq!(bundle.transfers[0].from_location, "ER-01");
        assert_eq!(bundle.transfers[0].quantity, 15);
        assert_eq!(bundle.transfers[0].rank, 1);
        assert_eq!(bundle.transfers[1].from_location, "WARD-02");
        assert_eq!(bundle.transfers[1].quantity, 10);
        assert_eq!(bundle.reorder.quantity, 84);
        assert_eq!(bundle.context.urgency, Urgency::Low);
        assert_eq!(bundle.suggestions().len(), 3);
    }

    #[tokio::test]
    async fn test_no_bundle_above_threshold() {
        let inventory = store();
        let change = inventory
            .adjust("ICU-01", "Surgical Gloves", Adjustment::Delta(-50))
            .await
            .unwrap();
        let generator = SuggestionGenerator::new(inventory, SuggestionSettings::default());
        assert!(generator.generate(&change).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_candidate_limit() {
        let inventory = store();
        let change = inventory
            .adjust("ICU-01", "N95 Masks", Adjustment::Set(0))
            .await
            .unwrap();
        let settings = SuggestionSettings {
            max_transfer_candidates: 1,
            ..SuggestionSettings::default()
        };
        let generator = SuggestionGenerator::new(inventory, settings);
        let bundle = generator.generate(&change).await.unwrap().unwrap();
        assert_eq!(bundle.transfers.len(), 1);
        assert_eq!(bundle.context.urgency, Urgency::High);
        assert_eq!(bundle.reorder.quantity, 150);
    }

    #[test]
    fn test_suggestion_tagging() {
        let reorder = ReorderSuggestion {
            id: Uuid::new_v4(),
            item: "N95 Masks".into(),
            location: "ICU-01".into(),
            current_quantity: 66,
            quantity: 84,
            urgency: Urgency::Low,
            estimated_delivery: DEFAULT_ESTIMATED_DELIVERY.into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(Suggestion::AutomaticReorder(reorder)).unwrap();
        assert_eq!(json["kind"], "automatic_reorder");
        assert_eq!(json["quantity"], 84);
    }
}
