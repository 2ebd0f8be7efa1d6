//! Stock levels per location and item.
//!
//! Inventory records map a (location, item) pair to a current quantity and a
//! minimum threshold. The [`InventoryStore`] trait is the seam the chat
//! workflow talks to; [`InMemoryInventory`] is the process-local
//! implementation seeded from configuration.
//!
//! Location and item names are matched case-insensitively but reported with
//! the spelling they were seeded with.

mod store;

pub use store::InMemoryInventory;

use crate::types::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unit used when a seed record does not name one.
pub const DEFAULT_UNIT: &str = "units";

/// Stock of one item at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InventoryRecord {
    pub location: String,
    pub item: String,
    pub quantity: u32,
    /// Stock below this level triggers low-stock suggestions
    pub min_threshold: u32,
    pub unit: String,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(
        location: impl Into<String>,
        item: impl Into<String>,
        quantity: u32,
        min_threshold: u32,
    ) -> Self {
        Self {
            location: location.into(),
            item: item.into(),
            quantity,
            min_threshold,
            unit: DEFAULT_UNIT.to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn is_low(&self) -> bool {
        self.quantity < self.min_threshold
    }

    /// Stock above the threshold that could be given away.
    pub fn surplus(&self) -> u32 {
        self.quantity.saturating_sub(self.min_threshold)
    }

    /// How far below the threshold this record sits.
    pub fn shortfall(&self) -> u32 {
        self.min_threshold.saturating_sub(self.quantity)
    }
}

/// A requested change to a stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    /// Add (positive) or remove (negative) units
    Delta(i64),
    /// Replace the quantity outright
    Set(u32),
}

impl Adjustment {
    /// Apply to a current quantity, `None` if the result would be negative
    /// or overflow.
    pub fn apply(&self, current: u32) -> Option<u32> {
        match *self {
            Adjustment::Delta(delta) => {
                let next = i64::from(current).checked_add(delta)?;
                u32::try_from(next).ok()
            }
            Adjustment::Set(value) => Some(value),
        }
    }
}

/// Result of a successful adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StockChange {
    pub before: u32,
    pub after: u32,
    pub record: InventoryRecord,
}

impl StockChange {
    pub fn is_decrease(&self) -> bool {
        self.after < self.before
    }

    pub fn is_low(&self) -> bool {
        self.record.is_low()
    }
}

/// Result of a successful transfer between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferReceipt {
    pub item: String,
    pub from_location: String,
    pub to_location: String,
    pub quantity: u32,
    pub source_before: u32,
    pub source_after: u32,
    pub destination_before: u32,
    pub destination_after: u32,
}

/// Optional filters for listing records.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct InventoryFilter {
    pub location: Option<String>,
    pub item: Option<String>,
}

impl InventoryFilter {
    pub fn matches(&self, record: &InventoryRecord) -> bool {
        let location_ok = self
            .location
            .as_ref()
            .map(|l| l.eq_ignore_ascii_case(&record.location))
            .unwrap_or(true);
        let item_ok = self
            .item
            .as_ref()
            .map(|i| i.eq_ignore_ascii_case(&record.item))
            .unwrap_or(true);
        location_ok && item_ok
    }
}

/// Storage seam for stock levels.
///
/// Implementations must apply [`InventoryStore::transfer`] atomically: no
/// reader may observe the source decremented without the destination
/// incremented, and stock never goes negative.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Fetch one record.
    async fn get(&self, location: &str, item: &str) -> Result<Option<InventoryRecord>>;

    /// List records, sorted by location then item.
    async fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryRecord>>;

    /// Every location name known to the store.
    async fn locations(&self) -> Result<Vec<String>>;

    /// Every item name known to the store.
    async fn items(&self) -> Result<Vec<String>>;

    /// All records of one item across locations.
    async fn holdings(&self, item: &str) -> Result<Vec<InventoryRecord>> {
        self.list(&InventoryFilter {
            location: None,
            item: Some(item.to_string()),
        })
        .await
    }

    /// Change the quantity of an existing record.
    async fn adjust(&self, location: &str, item: &str, adjustment: Adjustment)
        -> Result<StockChange>;

    /// Move stock of one item between two existing records.
    async fn transfer(
        &self,
        from_location: &str,
        to_location: &str,
        item: &str,
        quantity: u32,
    ) -> Result<TransferReceipt>;

    /// Insert or replace a record.
    async fn upsert(&self, record: InventoryRecord) -> Result<()>;
}
