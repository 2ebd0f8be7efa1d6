use super::{
    Adjustment, InventoryFilter, InventoryRecord, InventoryStore, StockChange, TransferReceipt,
};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

type RecordKey = (String, String);

fn key(location: &str, item: &str) -> RecordKey {
    (location.to_lowercase(), item.to_lowercase())
}

/// Process-local inventory behind a single lock.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    records: RwLock<BTreeMap<RecordKey, InventoryRecord>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed records; later duplicates replace earlier ones.
    pub fn with_records(records: impl IntoIterator<Item = InventoryRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (key(&r.location, &r.item), r))
            .collect::<BTreeMap<_, _>>();
        info!("Inventory seeded with {} records", map.len());
        Self {
            records: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn get(&self, location: &str, item: &str) -> Result<Option<InventoryRecord>> {
        Ok(self.records.read().get(&key(location, item)).cloned())
    }

    async fn list(&self, filter: &InventoryFilter) -> Result<Vec<InventoryRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn locations(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .records
            .read()
            .values()
            .map(|r| r.location.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn items(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .records
            .read()
            .values()
            .map(|r| r.item.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn adjust(
        &self,
        location: &str,
        item: &str,
        adjustment: Adjustment,
    ) -> Result<StockChange> {
        let mut records = self.records.write();
        let record = records.get_mut(&key(location, item)).ok_or_else(|| {
            AppError::NotFound(format!("No stock record for {} at {}", item, location))
        })?;

        let before = record.quantity;
        let after = match (adjustment.apply(before), adjustment) {
            (Some(after), _) => after,
            (None, Adjustment::Delta(delta)) if delta > 0 => {
                return Err(AppError::InvalidInput(format!(
                    "Adding {} to {} of {} at {} would exceed the maximum quantity",
                    delta, before, record.item, record.location
                )));
            }
            (None, _) => {
                return Err(AppError::InsufficientStock(format!(
                    "{} has only {} {} of {}",
                    record.location, before, record.unit, record.item
                )));
            }
        };

        record.quantity = after;
        record.updated_at = Utc::now();
        debug!(
            "Adjusted {} at {}: {} -> {}",
            record.item, record.location, before, after
        );

        Ok(StockChange {
            before,
            after,
            record: record.clone(),
        })
    }

    async fn transfer(
        &self,
        from_location: &str,
        to_location: &str,
        item: &str,
        quantity: u32,
    ) -> Result<TransferReceipt> {
        if quantity == 0 {
            return Err(AppError::InvalidInput(
                "Transfer quantity must be positive".to_string(),
            ));
        }
        let from_key = key(from_location, item);
        let to_key = key(to_location, item);
        if from_key == to_key {
            return Err(AppError::InvalidInput(
                "Source and destination must differ".to_string(),
            ));
        }

        // One write guard covers both legs.
        let mut records = self.records.write();

        let source = records.get(&from_key).ok_or_else(|| {
            AppError::NotFound(format!("No stock record for {} at {}", item, from_location))
        })?;
        let destination = records.get(&to_key).ok_or_else(|| {
            AppError::NotFound(format!("No stock record for {} at {}", item, to_location))
        })?;
        if source.quantity < quantity {
            return Err(AppError::InsufficientStock(format!(
                "{} has only {} {} of {}, cannot transfer {}",
                source.location, source.quantity, source.unit, source.item, quantity
            )));
        }
        // Checked before either leg is applied.
        let destination_after = destination.quantity.checked_add(quantity).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "{} at {} cannot hold {} more {}",
                destination.item, destination.location, quantity, destination.unit
            ))
        })?;

        let now = Utc::now();
        let (source_before, source_after, from_name, item_name) = {
            let source = records
                .get_mut(&from_key)
                .ok_or_else(|| AppError::Internal("source record vanished".to_string()))?;
            let before = source.quantity;
            source.quantity -= quantity;
            source.updated_at = now;
            (
                before,
                source.quantity,
                source.location.clone(),
                source.item.clone(),
            )
        };
        let (destination_before, to_name) = {
            let destination = records
                .get_mut(&to_key)
                .ok_or_else(|| AppError::Internal("destination record vanished".to_string()))?;
            let before = destination.quantity;
            destination.quantity = destination_after;
            destination.updated_at = now;
            (before, destination.location.clone())
        };

        info!(
            "Transferred {} {} from {} to {}",
            quantity, item_name, from_name, to_name
        );

        Ok(TransferReceipt {
            item: item_name,
            from_location: from_name,
            to_location: to_name,
            quantity,
            source_before,
            source_after,
            destination_before,
            destination_after,
        })
    }

    async fn upsert(&self, record: InventoryRecord) -> Result<()> {
        self.records
            .write()
            .insert(key(&record.location, &record.item), record);
        Ok(())
    }
}
