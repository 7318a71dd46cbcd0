//! Per-store inventory records, the write side of the service.
use crate::error::ApiError;
use crate::projection::{EventBus, InventoryEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub store_id: String,
    pub sku: String,
    pub quantity: i32,
    pub version: u64,
    /// Serialized as an RFC 3339 timestamp in UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Writes publish their event while the record lock is held, so the bus
/// carries each partition's versions in order.
#[derive(Debug)]
pub struct StoreInventory {
    records: Mutex<HashMap<(String, String), InventoryRecord>>,
    bus: EventBus,
}

impl StoreInventory {
    pub fn new(bus: EventBus) -> Self {
        Self {
            records: Mutex::default(),
            bus,
        }
    }

    /// Add `delta` to the stored quantity, never going below zero.
    pub fn adjust(
        &self,
        store_id: &str,
        sku: &str,
        delta: i32,
        if_match: Option<u64>,
    ) -> Result<InventoryRecord, ApiError> {
        self.write(
            store_id,
            sku,
            if_match,
            |current| current.saturating_add(delta).max(0),
            |record| InventoryEvent::Adjusted {
                store_id: record.store_id.clone(),
                sku: record.sku.clone(),
                delta,
                version: record.version,
            },
        )
    }

    pub fn replace(
        &self,
        store_id: &str,
        sku: &str,
        quantity: i32,
        if_match: Option<u64>,
    ) -> Result<InventoryRecord, ApiError> {
        if quantity < 0 {
            return Err(ApiError::Validation("quantity must be >= 0".to_string()));
        }

        self.write(
            store_id,
            sku,
            if_match,
            |_| quantity,
            |record| InventoryEvent::Replaced {
                store_id: record.store_id.clone(),
                sku: record.sku.clone(),
                quantity,
                version: record.version,
            },
        )
    }

    pub fn get(&self, store_id: &str, sku: &str) -> Option<InventoryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(store_id.to_string(), sku.to_string()))
            .cloned()
    }

    fn write(
        &self,
        store_id: &str,
        sku: &str,
        if_match: Option<u64>,
        quantity: impl FnOnce(i32) -> i32,
        event: impl FnOnce(&InventoryRecord) -> InventoryEvent,
    ) -> Result<InventoryRecord, ApiError> {
        if store_id.trim().is_empty() {
            return Err(ApiError::Validation("storeId must not be blank".to_string()));
        }
        if sku.trim().is_empty() {
            return Err(ApiError::Validation("sku must not be blank".to_string()));
        }

        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (store_id.to_string(), sku.to_string());
        let (current_quantity, current_version) = records
            .get(&key)
            .map_or((0, 0), |r| (r.quantity, r.version));

        if let Some(expected) = if_match {
            if expected != current_version {
                return Err(ApiError::VersionMismatch {
                    expected,
                    current: current_version,
                });
            }
        }

        let record = InventoryRecord {
            store_id: key.0.clone(),
            sku: key.1.clone(),
            quantity: quantity(current_quantity),
            version: current_version + 1,
            updated_at: OffsetDateTime::now_utc(),
        };
        self.bus.publish(event(&record));
        records.insert(key, record.clone());
        Ok(record)
    }
}
