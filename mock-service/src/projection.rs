//! Eventually consistent read side: a background task folds inventory
//! events into per-store and global totals.
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InventoryEvent {
    Adjusted {
        store_id: String,
        sku: String,
        delta: i32,
        version: u64,
    },
    Replaced {
        store_id: String,
        sku: String,
        quantity: i32,
        version: u64,
    },
}

impl InventoryEvent {
    fn partition(&self) -> (&str, &str) {
        match self {
            InventoryEvent::Adjusted { store_id, sku, .. }
            | InventoryEvent::Replaced { store_id, sku, .. } => (store_id, sku),
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            InventoryEvent::Adjusted { version, .. } | InventoryEvent::Replaced { version, .. } => {
                *version
            }
        }
    }
}

/// Sending half of the in-process event bus.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<InventoryEvent>,
}

impl EventBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InventoryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: InventoryEvent) {
        if let Err(err) = self.tx.send(event) {
            warn!("Projection is gone, dropping event: {:?}", err.0);
        }
    }
}

#[derive(Default, Debug)]
struct ProjectionState {
    versions: HashMap<(String, String), u64>,
    per_store: HashMap<(String, String), i32>,
}

#[derive(Clone, Default, Debug)]
pub struct Projection {
    state: Arc<RwLock<ProjectionState>>,
}

impl Projection {
    /// Consume events from `rx` until every [`EventBus`] is dropped.
    pub fn spawn(&self, mut rx: mpsc::UnboundedReceiver<InventoryEvent>) {
        let projection = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                projection.apply(&event);
            }
            debug!("Event bus closed, projection stopped.");
        });
    }

    /// Apply one event. Events at or below the last seen version of their
    /// partition are ignored; returns whether the event was applied.
    pub fn apply(&self, event: &InventoryEvent) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let (store_id, sku) = event.partition();
        let key = (store_id.to_string(), sku.to_string());

        let seen = state.versions.get(&key).copied().unwrap_or(0);
        if event.version() <= seen {
            debug!(store_id, sku, version = event.version(), seen, "Ignoring stale event");
            return false;
        }
        state.versions.insert(key.clone(), event.version());

        let quantity = match event {
            InventoryEvent::Adjusted { delta, .. } => {
                let current = state.per_store.get(&key).copied().unwrap_or(0);
                current.saturating_add(*delta).max(0)
            }
            InventoryEvent::Replaced { quantity, .. } => *quantity,
        };
        state.per_store.insert(key, quantity);
        true
    }

    pub fn global_quantity(&self, sku: &str) -> i32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .per_store
            .iter()
            .filter(|((_, s), _)| s == sku)
            .map(|(_, quantity)| *quantity)
            .sum()
    }

    pub fn store_quantity(&self, store_id: &str, sku: &str) -> Option<i32> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .per_store
            .get(&(store_id.to_string(), sku.to_string()))
            .copied()
    }
}
