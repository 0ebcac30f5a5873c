use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::orders::types::{NewOrder, OrderPatch, OrderRecord, OrderStatus};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("order {0} is already tracked")]
    DuplicateOrder(String),
    #[error("order {0} not found")]
    NotFound(String),
}

/// Source of truth for in-flight order state.
///
/// The production implementation is an in-process map with TTL eviction;
/// the trait exists so a database-backed store can be swapped in without
/// touching the reconciler or the status endpoint.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates a record with `status = pending` and `created_at = now`.
    /// Fails with [`StoreError::DuplicateOrder`] if the id is already
    /// tracked.
    async fn insert(&self, order_id: &str, initial: NewOrder) -> Result<OrderRecord, StoreError>;

    /// Pure read.
    async fn get(&self, order_id: &str) -> Option<OrderRecord>;

    /// Applies a partial update and returns the resulting record.
    async fn update(&self, order_id: &str, patch: OrderPatch) -> Result<OrderRecord, StoreError>;

    /// Removes every record that is terminal or older than the store
    /// lifetime. Returns the number of removed records; never fails.
    async fn reap(&self) -> usize;
}

/// Process-local store. A restart loses all in-flight orders; that is an
/// accepted tradeoff of the no-database design.
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<String, OrderRecord>>,
    lifetime: ChronoDuration,
}

impl InMemoryOrderStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            lifetime: ChronoDuration::from_std(lifetime)
                .unwrap_or_else(|_| ChronoDuration::minutes(35)),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.lock().expect("order store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_patch(record: &mut OrderRecord, patch: OrderPatch) {
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(tx_id) = patch.gateway_transaction_id {
            record.gateway_transaction_id = Some(tx_id);
        }
        if let Some(amount) = patch.amount_minor_units {
            record.amount_minor_units = amount;
        }
        if let Some(fee) = patch.gateway_fee_minor_units {
            record.gateway_fee_minor_units = fee;
        }
        if let Some(customer) = patch.customer {
            record.customer = Some(customer);
        }
        if let Some(product) = patch.product {
            record.product = Some(product);
        }
        if let Some(offer) = patch.offer {
            record.offer = Some(offer);
        }
        if let Some(tracking) = patch.tracking {
            record.tracking = Some(tracking);
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order_id: &str, initial: NewOrder) -> Result<OrderRecord, StoreError> {
        let mut orders = self.orders.lock().expect("order store lock poisoned");
        if orders.contains_key(order_id) {
            return Err(StoreError::DuplicateOrder(order_id.to_string()));
        }
        let record = OrderRecord {
            order_id: order_id.to_string(),
            gateway_transaction_id: initial.gateway_transaction_id,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            amount_minor_units: initial.amount_minor_units,
            gateway_fee_minor_units: 0,
            customer: initial.customer,
            product: initial.product,
            offer: initial.offer,
            tracking: initial.tracking,
        };
        orders.insert(order_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, order_id: &str) -> Option<OrderRecord> {
        self.orders
            .lock()
            .expect("order store lock poisoned")
            .get(order_id)
            .cloned()
    }

    async fn update(&self, order_id: &str, patch: OrderPatch) -> Result<OrderRecord, StoreError> {
        let mut orders = self.orders.lock().expect("order store lock poisoned");
        let record = orders
            .get_mut(order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;
        Self::apply_patch(record, patch);
        Ok(record.clone())
    }

    async fn reap(&self) -> usize {
        let now = Utc::now();
        let lifetime = self.lifetime;
        let mut orders = self.orders.lock().expect("order store lock poisoned");
        let before = orders.len();
        // Terminal records go on the next tick; pending ones only once they
        // outlive the gateway's own payment window.
        orders.retain(|_, record| {
            record.status == OrderStatus::Pending && now - record.created_at <= lifetime
        });
        let removed = before - orders.len();
        if removed > 0 {
            debug!(removed, remaining = orders.len(), "order store reaped");
        }
        removed
    }
}
