use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::AppState;
use crate::orders::store::OrderStore;
use crate::orders::types::{OrderPatch, OrderRecord, OrderStatus};

/// Status reported for ids with no record: either never seen, or already
/// evicted after completion/expiry. The client cannot tell these apart;
/// that ambiguity is part of the no-database contract.
pub const NOT_FOUND_STATUS: &str = "not_found_or_expired";

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub id: Option<String>,
}

/// GET /check-order-status?id=<orderId>
pub async fn check_order_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let Some(order_id) = query.id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "order id not provided" })),
        )
            .into_response();
    };

    let status = resolve_order_status(state.store.as_ref(), &order_id, state.pix_expiry).await;
    info!(order_id = %order_id, status = %status, "order status queried");

    (
        StatusCode::OK,
        Json(json!({ "success": true, "status": status })),
    )
        .into_response()
}

/// Reads the best-effort status for an order, eagerly expiring pending
/// records that have outlived the gateway's PIX payment window. This runs
/// ahead of the reaper and of any delayed "expired" webhook.
pub async fn resolve_order_status(
    store: &dyn OrderStore,
    order_id: &str,
    pix_expiry: Duration,
) -> String {
    let Some(record) = store.get(order_id).await else {
        return NOT_FOUND_STATUS.to_string();
    };

    let effective = effective_status(&record, Utc::now(), pix_expiry);
    if effective != record.status {
        if let Err(e) = store
            .update(order_id, OrderPatch::status(effective))
            .await
        {
            warn!(order_id = %order_id, error = %e, "lazy expiry write failed");
        }
    }

    effective.as_str().to_string()
}

/// Pure decision: a pending record past the PIX window counts as expired.
pub fn effective_status(
    record: &OrderRecord,
    now: DateTime<Utc>,
    pix_expiry: Duration,
) -> OrderStatus {
    let window = ChronoDuration::from_std(pix_expiry).unwrap_or_else(|_| ChronoDuration::minutes(30));
    if record.status == OrderStatus::Pending && now - record.created_at > window {
        OrderStatus::Expired
    } else {
        record.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::store::{InMemoryOrderStore, StoreError};
    use crate::orders::types::{NewOrder, OrderPatch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PIX_EXPIRY: Duration = Duration::from_secs(30 * 60);

    /// Store stub holding one record, so reads can be served with an
    /// arbitrary `created_at`.
    struct SingleOrderStore {
        record: Mutex<OrderRecord>,
    }

    impl SingleOrderStore {
        fn new(record: OrderRecord) -> Self {
            Self {
                record: Mutex::new(record),
            }
        }

        fn status(&self) -> OrderStatus {
            self.record.lock().unwrap().status
        }
    }

    #[async_trait]
    impl OrderStore for SingleOrderStore {
        async fn insert(&self, order_id: &str, _: NewOrder) -> Result<OrderRecord, StoreError> {
            Err(StoreError::DuplicateOrder(order_id.to_string()))
        }

        async fn get(&self, order_id: &str) -> Option<OrderRecord> {
            let record = self.record.lock().unwrap();
            (record.order_id == order_id).then(|| record.clone())
        }

        async fn update(
            &self,
            order_id: &str,
            patch: OrderPatch,
        ) -> Result<OrderRecord, StoreError> {
            let mut record = self.record.lock().unwrap();
            if record.order_id != order_id {
                return Err(StoreError::NotFound(order_id.to_string()));
            }
            if let Some(status) = patch.status {
                record.status = status;
            }
            Ok(record.clone())
        }

        async fn reap(&self) -> usize {
            0
        }
    }

    fn record(status: OrderStatus, age_minutes: i64) -> OrderRecord {
        OrderRecord {
            order_id: "order_1".to_string(),
            gateway_transaction_id: None,
            status,
            created_at: Utc::now() - ChronoDuration::minutes(age_minutes),
            amount_minor_units: 1000,
            gateway_fee_minor_units: 0,
            customer: None,
            product: None,
            offer: None,
            tracking: None,
        }
    }

    #[test]
    fn fresh_pending_record_stays_pending() {
        let record = record(OrderStatus::Pending, 5);
        assert_eq!(
            effective_status(&record, Utc::now(), PIX_EXPIRY),
            OrderStatus::Pending
        );
    }

    #[test]
    fn stale_pending_record_reads_as_expired() {
        let record = record(OrderStatus::Pending, 31);
        assert_eq!(
            effective_status(&record, Utc::now(), PIX_EXPIRY),
            OrderStatus::Expired
        );
    }

    #[test]
    fn terminal_records_are_never_re_expired() {
        let record = record(OrderStatus::Paid, 90);
        assert_eq!(
            effective_status(&record, Utc::now(), PIX_EXPIRY),
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn unknown_ids_resolve_to_the_distinguished_status() {
        let store = InMemoryOrderStore::new(Duration::from_secs(35 * 60));
        let status = resolve_order_status(&store, "order_missing", PIX_EXPIRY).await;
        assert_eq!(status, NOT_FOUND_STATUS);
    }

    #[tokio::test]
    async fn stale_pending_poll_persists_the_expired_transition() {
        let store = SingleOrderStore::new(record(OrderStatus::Pending, 31));

        let status = resolve_order_status(&store, "order_1", PIX_EXPIRY).await;

        // The response reads expired and the transition was written back,
        // ahead of the reaper and of any gateway webhook.
        assert_eq!(status, "expired");
        assert_eq!(store.status(), OrderStatus::Expired);
    }

    #[tokio::test]
    async fn fresh_pending_poll_leaves_the_record_untouched() {
        let store = SingleOrderStore::new(record(OrderStatus::Pending, 5));

        let status = resolve_order_status(&store, "order_1", PIX_EXPIRY).await;

        assert_eq!(status, "pending");
        assert_eq!(store.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn tracked_order_resolves_to_its_status() {
        let store = InMemoryOrderStore::new(Duration::from_secs(35 * 60));
        store.insert("order_1", NewOrder::default()).await.unwrap();

        let status = resolve_order_status(&store, "order_1", PIX_EXPIRY).await;
        assert_eq!(status, "pending");
    }
}
