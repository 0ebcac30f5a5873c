use std::sync::Arc;
use tracing::{info, warn};

use crate::gateway::types::{WebhookData, WebhookEnvelope};
use crate::orders::store::OrderStore;
use crate::orders::types::{OrderPatch, OrderRecord, OrderStatus};
use crate::services::attribution::{AttributionSink, OrderEvent};

/// One way of recovering the order id from an echoed webhook payload. The
/// gateway has no dedicated field for it, so the reconciler probes these in
/// declared order and logs which one matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStrategy {
    /// `data.external_id`, the id we sent on creation (canonical).
    ExternalId,
    /// `data.tracking.ref`, stamped by the payload normalizer.
    TrackingRef,
    /// `data.tracking.utm_id`, legacy storefront campaign field.
    TrackingUtmId,
}

impl CorrelationStrategy {
    pub fn default_order() -> Vec<Self> {
        vec![Self::ExternalId, Self::TrackingRef, Self::TrackingUtmId]
    }

    pub fn extract(&self, data: &WebhookData) -> Option<String> {
        match self {
            Self::ExternalId => data
                .external_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            Self::TrackingRef => data.tracking_field("ref"),
            Self::TrackingUtmId => data.tracking_field("utm_id"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalId => "external_id",
            Self::TrackingRef => "tracking.ref",
            Self::TrackingUtmId => "tracking.utm_id",
        }
    }
}

impl std::fmt::Display for CorrelationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a webhook delivery amounted to. Returned for observability and
/// tests; the HTTP handler acknowledges the gateway regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No correlation id could be extracted; nothing was mutated.
    Unprocessable,
    /// The payload carried no recognizable status; nothing was mutated.
    UnknownStatus,
    /// No local record, but the paid event was forwarded from the payload.
    OrphanForwarded { order_id: String },
    /// No local record and not a paid event; dropped.
    OrphanDropped { order_id: String, status: OrderStatus },
    /// Status unchanged; mutable attributes refreshed, no push.
    Refreshed { order_id: String },
    /// Status changed; record updated and one event pushed.
    Transitioned {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// Matches inbound gateway webhooks back to tracked orders and applies
/// state transitions. Safe to invoke arbitrarily many times with the same
/// payload: the unchanged-status branch never pushes to attribution.
pub struct WebhookReconciler {
    store: Arc<dyn OrderStore>,
    attribution: Arc<dyn AttributionSink>,
    strategies: Vec<CorrelationStrategy>,
}

impl WebhookReconciler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        attribution: Arc<dyn AttributionSink>,
        strategies: Vec<CorrelationStrategy>,
    ) -> Self {
        Self {
            store,
            attribution,
            strategies,
        }
    }

    pub async fn process(&self, envelope: &WebhookEnvelope) -> ReconcileOutcome {
        let data = &envelope.data;
        let event_name = envelope.event.as_deref().unwrap_or("-");

        let Some((strategy, order_id)) = self.correlate(data) else {
            warn!(
                event = event_name,
                gateway_transaction_id = data.transaction_id().as_deref().unwrap_or("-"),
                "webhook carries no usable correlation id, dropping"
            );
            return ReconcileOutcome::Unprocessable;
        };

        let reported = match data.status.as_deref().map(str::parse::<OrderStatus>) {
            Some(Ok(status)) => status,
            _ => {
                warn!(
                    order_id = %order_id,
                    status = data.status.as_deref().unwrap_or("-"),
                    "webhook carries no recognizable status, dropping"
                );
                return ReconcileOutcome::UnknownStatus;
            }
        };

        info!(
            order_id = %order_id,
            event = event_name,
            status = %reported,
            matched_strategy = %strategy,
            "webhook correlated"
        );

        let Some(record) = self.store.get(&order_id).await else {
            return self.handle_orphan(&order_id, reported, data).await;
        };

        let mut patch = attribute_patch(data, &record);

        if record.status == reported {
            // Gateway redelivery; refresh attributes, never re-forward.
            if let Err(e) = self.store.update(&order_id, patch).await {
                warn!(order_id = %order_id, error = %e, "attribute refresh failed");
            }
            return ReconcileOutcome::Refreshed { order_id };
        }

        if record.status.is_terminal() && reported == OrderStatus::Pending {
            // Terminal states never regress to pending; a delayed
            // waiting_payment delivery after settlement is a redelivery.
            warn!(
                order_id = %order_id,
                stored = %record.status,
                "stale pending webhook after terminal status, refreshing attributes only"
            );
            if let Err(e) = self.store.update(&order_id, patch).await {
                warn!(order_id = %order_id, error = %e, "attribute refresh failed");
            }
            return ReconcileOutcome::Refreshed { order_id };
        }

        patch.status = Some(reported);
        let updated = match self.store.update(&order_id, patch).await {
            Ok(updated) => updated,
            Err(e) => {
                // Record evicted between get and update; treat as orphan.
                warn!(order_id = %order_id, error = %e, "order vanished mid-update");
                return self.handle_orphan(&order_id, reported, data).await;
            }
        };

        info!(
            order_id = %order_id,
            from = %record.status,
            to = %reported,
            "order status transitioned"
        );
        self.forward(&OrderEvent::from_record(&updated)).await;

        ReconcileOutcome::Transitioned {
            order_id,
            from: record.status,
            to: reported,
        }
    }

    fn correlate(&self, data: &WebhookData) -> Option<(CorrelationStrategy, String)> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.extract(data).map(|id| (*strategy, id)))
    }

    async fn handle_orphan(
        &self,
        order_id: &str,
        reported: OrderStatus,
        data: &WebhookData,
    ) -> ReconcileOutcome {
        if reported == OrderStatus::Paid {
            // Revenue-critical event without local context; rebuild what we
            // can from the payload and forward anyway.
            warn!(
                order_id = %order_id,
                "paid webhook for untracked order, forwarding best-effort"
            );
            self.forward(&OrderEvent::from_webhook(order_id, reported, data))
                .await;
            return ReconcileOutcome::OrphanForwarded {
                order_id: order_id.to_string(),
            };
        }

        info!(
            order_id = %order_id,
            status = %reported,
            "webhook for untracked order, dropping"
        );
        ReconcileOutcome::OrphanDropped {
            order_id: order_id.to_string(),
            status: reported,
        }
    }

    async fn forward(&self, event: &OrderEvent) {
        if let Err(e) = self.attribution.push(event).await {
            warn!(order_id = %event.order_id, error = %e, "attribution push failed");
        }
    }
}

/// Builds the non-status part of the patch: fee, corrected amount, and any
/// attribute bag the webhook has richer data for.
fn attribute_patch(data: &WebhookData, record: &OrderRecord) -> OrderPatch {
    OrderPatch {
        status: None,
        gateway_transaction_id: data
            .transaction_id()
            .filter(|id| record.gateway_transaction_id.as_deref() != Some(id)),
        amount_minor_units: data
            .amount
            .filter(|amount| *amount > 0 && *amount != record.amount_minor_units),
        gateway_fee_minor_units: data.gateway_fee_minor_units(),
        customer: data.buyer.clone(),
        product: data.product.clone(),
        offer: data.offer.clone(),
        tracking: data.tracking.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::store::InMemoryOrderStore;
    use crate::orders::types::NewOrder;
    use crate::services::attribution::AttributionError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<OrderEvent>>,
    }

    impl RecordingSink {
        fn pushed(&self) -> Vec<OrderEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttributionSink for RecordingSink {
        async fn push(&self, event: &OrderEvent) -> Result<(), AttributionError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<InMemoryOrderStore>,
        sink: Arc<RecordingSink>,
        reconciler: WebhookReconciler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new(Duration::from_secs(35 * 60)));
        let sink = Arc::new(RecordingSink::default());
        let reconciler = WebhookReconciler::new(
            store.clone(),
            sink.clone(),
            CorrelationStrategy::default_order(),
        );
        Fixture {
            store,
            sink,
            reconciler,
        }
    }

    fn envelope(body: serde_json::Value) -> WebhookEnvelope {
        serde_json::from_value(body).unwrap()
    }

    async fn seed(fixture: &Fixture, order_id: &str) {
        fixture
            .store
            .insert(
                order_id,
                NewOrder {
                    amount_minor_units: 1000,
                    ..NewOrder::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn payload_without_correlation_id_is_unprocessable() {
        let f = fixture();
        seed(&f, "order_1").await;

        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "event": "transaction.updated",
                "data": {"status": "paid", "tracking": {"utm_source": "ads"}}
            })))
            .await;

        assert_eq!(outcome, ReconcileOutcome::Unprocessable);
        let record = f.store.get("order_1").await.unwrap();
        assert_eq!(record.status, OrderStatus::Pending);
        assert!(f.sink.pushed().is_empty());
    }

    #[tokio::test]
    async fn external_id_takes_priority_over_tracking_ref() {
        let f = fixture();
        seed(&f, "order_ext").await;
        seed(&f, "order_ref").await;

        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {
                    "status": "paid",
                    "external_id": "order_ext",
                    "tracking": {"ref": "order_ref"}
                }
            })))
            .await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Transitioned {
                order_id: "order_ext".to_string(),
                from: OrderStatus::Pending,
                to: OrderStatus::Paid,
            }
        );
        assert_eq!(
            f.store.get("order_ref").await.unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn tracking_ref_correlates_when_external_id_is_absent() {
        let f = fixture();
        seed(&f, "order_1").await;

        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {"status": "paid", "tracking": {"ref": "order_1"}}
            })))
            .await;

        assert!(matches!(outcome, ReconcileOutcome::Transitioned { .. }));
        assert_eq!(
            f.store.get("order_1").await.unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn redelivered_webhook_refreshes_without_second_push() {
        let f = fixture();
        seed(&f, "order_1").await;

        let paid = envelope(json!({
            "data": {
                "status": "paid",
                "external_id": "order_1",
                "fees": {"gateway": 33}
            }
        }));

        let first = f.reconciler.process(&paid).await;
        assert!(matches!(first, ReconcileOutcome::Transitioned { .. }));

        let second = f.reconciler.process(&paid).await;
        assert_eq!(
            second,
            ReconcileOutcome::Refreshed {
                order_id: "order_1".to_string()
            }
        );

        // Same final state, exactly one push.
        let record = f.store.get("order_1").await.unwrap();
        assert_eq!(record.status, OrderStatus::Paid);
        assert_eq!(record.gateway_fee_minor_units, 33);
        assert_eq!(f.sink.pushed().len(), 1);
        assert_eq!(f.sink.pushed()[0].status, "paid");
    }

    #[tokio::test]
    async fn terminal_to_terminal_is_last_write_wins_with_one_push_each() {
        let f = fixture();
        seed(&f, "order_1").await;

        f.reconciler
            .process(&envelope(json!({
                "data": {"status": "paid", "external_id": "order_1"}
            })))
            .await;
        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {"status": "refunded", "external_id": "order_1"}
            })))
            .await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Transitioned {
                order_id: "order_1".to_string(),
                from: OrderStatus::Paid,
                to: OrderStatus::Refunded,
            }
        );
        assert_eq!(
            f.store.get("order_1").await.unwrap().status,
            OrderStatus::Refunded
        );
        let pushed = f.sink.pushed();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0].status, "paid");
        assert_eq!(pushed[1].status, "refunded");
    }

    #[tokio::test]
    async fn stale_pending_webhook_never_regresses_a_settled_order() {
        let f = fixture();
        seed(&f, "order_1").await;

        f.reconciler
            .process(&envelope(json!({
                "data": {"status": "paid", "external_id": "order_1"}
            })))
            .await;

        // Delayed delivery of the original waiting_payment notification.
        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {
                    "status": "waiting_payment",
                    "external_id": "order_1",
                    "fees": {"gateway": 25}
                }
            })))
            .await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Refreshed {
                order_id: "order_1".to_string()
            }
        );
        let record = f.store.get("order_1").await.unwrap();
        assert_eq!(record.status, OrderStatus::Paid);
        // Attributes still refresh, and only the paid push went out.
        assert_eq!(record.gateway_fee_minor_units, 25);
        let pushed = f.sink.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].status, "paid");
    }

    #[tokio::test]
    async fn orphan_paid_webhook_is_forwarded_from_payload() {
        let f = fixture();

        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {
                    "status": "paid",
                    "external_id": "order_gone",
                    "amount": 2500,
                    "buyer": {"email": "a@b.com"}
                }
            })))
            .await;

        assert_eq!(
            outcome,
            ReconcileOutcome::OrphanForwarded {
                order_id: "order_gone".to_string()
            }
        );
        let pushed = f.sink.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].total_price_in_cents, 2500);
        assert!(f.store.get("order_gone").await.is_none());
    }

    #[tokio::test]
    async fn orphan_non_paid_webhook_is_dropped() {
        let f = fixture();

        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {"status": "canceled", "external_id": "order_gone"}
            })))
            .await;

        assert_eq!(
            outcome,
            ReconcileOutcome::OrphanDropped {
                order_id: "order_gone".to_string(),
                status: OrderStatus::Canceled,
            }
        );
        assert!(f.sink.pushed().is_empty());
    }

    #[tokio::test]
    async fn unknown_status_never_mutates() {
        let f = fixture();
        seed(&f, "order_1").await;

        let outcome = f
            .reconciler
            .process(&envelope(json!({
                "data": {"status": "weird", "external_id": "order_1"}
            })))
            .await;

        assert_eq!(outcome, ReconcileOutcome::UnknownStatus);
        assert_eq!(
            f.store.get("order_1").await.unwrap().status,
            OrderStatus::Pending
        );
        assert!(f.sink.pushed().is_empty());
    }

    #[tokio::test]
    async fn transition_corrects_amount_and_captures_fee() {
        let f = fixture();
        seed(&f, "order_1").await;

        f.reconciler
            .process(&envelope(json!({
                "data": {
                    "status": "paid",
                    "external_id": "order_1",
                    "id": 991,
                    "amount": 1100,
                    "fees": {"gateway": 40}
                }
            })))
            .await;

        let record = f.store.get("order_1").await.unwrap();
        assert_eq!(record.amount_minor_units, 1100);
        assert_eq!(record.gateway_fee_minor_units, 40);
        assert_eq!(record.gateway_transaction_id.as_deref(), Some("991"));

        let pushed = f.sink.pushed();
        assert_eq!(pushed[0].total_price_in_cents, 1100);
        assert_eq!(pushed[0].gateway_fee_in_cents, 40);
    }
}
