use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AttributionConfig;
use crate::gateway::types::WebhookData;
use crate::orders::types::{OrderRecord, OrderStatus};

#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("attribution service rejected the event (HTTP {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("attribution request failed: {0}")]
    Network(String),
}

/// Lifecycle event pushed to the marketing-attribution API.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub platform: String,
    pub payment_method: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub total_price_in_cents: i64,
    pub gateway_fee_in_cents: i64,
    pub customer: Option<JsonValue>,
    pub product: Option<JsonValue>,
    pub tracking_parameters: Option<JsonValue>,
}

impl OrderEvent {
    pub fn from_record(record: &OrderRecord) -> Self {
        Self {
            order_id: record.order_id.clone(),
            platform: "pix-checkout".to_string(),
            payment_method: "pix".to_string(),
            status: wire_status(record.status).to_string(),
            created_at: record.created_at,
            approved_at: (record.status == OrderStatus::Paid).then(Utc::now),
            total_price_in_cents: record.amount_minor_units,
            gateway_fee_in_cents: record.gateway_fee_minor_units,
            customer: record.customer.clone(),
            product: record.product.clone(),
            tracking_parameters: record.tracking.clone(),
        }
    }

    /// Rebuilds the minimal event directly from a webhook payload, for the
    /// case where the local record is gone but a paid notification still
    /// has to reach attribution.
    pub fn from_webhook(order_id: &str, status: OrderStatus, data: &WebhookData) -> Self {
        Self {
            order_id: order_id.to_string(),
            platform: "pix-checkout".to_string(),
            payment_method: "pix".to_string(),
            status: wire_status(status).to_string(),
            created_at: Utc::now(),
            approved_at: (status == OrderStatus::Paid).then(Utc::now),
            total_price_in_cents: data.amount.unwrap_or(0),
            gateway_fee_in_cents: data.gateway_fee_minor_units().unwrap_or(0),
            customer: data.buyer.clone(),
            product: data.product.clone(),
            tracking_parameters: data.tracking.clone(),
        }
    }
}

/// Status vocabulary of the attribution API.
pub fn wire_status(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "waiting_payment",
        OrderStatus::Paid => "paid",
        OrderStatus::Refunded => "refunded",
        OrderStatus::Canceled => "refused",
        OrderStatus::Expired => "expired",
    }
}

/// Destination for order lifecycle events. Trait seam so the reconciler can
/// be exercised in tests without a live attribution endpoint.
#[async_trait]
pub trait AttributionSink: Send + Sync {
    async fn push(&self, event: &OrderEvent) -> Result<(), AttributionError>;
}

/// HTTP forwarder. Best-effort by contract: callers log failures and move
/// on, and delivery is skipped entirely when no API token is configured.
pub struct AttributionClient {
    http: Client,
    api_token: Option<String>,
    base_url: String,
}

impl AttributionClient {
    pub fn new(config: &AttributionConfig) -> Result<Self, AttributionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AttributionError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AttributionSink for AttributionClient {
    async fn push(&self, event: &OrderEvent) -> Result<(), AttributionError> {
        let Some(token) = self.api_token.as_deref() else {
            debug!(order_id = %event.order_id, "attribution disabled, skipping push");
            return Ok(());
        };

        let url = format!("{}/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-token", token)
            .json(event)
            .send()
            .await
            .map_err(|e| AttributionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttributionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            order_id = %event.order_id,
            status = %event.status,
            "order event forwarded to attribution"
        );
        Ok(())
    }
}
