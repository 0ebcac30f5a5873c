use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a tracked order.
///
/// `Pending` is the only non-terminal state; everything else ends the
/// order's useful life and makes it eligible for eviction on the next
/// reap cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Refunded,
    Canceled,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" | "waiting_payment" => Ok(OrderStatus::Pending),
            "paid" | "approved" => Ok(OrderStatus::Paid),
            "refunded" => Ok(OrderStatus::Refunded),
            "canceled" | "cancelled" => Ok(OrderStatus::Canceled),
            "expired" => Ok(OrderStatus::Expired),
            _ => Err(UnknownStatusError(value.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatusError(pub String);

/// One tracked payment intent, keyed by the locally generated order id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub gateway_transaction_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub amount_minor_units: i64,
    pub gateway_fee_minor_units: i64,
    pub customer: Option<JsonValue>,
    pub product: Option<JsonValue>,
    pub offer: Option<JsonValue>,
    pub tracking: Option<JsonValue>,
}

/// Attributes captured at creation time, before the first webhook.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub gateway_transaction_id: Option<String>,
    pub amount_minor_units: i64,
    pub customer: Option<JsonValue>,
    pub product: Option<JsonValue>,
    pub offer: Option<JsonValue>,
    pub tracking: Option<JsonValue>,
}

/// Partial update applied by the reconciler or the status endpoint.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub gateway_transaction_id: Option<String>,
    pub amount_minor_units: Option<i64>,
    pub gateway_fee_minor_units: Option<i64>,
    pub customer: Option<JsonValue>,
    pub product: Option<JsonValue>,
    pub offer: Option<JsonValue>,
    pub tracking: Option<JsonValue>,
}

impl OrderPatch {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Generates a unique order identifier, used as the correlation token
/// across gateway creation, webhooks, and storefront polling.
pub fn new_order_id() -> String {
    format!(
        "order_{}_{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}
