use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Create-transaction call
// ---------------------------------------------------------------------------

/// Transaction shape expected by the gateway's create call. The
/// `external_id` carries our locally generated order id; the gateway
/// echoes it back in webhooks, which is the primary correlation channel.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransactionRequest {
    pub external_id: String,
    pub payment_method: String,
    /// Minor units (centavos).
    pub amount: i64,
    pub buyer: Buyer,
    pub product: Option<ProductRef>,
    /// Sent as JSON `null` when the storefront did not provide a complete
    /// offer block.
    pub offer: Option<OfferRef>,
    pub tracking: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    pub document: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferRef {
    pub id: String,
    pub name: String,
    pub discount_price: Option<i64>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionResponse {
    pub data: CreateTransactionData,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionData {
    #[serde(default)]
    pub id: Option<JsonValue>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub pix: Option<PixPayload>,
}

impl CreateTransactionData {
    /// The gateway has been observed sending its transaction id both as a
    /// string and as a bare number.
    pub fn transaction_id(&self) -> Option<String> {
        normalize_id(self.id.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixPayload {
    pub code: String,
    pub qrcode_base64: String,
}

// ---------------------------------------------------------------------------
// Webhook callback
// ---------------------------------------------------------------------------

/// Inbound webhook body. Every field is optional by design: the payload is
/// unauthenticated and unvalidated, and the reconciler decides what is
/// usable.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub id: Option<JsonValue>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    /// Minor units, as reported by the gateway.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub buyer: Option<JsonValue>,
    #[serde(default)]
    pub product: Option<JsonValue>,
    #[serde(default)]
    pub offer: Option<JsonValue>,
    #[serde(default)]
    pub tracking: Option<JsonValue>,
    #[serde(default)]
    pub fees: Option<WebhookFees>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookFees {
    #[serde(default)]
    pub gateway: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

impl WebhookData {
    pub fn transaction_id(&self) -> Option<String> {
        normalize_id(self.id.as_ref())
    }

    pub fn gateway_fee_minor_units(&self) -> Option<i64> {
        self.fees
            .as_ref()
            .and_then(|fees| fees.gateway.or(fees.total))
    }

    /// Non-empty string value of a key inside the echoed tracking object.
    pub fn tracking_field(&self, key: &str) -> Option<String> {
        self.tracking
            .as_ref()
            .and_then(|tracking| tracking.get(key))
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

fn normalize_id(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
