use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::gateway::types::{Buyer, CreateTransactionRequest, OfferRef, ProductRef};

/// Minimum charge accepted by the storefront, in minor units (R$ 5,00).
pub const MIN_AMOUNT_MINOR_UNITS: i64 = 500;

/// Raw create-payment body as sent by the storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub amount: Option<f64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub offer_id: Option<String>,
    pub offer_name: Option<String>,
    pub discount_price: Option<f64>,
    pub quantity: Option<u32>,
    pub tracking: Option<JsonValue>,
}

#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    #[error("required fields are missing: {0}")]
    MissingField(&'static str),

    #[error("amount must be at least {minimum} minor units, got {got}")]
    AmountTooSmall { minimum: i64, got: i64 },
}

/// Converts a decimal currency amount into integer minor units.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Normalizes a phone number to digits with the Brazilian country code.
/// Returns `None` when nothing usable remains after stripping formatting.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    // Bare national numbers (DDD + 8-9 digits) get the country code.
    if digits.len() == 10 || digits.len() == 11 {
        return Some(format!("55{digits}"));
    }
    Some(digits)
}

/// Maps the storefront request into the gateway's transaction shape,
/// validating the fields that affect lifecycle correctness.
pub fn normalize(
    order_id: &str,
    request: &CheckoutRequest,
) -> Result<CreateTransactionRequest, NormalizeError> {
    let amount = request
        .amount
        .filter(|amount| *amount > 0.0)
        .ok_or(NormalizeError::MissingField("amount"))?;
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or(NormalizeError::MissingField("email"))?;
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(NormalizeError::MissingField("name"))?;

    let amount_minor_units = to_minor_units(amount);
    if amount_minor_units < MIN_AMOUNT_MINOR_UNITS {
        return Err(NormalizeError::AmountTooSmall {
            minimum: MIN_AMOUNT_MINOR_UNITS,
            got: amount_minor_units,
        });
    }

    // Product and offer are sent only when complete; otherwise JSON null.
    let product = match (&request.product_id, &request.product_name) {
        (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => Some(ProductRef {
            id: id.clone(),
            name: name.clone(),
        }),
        _ => None,
    };
    let offer = match (&request.offer_id, &request.offer_name) {
        (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => Some(OfferRef {
            id: id.clone(),
            name: name.clone(),
            discount_price: request.discount_price.map(to_minor_units),
            quantity: request.quantity,
        }),
        _ => None,
    };

    // Stamp the order id into the tracking bag so the gateway echoes it
    // back; `external_id` remains the primary correlation channel.
    let tracking = request.tracking.clone().map(|tracking| match tracking {
        JsonValue::Object(mut map) => {
            map.insert("ref".to_string(), JsonValue::String(order_id.to_string()));
            JsonValue::Object(map)
        }
        other => other,
    });

    Ok(CreateTransactionRequest {
        external_id: order_id.to_string(),
        payment_method: "pix".to_string(),
        amount: amount_minor_units,
        buyer: Buyer {
            name: name.to_string(),
            email: email.to_string(),
            document: request.document.clone(),
            phone: request.phone.as_deref().and_then(normalize_phone),
        },
        product,
        offer,
        tracking,
    })
}
