use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::error::ApiError;
use crate::gateway::types::PixPayload;
use crate::orders::types::{new_order_id, NewOrder};
use crate::services::attribution::OrderEvent;
use crate::services::normalizer::{self, CheckoutRequest};

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub pix: PixPayload,
    /// Wire name kept from the original storefront contract; the value is
    /// the locally generated order id, not the gateway's transaction id.
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
}

/// POST /create-payment
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CreatePaymentResponse>, ApiError> {
    let order_id = new_order_id();
    info!(
        order_id = %order_id,
        email = request.email.as_deref().unwrap_or("-"),
        "creating payment"
    );

    let transaction = normalizer::normalize(&order_id, &request)?;
    let created = state.gateway.create_transaction(&transaction).await?;

    // Track the order only after the gateway accepted it. A failed insert
    // must not fail the storefront response: the PIX payload already
    // exists and is payable.
    match state
        .store
        .insert(
            &order_id,
            NewOrder {
                gateway_transaction_id: created.gateway_transaction_id.clone(),
                amount_minor_units: transaction.amount,
                customer: serde_json::to_value(&transaction.buyer).ok(),
                product: transaction
                    .product
                    .as_ref()
                    .and_then(|p| serde_json::to_value(p).ok()),
                offer: transaction
                    .offer
                    .as_ref()
                    .and_then(|o| serde_json::to_value(o).ok()),
                tracking: transaction.tracking.clone(),
            },
        )
        .await
    {
        Ok(record) => {
            if let Err(e) = state
                .attribution
                .push(&OrderEvent::from_record(&record))
                .await
            {
                warn!(order_id = %order_id, error = %e, "initial attribution push failed");
            }
        }
        Err(e) => {
            error!(order_id = %order_id, error = %e, "failed to track order");
        }
    }

    Ok(Json(CreatePaymentResponse {
        pix: created.pix,
        transaction_id: order_id,
    }))
}
