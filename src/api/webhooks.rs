use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::gateway::types::WebhookEnvelope;

/// POST /webhook/{gateway}
///
/// Always answers 200 with a plain acknowledgement: redelivery is the
/// gateway's only consistency mechanism and must never be triggered by
/// internal reconciliation problems. Parsing happens on the raw bytes for
/// the same reason; a malformed payload — invalid JSON or not even UTF-8 —
/// is logged, not rejected.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    info!(gateway = %gateway, "received gateway webhook");

    if gateway != "buckpay" {
        warn!(gateway = %gateway, "webhook from unrecognized gateway path");
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(gateway = %gateway, error = %e, "malformed webhook body, acknowledging anyway");
            return ack();
        }
    };

    let outcome = state.reconciler.process(&envelope).await;
    debug!(gateway = %gateway, ?outcome, "webhook reconciled");

    ack()
}

fn ack() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Webhook received")
}
