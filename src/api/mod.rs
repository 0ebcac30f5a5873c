pub mod ops;
pub mod payments;
pub mod status;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;

use crate::gateway::GatewayClient;
use crate::orders::store::OrderStore;
use crate::services::attribution::AttributionSink;
use crate::services::reconciler::WebhookReconciler;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub gateway: Arc<GatewayClient>,
    pub attribution: Arc<dyn AttributionSink>,
    pub reconciler: Arc<WebhookReconciler>,
    /// Shared client for auxiliary outbound calls (server-ip proxy).
    pub http: reqwest::Client,
    /// Gateway PIX payment window used for lazy expiry on status reads.
    pub pix_expiry: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ops::root))
        .route("/my-server-ip", get(ops::my_server_ip))
        .route("/create-payment", post(payments::create_payment))
        .route("/webhook/{gateway}", post(webhooks::handle_webhook))
        .route("/check-order-status", get(status::check_order_status))
        .with_state(state)
}
