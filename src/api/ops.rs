use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::api::AppState;

/// GET / — liveness text.
pub async fn root() -> &'static str {
    "PIX checkout service is online"
}

#[derive(Debug, Deserialize)]
struct IpifyResponse {
    ip: String,
}

/// GET /my-server-ip — proxies a public what-is-my-ip lookup so operators
/// can allowlist the egress address at the gateway.
pub async fn my_server_ip(State(state): State<AppState>) -> Response {
    let result = async {
        state
            .http
            .get("https://api.ipify.org?format=json")
            .send()
            .await?
            .error_for_status()?
            .json::<IpifyResponse>()
            .await
    }
    .await;

    match result {
        Ok(body) => (StatusCode::OK, Json(json!({ "ip": body.ip }))).into_response(),
        Err(e) => {
            error!(error = %e, "failed to resolve server IP");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to resolve server IP" })),
            )
                .into_response()
        }
    }
}
