use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::services::normalizer::NormalizeError;

/// Errors surfaced to the storefront by the payment-creation path. Webhook
/// handling never uses this type: that endpoint acknowledges the gateway
/// unconditionally.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { message: String },

    /// The gateway answered non-2xx; its status code and body are relayed.
    #[error("gateway rejected the request (HTTP {status})")]
    UpstreamGateway { status: u16, details: String },

    #[error("{0}")]
    Internal(String),
}

impl From<NormalizeError> for ApiError {
    fn from(err: NormalizeError) -> Self {
        ApiError::Validation {
            message: err.to_string(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Upstream { status, body } => ApiError::UpstreamGateway {
                status,
                details: body,
            },
            GatewayError::MissingPix => {
                ApiError::Internal("unexpected gateway response (PIX not generated)".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),

            ApiError::UpstreamGateway { status, details } => {
                error!(status, "relaying gateway failure to storefront");
                let code =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    code,
                    Json(json!({
                        "success": false,
                        "error": "Failed to create payment at the gateway.",
                        "details": details,
                        "http_status": status,
                    })),
                )
                    .into_response()
            }

            ApiError::Internal(message) => {
                error!(error = %message, "payment request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": message })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_preserved() {
        let err: ApiError = GatewayError::Upstream {
            status: 422,
            body: "invalid document".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            ApiError::UpstreamGateway { status: 422, .. }
        ));
    }

    #[test]
    fn missing_pix_maps_to_internal() {
        let err: ApiError = GatewayError::MissingPix.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
