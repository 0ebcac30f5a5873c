use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::gateway::types::{
    CreateTransactionRequest, CreateTransactionResponse, PixPayload,
};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Non-2xx from the gateway; the upstream status and body are relayed
    /// to the storefront unmodified.
    #[error("gateway rejected the request (HTTP {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("gateway request failed: {0}")]
    Network(String),

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),

    /// 2xx response that carried no PIX payload; nothing to hand to the
    /// storefront, treated as an upstream fault.
    #[error("gateway did not return a PIX payload")]
    MissingPix,
}

/// Outcome of a successful create call.
#[derive(Debug, Clone)]
pub struct CreatedTransaction {
    pub gateway_transaction_id: Option<String>,
    pub pix: PixPayload,
}

/// Thin client for the PIX gateway's transactions API.
///
/// Creation is deliberately not retried: a replayed create call would mint
/// a second transaction for the same order.
pub struct GatewayClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> GatewayResult<CreatedTransaction> {
        let url = format!("{}/transactions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("User-Agent", "Buckpay API")
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(
                external_id = %request.external_id,
                status = status.as_u16(),
                "gateway create call failed"
            );
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateTransactionResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid JSON: {e}")))?;

        let gateway_transaction_id = parsed.data.transaction_id();
        let pix = parsed.data.pix.ok_or(GatewayError::MissingPix)?;

        info!(
            external_id = %request.external_id,
            gateway_transaction_id = gateway_transaction_id.as_deref().unwrap_or("-"),
            "gateway transaction created"
        );

        Ok(CreatedTransaction {
            gateway_transaction_id,
            pix,
        })
    }
}
