use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::info;

use pix_checkout_backend::api::{self, AppState};
use pix_checkout_backend::config::AppConfig;
use pix_checkout_backend::gateway::GatewayClient;
use pix_checkout_backend::logging::init_tracing;
use pix_checkout_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use pix_checkout_backend::orders::reaper::ReaperWorker;
use pix_checkout_backend::orders::store::{InMemoryOrderStore, OrderStore};
use pix_checkout_backend::services::attribution::{AttributionClient, AttributionSink};
use pix_checkout_backend::services::reconciler::{CorrelationStrategy, WebhookReconciler};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting PIX checkout backend"
    );

    // Fail fast on missing/invalid configuration before accepting traffic.
    let config = AppConfig::from_env()?;
    config.validate()?;

    let store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new(config.orders.lifetime));
    let gateway = Arc::new(GatewayClient::new(&config.gateway)?);
    let attribution: Arc<dyn AttributionSink> =
        Arc::new(AttributionClient::new(&config.attribution)?);

    if config.attribution.api_token.is_none() {
        info!("no attribution token configured, event forwarding disabled");
    }

    let reconciler = Arc::new(WebhookReconciler::new(
        store.clone(),
        attribution.clone(),
        CorrelationStrategy::default_order(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = ReaperWorker::new(store.clone(), config.orders.reap_interval);
    let reaper_handle = tokio::spawn(reaper.run(shutdown_rx));

    let allowed_origin = config
        .server
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("invalid ALLOWED_ORIGIN: {e}"))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let state = AppState {
        store,
        gateway,
        attribution,
        reconciler,
        http: reqwest::Client::new(),
        pix_expiry: config.orders.pix_expiry,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the reaper before exiting.
    let _ = shutdown_tx.send(true);
    let _ = reaper_handle.await;

    info!("shutdown complete");
    Ok(())
}
