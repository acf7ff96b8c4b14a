//! API server — HTTP endpoints plus the Prometheus metrics exporter on a
//! separate port.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lotpulse_core::config::ApiConfig;

use crate::middleware::track_request;
use crate::rest::{self, AppState};

pub struct ApiServer {
    api: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(api: ApiConfig, state: AppState) -> Self {
        Self { api, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Ingestion
            .route("/v1/track", post(rest::track_event))
            .route("/v1/track/performance", post(rest::track_performance))
            // Queries
            .route("/v1/dashboard", get(rest::dashboard))
            .route("/v1/realtime", get(rest::realtime))
            // Operational endpoints
            .route("/health", get(rest::health))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                track_request,
            ))
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the HTTP server and serve until the task is cancelled.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::new(self.api.host.parse()?, self.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Start the metrics exporter on its own port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.api.host.parse()?,
                self.api.metrics_port,
            ))
            .install()?;

        info!(port = self.api.metrics_port, "Metrics exporter started");
        Ok(())
    }
}
