// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use nexus_bridge::BridgeManager;
use nexus_core::NexusError;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::{handlers, webhooks};

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<BridgeManager>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Gateway server configuration (mirrors `GatewayConfig` from nexus-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the full route table:
/// - GET /health, GET /metrics (public)
/// - GET|POST /api/webhooks/{platform}/{tenant} (public, platform-facing)
/// - /v1/bridges/..., /v1/messages, /v1/conversations/... (bearer auth)
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route(
            "/api/webhooks/{platform}/{tenant}",
            get(webhooks::verify).post(webhooks::receive),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/bridges/{tenant}", get(handlers::list_bridges))
        .route("/v1/bridges/{tenant}/{platform}", get(handlers::get_bridge))
        .route("/v1/bridges/{tenant}/{platform}/setup", post(handlers::setup_bridge))
        .route(
            "/v1/bridges/{tenant}/{platform}/configure",
            post(handlers::configure_bridge),
        )
        .route("/v1/bridges/{tenant}/{platform}/test", post(handlers::test_bridge))
        .route(
            "/v1/bridges/{tenant}/{platform}/activate",
            post(handlers::activate_bridge),
        )
        .route(
            "/v1/bridges/{tenant}/{platform}/deactivate",
            post(handlers::deactivate_bridge),
        )
        .route("/v1/messages", post(handlers::send_message))
        .route("/v1/conversations/{tenant}", get(handlers::list_conversations))
        .route(
            "/v1/conversations/{tenant}/{conversation_id}/messages",
            get(handlers::list_messages),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Binds and serves until `cancel` fires, then drains in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), NexusError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NexusError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| NexusError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
