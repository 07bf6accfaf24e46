// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post, put},
};
use quill_agent::AgentLoop;
use quill_bus::ChangeRecorder;
use quill_config::model::GatewayConfig;
use quill_core::{Changelog, PersonaStore, QuillError, WritePolicy};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{chat, handlers, sse};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Agent loop that serves chat requests.
    pub agent: Arc<AgentLoop>,
    pub personas: Arc<dyn PersonaStore>,
    pub changelog: Arc<dyn Changelog>,
    /// Publishes UI mutations to observers and the changelog.
    pub recorder: ChangeRecorder,
    pub write_policy: WritePolicy,
    /// Cancelled on process shutdown; ends agent runs and event streams.
    pub shutdown: CancellationToken,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            cors_origins: config.cors_origins.clone(),
        }
    }
}

/// Builds the full route table.
///
/// - GET /v1/health
/// - /v1/personas and /v1/test-cases CRUD
/// - POST/GET/DELETE /v1/personas/{id}/chat
/// - GET /v1/events (sync channel)
/// - GET /v1/changelog
pub fn router(state: GatewayState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/v1/health", get(handlers::get_health))
        .route(
            "/v1/personas",
            get(handlers::list_personas).post(handlers::create_persona),
        )
        .route(
            "/v1/personas/{id}",
            get(handlers::get_persona)
                .put(handlers::update_persona)
                .delete(handlers::delete_persona),
        )
        .route(
            "/v1/personas/{id}/test-cases",
            get(handlers::list_test_cases).post(handlers::create_test_case),
        )
        .route(
            "/v1/personas/{id}/test-cases/{tc_id}/link",
            post(handlers::link_test_case).delete(handlers::unlink_test_case),
        )
        .route(
            "/v1/test-cases/{id}",
            put(handlers::update_test_case).delete(handlers::delete_test_case),
        )
        .route("/v1/test-cases/{id}/result", put(handlers::record_result))
        .route(
            "/v1/personas/{id}/chat",
            post(chat::post_chat)
                .get(chat::get_history)
                .delete(chat::clear_history),
        )
        .route("/v1/events", get(sse::get_events))
        .route("/v1/changelog", get(handlers::get_changelog))
        .with_state(state);

    api.layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the gateway HTTP server.
///
/// Serves until `state.shutdown` is cancelled, then drains open connections.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), QuillError> {
    let shutdown = state.shutdown.clone();
    let app = router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| QuillError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| QuillError::Internal(format!("gateway server error: {e}")))?;

    info!("Gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_from_gateway_section() {
        let gateway = GatewayConfig::default();
        let config = ServerConfig::from(&gateway);
        assert_eq!(config.host, gateway.host);
        assert_eq!(config.port, gateway.port);
        let debug = format!("{config:?}");
        assert!(debug.contains(&gateway.host));
    }

    #[test]
    fn invalid_cors_origin_is_skipped() {
        // Building the layer must not panic on a bad header value.
        let _layer = cors_layer(&["http://localhost:5173".into(), "bad\norigin".into()]);
    }
}
