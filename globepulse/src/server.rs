//! HTTP server: router construction and lifecycle.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use globepulse_core::config::{Config, PresenceConfig};
use globepulse_core::service::PresenceHandle;

use crate::ws;

/// Shared state for all routes
#[derive(Clone)]
pub struct AppState {
    pub hub: PresenceHandle,
    pub presence: PresenceConfig,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/stats", get(stats))
        // WebSocket endpoint for the live presence roster
        .route("/ws", get(ws::websocket_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check (always returns OK if server is running)
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Read-only snapshot: roster size and all-time region counters
async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.hub.stats().await {
        Ok(overview) => Json(overview).into_response(),
        Err(e) => {
            error!(error = %e, "Stats query failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// Serve HTTP until a shutdown signal arrives. In-flight fan-outs drain
/// through the hub after this returns; no new sessions are admitted once
/// the listener stops.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let http_addr: std::net::SocketAddr = config.http_address().parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use globepulse_core::service::{PresenceHub, RegionStatsStore};
    use tower::ServiceExt;

    async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let store = RegionStatsStore::open(dir.path().join("stats.json")).await;
        let (hub, _task) = PresenceHub::spawn(store);
        AppState {
            hub,
            presence: PresenceConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_healthz() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir).await);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(test_state(&dir).await);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["regions"], serde_json::json!({}));
    }
}
