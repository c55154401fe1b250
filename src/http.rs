//! Local read-only introspection endpoints
//!
//! Served regardless of bus state so an abandoned broker session is still
//! visible on the device.

use crate::clients::SystemMonitor;
use crate::connection::ConnectionState;
use crate::lease::LeaseManager;
use crate::monitor::CameraMonitor;
use anyhow::Result;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub site_id: String,
    pub location: String,
    pub gateway_id: String,
    pub bus_state: watch::Receiver<ConnectionState>,
    pub cameras: Arc<CameraMonitor>,
    pub leases: Arc<LeaseManager>,
    pub system: Arc<SystemMonitor>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cameras", get(list_cameras))
        .route("/api/stats", get(stats))
        .route("/api/leases", get(list_leases))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let bus_state = *state.bus_state.borrow();
    let health = state.system.check_health().await;

    Json(json!({
        "status": if health.healthy { "ok" } else { "degraded" },
        "gatewayId": state.gateway_id,
        "siteId": state.site_id,
        "location": state.location,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.system.uptime_secs(),
        "mqtt": {
            "state": bus_state.label(),
            "connected": bus_state.is_connected(),
        },
        "health": health,
        "timestamp": edge_agent_shared::timestamp(),
    }))
}

async fn list_cameras(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cameras.cameras().await)
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "system": state.system.light_stats().await,
        "cameras": state.cameras.stats().await,
        "leases": state.leases.len().await,
    }))
}

async fn list_leases(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.leases.active().await)
}

/// Serve until `shutdown` is cancelled
pub async fn serve(state: AppState, port: u16, shutdown: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[HTTP] Listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("[HTTP] Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientError, RelayControl, StatusSource};
    use crate::testing::RecordingBus;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use edge_agent_shared::{PathDescriptor, Topics};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct NoSource;

    #[async_trait]
    impl StatusSource for NoSource {
        async fn list_paths(&self) -> Result<Vec<PathDescriptor>, ClientError> {
            Ok(Vec::new())
        }
    }

    struct AcceptingRelay;

    #[async_trait]
    impl RelayControl for AcceptingRelay {
        async fn add_path(&self, _name: &str, _source: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn delete_path(&self, _name: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    async fn state(bus_state: ConnectionState) -> AppState {
        let cameras = Arc::new(CameraMonitor::new(
            Arc::new(NoSource),
            Arc::new(RecordingBus::default()),
            Topics::new("gw1"),
            "localhost",
            Duration::from_secs(10),
        ));
        let path: PathDescriptor = serde_json::from_value(json!({
            "name": "Cam 01", "ready": true, "tracks": ["H264"]
        }))
        .unwrap();
        cameras.process_paths(&[path]).await;

        let (_, bus_rx) = watch::channel(bus_state);
        AppState {
            site_id: "site-7".into(),
            location: "lobby".into(),
            gateway_id: "gw1".into(),
            bus_state: bus_rx,
            cameras,
            leases: LeaseManager::new(Arc::new(AcceptingRelay), Duration::from_secs(60)),
            system: Arc::new(SystemMonitor::new()),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_abandoned_bus() {
        let app = create_router(state(ConnectionState::Abandoned).await);
        let (status, body) = get_json(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["siteId"], "site-7");
        assert_eq!(body["mqtt"]["state"], "abandoned");
        assert_eq!(body["mqtt"]["connected"], false);
    }

    #[tokio::test]
    async fn test_health_carries_threshold_report() {
        let app = create_router(state(ConnectionState::Connected).await);
        let (_, body) = get_json(app, "/health").await;

        let healthy = body["health"]["healthy"].as_bool().unwrap();
        assert_eq!(body["status"], if healthy { "ok" } else { "degraded" });
        assert!(body["health"]["warnings"].is_array());
        assert_eq!(
            body["health"]["errors"].as_array().unwrap().is_empty(),
            healthy
        );
    }

    #[tokio::test]
    async fn test_cameras_and_stats() {
        let app = create_router(state(ConnectionState::Connected).await);

        let (_, cameras) = get_json(app.clone(), "/api/cameras").await;
        assert_eq!(cameras[0]["cameraId"], "cam-01");

        let (_, stats) = get_json(app, "/api/stats").await;
        assert_eq!(stats["cameras"]["online"], 1);
        assert_eq!(stats["leases"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leases() {
        let state = state(ConnectionState::Connected).await;
        state.leases.acquire("sdplay-cam-01-1", "rtsp://x").await.unwrap();

        let (_, leases) = get_json(create_router(state), "/api/leases").await;
        assert_eq!(leases[0]["name"], "sdplay-cam-01-1");
        assert!(leases[0]["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_router(state(ConnectionState::Idle).await);
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
