//! Request handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::Extensions;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::listener::RelayServer;
use crate::image::ImageRecord;
use crate::registry::Scope;
use crate::stats::RelayStatus;

type Upgrade = Result<WebSocketUpgrade, WebSocketUpgradeRejection>;

/// Build the router for `server`
pub fn router(server: Arc<RelayServer>) -> Router {
    Router::new()
        .route("/ws/device", get(device_socket))
        .route("/ws/devices/all", get(all_devices_socket))
        .route("/devices", get(list_devices))
        .route("/devices/{esp_hmac}", get(get_device))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

#[derive(Debug, Deserialize)]
struct DeviceQuery {
    esp_hmac: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeviceList {
    status: &'static str,
    count: usize,
    devices: Vec<ImageRecord>,
}

async fn device_socket(
    State(server): State<Arc<RelayServer>>,
    Query(query): Query<DeviceQuery>,
    extensions: Extensions,
    ws: Upgrade,
) -> Result<Response, ApiError> {
    let device_id = query
        .esp_hmac
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingDeviceId)?;

    upgrade(server, ws?, Scope::Device(device_id), peer_addr(&extensions))
}

async fn all_devices_socket(
    State(server): State<Arc<RelayServer>>,
    extensions: Extensions,
    ws: Upgrade,
) -> Result<Response, ApiError> {
    upgrade(server, ws?, Scope::AllDevices, peer_addr(&extensions))
}

fn upgrade(
    server: Arc<RelayServer>,
    ws: WebSocketUpgrade,
    scope: Scope,
    peer: Option<SocketAddr>,
) -> Result<Response, ApiError> {
    let permit = server.try_acquire_session().ok_or_else(|| {
        tracing::warn!(scope = %scope, peer = ?peer, "Connection rejected: limit reached");
        ApiError::Unavailable
    })?;

    let ctx = server.session_context(scope, peer);
    Ok(ws.on_upgrade(move |socket| server.serve_socket(socket, ctx, permit)))
}

fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

async fn list_devices(State(server): State<Arc<RelayServer>>) -> Json<DeviceList> {
    let devices = server.relay().all().await;
    Json(DeviceList {
        status: "success",
        count: devices.len(),
        devices,
    })
}

async fn get_device(
    State(server): State<Arc<RelayServer>>,
    Path(esp_hmac): Path<String>,
) -> Result<Json<ImageRecord>, ApiError> {
    server
        .relay()
        .latest(&esp_hmac)
        .await
        .map(Json)
        .ok_or(ApiError::DeviceNotFound(esp_hmac))
}

async fn health(State(server): State<Arc<RelayServer>>) -> Json<RelayStatus> {
    Json(server.relay().status().await)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::relay::Relay;
    use crate::server::ServerConfig;

    async fn server_with(frames: &[(&str, &str, i64)]) -> Arc<RelayServer> {
        let relay = Arc::new(Relay::default());
        for (device, payload, at) in frames {
            relay.ingest_at(device, payload, *at).await;
        }
        Arc::new(RelayServer::new(ServerConfig::default(), relay))
    }

    async fn get_json(server: Arc<RelayServer>, uri: &str) -> (StatusCode, Value) {
        let response = router(server)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_list_devices() {
        let server = server_with(&[("AA:BB", "IMG1", 100), ("CC:DD", "IMG2", 200)]).await;
        let (status, body) = get_json(server, "/devices").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["count"], 2);
        assert_eq!(body["devices"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_get_device() {
        let server = server_with(&[("AA:BB", "IMG1", 100)]).await;
        let (status, body) = get_json(server, "/devices/AA:BB").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["esp_hmac"], "AA:BB");
        assert_eq!(body["image_data"], "data:image/jpeg;base64,IMG1");
        assert_eq!(body["timestamp"], 100);
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_404() {
        let server = server_with(&[]).await;
        let (status, body) = get_json(server, "/devices/EE:FF").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("EE:FF"));
    }

    #[tokio::test]
    async fn test_device_socket_requires_id() {
        let server = server_with(&[]).await;

        let (status, body) = get_json(server.clone(), "/ws/device").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = get_json(server, "/ws/device?esp_hmac=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        let server = server_with(&[("AA:BB", "IMG1", 100)]).await;
        let (status, body) = get_json(server, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["devices"], 1);
        assert_eq!(body["specific_subscribers"], 0);
        assert_eq!(body["stats"]["frames_ingested"], 1);
        assert_eq!(body["stats"]["bus_connected"], false);
    }
}
