//! HTTP error responses

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors returned to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("esp_hmac query parameter is required")]
    MissingDeviceId,

    #[error("no image stored for device {0}")]
    DeviceNotFound(String),

    #[error("connection limit reached")]
    Unavailable,

    #[error(transparent)]
    Upgrade(#[from] WebSocketUpgradeRejection),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingDeviceId => StatusCode::BAD_REQUEST,
            ApiError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upgrade(rejection) => return rejection.into_response(),
        };

        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
