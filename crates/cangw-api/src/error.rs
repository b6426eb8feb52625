//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cangw_core::GatewayError;
use serde::Serialize;

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 Not Found
    NotFound(String),
    /// 409 Conflict (channel busy / already monitored)
    Conflict(String),
    /// 502 Bad Gateway (device/driver failure)
    BadGateway(String),
    /// 504 Gateway Timeout (transmit exceeded bound)
    GatewayTimeout(String),
    /// 500 Internal Server Error
    Internal(String),
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        match err {
            GatewayError::ChannelNotFound(_) | GatewayError::SessionNotFound(_) => {
                ApiError::NotFound(message)
            }
            GatewayError::InvalidChannel(_)
            | GatewayError::InvalidId(_)
            | GatewayError::InvalidLength(_)
            | GatewayError::LengthMismatch { .. }
            | GatewayError::InvalidByte { .. }
            | GatewayError::InvalidBitrate(_)
            | GatewayError::InvalidRequest(_) => ApiError::BadRequest(message),
            GatewayError::ChannelBusy(_) => ApiError::Conflict(message),
            GatewayError::Device(_) => ApiError::BadGateway(message),
            GatewayError::TransmitTimeout(_) => ApiError::GatewayTimeout(message),
            GatewayError::Internal(_) => ApiError::Internal(message),
        }
    }
}
