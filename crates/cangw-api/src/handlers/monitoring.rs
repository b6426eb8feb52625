//! Monitoring session handlers

use axum::extract::State;
use axum::Json;
use cangw_core::{CapturedFrame, SessionStatus};
use cangw_gateway::StopSelector;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartRequest {
    pub channel: u32,
    /// Duration in seconds; omitted means monitor until stopped
    pub duration: Option<u64>,
}

#[derive(Serialize)]
pub struct StartResponse {
    pub status: String,
    pub session_id: Uuid,
    pub channel: u32,
    pub message: String,
}

/// POST /monitoring/start
pub async fn start_monitoring(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let session_id = state
        .gateway()
        .start_monitoring(request.channel, request.duration)
        .await?;

    let message = match request.duration {
        Some(secs) => format!(
            "Started monitoring channel {} for {} seconds",
            request.channel, secs
        ),
        None => format!("Started monitoring channel {}", request.channel),
    };

    Ok(Json(StartResponse {
        status: "success".to_string(),
        session_id,
        channel: request.channel,
        message,
    }))
}

#[derive(Deserialize)]
pub struct StopRequest {
    pub session_id: Option<Uuid>,
    pub channel: Option<u32>,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub status: String,
    #[serde(flatten)]
    pub session: SessionStatus,
}

/// POST /monitoring/stop
/// Idempotent: stopping an already-stopped session returns 200
pub async fn stop_monitoring(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StopRequest>,
) -> Result<Json<StopResponse>, ApiError> {
    let selector = match (request.session_id, request.channel) {
        (Some(session_id), _) => StopSelector::Session(session_id),
        (None, Some(channel)) => StopSelector::Channel(channel),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "session_id or channel is required".to_string(),
            ))
        }
    };

    let session = state.gateway().stop_monitoring(selector).await?;
    Ok(Json(StopResponse {
        status: "success".to_string(),
        session,
    }))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub session_id: Uuid,
    /// Skip the first N frames of the retained window
    pub since: Option<usize>,
}

#[derive(Serialize)]
pub struct MessagesResponse {
    pub status: String,
    pub total_messages: usize,
    pub messages: Vec<CapturedFrame>,
}

/// GET /monitoring/messages?session_id=...&since=N
pub async fn get_messages(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = state.gateway().messages(query.session_id, query.since)?;
    Ok(Json(MessagesResponse {
        status: "success".to_string(),
        total_messages: messages.len(),
        messages,
    }))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(flatten)]
    pub session: SessionStatus,
}

/// GET /monitoring/status?session_id=...
pub async fn get_status(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = state.gateway().monitoring_status(query.session_id)?;
    Ok(Json(StatusResponse {
        status: "success".to_string(),
        session,
    }))
}
