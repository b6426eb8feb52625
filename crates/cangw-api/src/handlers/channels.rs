//! Channel discovery handlers

use axum::extract::{Path, State};
use axum::Json;
use cangw_core::ChannelInfo;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ChannelsResponse {
    pub status: String,
    pub total_channels: usize,
    pub channels: Vec<ChannelInfo>,
}

/// GET /channels
/// List all available CAN channels
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelsResponse> {
    let channels = state.gateway().list_channels();
    Json(ChannelsResponse {
        status: "success".to_string(),
        total_channels: channels.len(),
        channels,
    })
}

/// GET /channels/{channel_id}
/// Get information about a specific CAN channel
pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<u32>,
) -> Result<Json<ChannelInfo>, ApiError> {
    let info = state.gateway().channel(channel_id)?;
    Ok(Json(info))
}
