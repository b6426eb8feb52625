//! Message send handler

use axum::extract::State;
use axum::Json;
use cangw_gateway::SendMessageInput;
use serde::Serialize;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SendResponse {
    pub status: String,
    pub message: String,
}

/// POST /messages/send
/// Validate and transmit one CAN message
pub async fn send_message(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SendMessageInput>,
) -> Result<Json<SendResponse>, ApiError> {
    let frame = state.gateway().send_message(&input).await?;

    Ok(Json(SendResponse {
        status: "success".to_string(),
        message: format!(
            "CAN message sent on channel {}, id {}",
            frame.channel, frame.can_id
        ),
    }))
}
