//! Bus diagnostics handler

use axum::extract::State;
use axum::Json;
use cangw_core::ChannelDiagnostic;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct TroubleshootResponse {
    pub status: String,
    pub message: String,
    pub total_channels: usize,
    pub channels: Vec<ChannelDiagnostic>,
    pub tips: Vec<String>,
}

/// GET /troubleshoot
/// Probe every channel and report bus health with wiring hints
pub async fn troubleshoot(State(state): State<AppState>) -> Json<TroubleshootResponse> {
    let report = state.gateway().troubleshoot().await;

    let (status, message) = if report.channels.is_empty() {
        (
            "error".to_string(),
            "No CAN channels found. Check that the device is properly connected.".to_string(),
        )
    } else {
        (
            "success".to_string(),
            format!("Found {} CAN channels", report.channels.len()),
        )
    };

    Json(TroubleshootResponse {
        status,
        message,
        total_channels: report.channels.len(),
        channels: report.channels,
        tips: report.tips,
    })
}
