//! Domain model: channels, frames, and monitoring sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default bus signaling speed when a request does not supply one
pub const DEFAULT_BITRATE: u32 = 250_000;

/// Bitrates accepted by the frame codec, in bits/second
pub const SUPPORTED_BITRATES: [u32; 4] = [125_000, 250_000, 500_000, 1_000_000];

/// Maximum payload length of a classic CAN frame
pub const MAX_DLC: u8 = 8;

/// Highest standard (11-bit) CAN identifier
pub const MAX_CAN_ID: u16 = 2047;

/// Lifecycle state of a physical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// Not held by anyone; may be opened
    Closed,
    /// Held by an in-flight send
    Open,
    /// Owned by a monitoring session
    Busy,
}

/// Snapshot of one channel as reported by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel number as enumerated by the driver
    pub id: u32,
    /// Driver-reported channel name
    pub name: String,
    pub state: ChannelState,
    /// Last negotiated bitrate in bits/second
    pub bitrate: u32,
    /// Monitoring session currently owning this channel, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Full human-readable description, e.g. "Mock CAN 0 (mock/0)"
    pub description: String,
}

/// A validated, wire-ready outbound CAN frame
///
/// Built exclusively by the frame codec; every field has already passed
/// range validation when a value of this type exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub channel: u32,
    /// Standard 11-bit identifier (0..=2047)
    pub can_id: u16,
    /// Data length code; always equals `data.len()`
    pub dlc: u8,
    pub data: Vec<u8>,
    pub bitrate: u32,
}

/// An inbound frame captured by a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedFrame {
    pub timestamp: DateTime<Utc>,
    /// Source channel
    pub channel: u32,
    pub can_id: u16,
    pub dlc: u8,
    pub data: Vec<u8>,
    /// Driver message flags, e.g. "STD"
    pub flags: String,
}

/// State machine of a monitoring session
///
/// Starting -> Running -> Stopping -> Stopped. A session also reaches
/// Stopped on its own when the requested duration expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Probe result for one channel in a bus diagnostics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDiagnostic {
    pub id: u32,
    pub name: String,
    /// "OK", a busy note, or the driver error text
    pub status: String,
}

/// Bus diagnostics report: per-channel probe results plus wiring hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusReport {
    pub channels: Vec<ChannelDiagnostic>,
    pub tips: Vec<String>,
}

/// Status snapshot of a monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub channel: u32,
    pub state: SessionState,
    /// Frames currently retained in the bounded buffer
    pub stored_messages: usize,
    /// Frames received over the session lifetime, including evicted ones
    pub total_received: u64,
    /// Frames evicted because the buffer was full
    pub overflow_count: u64,
    pub elapsed_seconds: f64,
    pub buffer_capacity: usize,
}
