//! Gateway error taxonomy

use thiserror::Error;

use crate::device::DeviceError;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the gateway facade and its components
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Channel id unknown to the registry (lookup by id)
    #[error("Channel {0} not found")]
    ChannelNotFound(u32),

    /// Monitoring session id unknown
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Request named a channel that does not exist
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// CAN identifier outside the standard 11-bit range
    #[error("Invalid CAN id {0}: must be in 0..=2047")]
    InvalidId(i64),

    /// Data length code outside 0..=8
    #[error("Invalid DLC {0}: must be in 0..=8")]
    InvalidLength(i64),

    /// Resolved payload shorter than the declared DLC
    #[error("Payload has {actual} bytes but DLC is {dlc}")]
    LengthMismatch { dlc: u8, actual: usize },

    /// Payload byte outside 0..=255, with the offending index
    #[error("Invalid byte value {value} at index {index}: must be in 0..=255")]
    InvalidByte { index: usize, value: i64 },

    /// Bitrate not in the supported standard set
    #[error("Unsupported bitrate {0}")]
    InvalidBitrate(i64),

    /// Malformed request shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Exclusivity violation: channel already open or monitored
    #[error("Channel {0} is busy")]
    ChannelBusy(u32),

    /// Underlying driver failure, original diagnostic text preserved
    #[error("Device error: {0}")]
    Device(String),

    /// Send exceeded the configured bound; the caller may retry
    #[error("Transmit timed out after {0} ms")]
    TransmitTimeout(u64),

    /// Unexpected fault; fatal to the request, never silently swallowed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::ChannelNotFound(_) => 404,
            GatewayError::SessionNotFound(_) => 404,
            GatewayError::InvalidChannel(_) => 400,
            GatewayError::InvalidId(_) => 400,
            GatewayError::InvalidLength(_) => 400,
            GatewayError::LengthMismatch { .. } => 400,
            GatewayError::InvalidByte { .. } => 400,
            GatewayError::InvalidBitrate(_) => 400,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::ChannelBusy(_) => 409,
            GatewayError::Device(_) => 502,
            GatewayError::TransmitTimeout(_) => 504,
            GatewayError::Internal(_) => 500,
        }
    }
}

impl From<DeviceError> for GatewayError {
    fn from(err: DeviceError) -> Self {
        GatewayError::Device(err.to_string())
    }
}
