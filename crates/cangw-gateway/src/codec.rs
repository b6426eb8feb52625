//! Frame codec
//!
//! Validates and normalizes an outbound send request into a wire-ready
//! [`Frame`]. Two request shapes are accepted: a legacy ordered `data`
//! array and indexed `byte0..byte7` fields. When both are supplied the
//! indexed bytes win. Validation is fail-fast; the first violation is
//! reported.

use cangw_core::{
    Frame, GatewayError, GatewayResult, DEFAULT_BITRATE, MAX_CAN_ID, MAX_DLC, SUPPORTED_BITRATES,
};
use serde::{Deserialize, Serialize};

use crate::registry::ChannelRegistry;

/// Send request as received from the HTTP layer
///
/// Numeric fields are kept wide so out-of-range values reach the codec and
/// produce the documented error kinds instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageInput {
    pub channel: u32,
    pub can_id: i64,
    #[serde(default)]
    pub dlc: i64,
    /// Legacy format: ordered data bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte0: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte2: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte3: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte4: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte5: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte6: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte7: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<i64>,
}

impl SendMessageInput {
    fn indexed_bytes(&self) -> [Option<i64>; 8] {
        [
            self.byte0, self.byte1, self.byte2, self.byte3, self.byte4, self.byte5, self.byte6,
            self.byte7,
        ]
    }

    fn has_indexed_bytes(&self) -> bool {
        self.indexed_bytes().iter().any(Option::is_some)
    }
}

/// Validate a send request and build the frame
///
/// Pure function of the input and the (immutable) channel set; no side
/// effects. Checks run in a fixed order: channel, CAN id, DLC, payload
/// length, payload bytes, bitrate.
pub fn build_frame(input: &SendMessageInput, registry: &ChannelRegistry) -> GatewayResult<Frame> {
    if !registry.contains(input.channel) {
        return Err(GatewayError::InvalidChannel(format!(
            "channel {} does not exist",
            input.channel
        )));
    }

    if input.can_id < 0 || input.can_id > MAX_CAN_ID as i64 {
        return Err(GatewayError::InvalidId(input.can_id));
    }

    if input.dlc < 0 || input.dlc > MAX_DLC as i64 {
        return Err(GatewayError::InvalidLength(input.dlc));
    }
    let dlc = input.dlc as usize;

    // Indexed bytes take precedence over the legacy array; unsupplied
    // indexed bytes default to zero, so only the legacy path can come up
    // short of the DLC.
    let raw: Vec<i64> = if input.has_indexed_bytes() {
        input
            .indexed_bytes()
            .iter()
            .take(dlc)
            .map(|b| b.unwrap_or(0))
            .collect()
    } else {
        let data = input.data.as_deref().unwrap_or(&[]);
        if data.len() < dlc {
            return Err(GatewayError::LengthMismatch {
                dlc: dlc as u8,
                actual: data.len(),
            });
        }
        data[..dlc].to_vec()
    };

    let mut payload = Vec::with_capacity(dlc);
    for (index, &value) in raw.iter().enumerate() {
        if !(0..=255).contains(&value) {
            return Err(GatewayError::InvalidByte { index, value });
        }
        payload.push(value as u8);
    }

    let bitrate = input.bitrate.unwrap_or(DEFAULT_BITRATE as i64);
    if !SUPPORTED_BITRATES.iter().any(|&b| b as i64 == bitrate) {
        return Err(GatewayError::InvalidBitrate(bitrate));
    }

    Ok(Frame {
        channel: input.channel,
        can_id: input.can_id as u16,
        dlc: dlc as u8,
        data: payload,
        bitrate: bitrate as u32,
    })
}
