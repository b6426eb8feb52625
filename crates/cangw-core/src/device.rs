//! Device abstraction traits and types
//!
//! The gateway never talks to CAN hardware directly; it goes through the
//! [`CanDriver`] / [`CanBus`] traits so the core stays independent of any
//! vendor driver. Vendor failures are wrapped as [`DeviceError`] at this
//! boundary with the original diagnostic text preserved.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CapturedFrame, Frame};

/// One physical or virtual channel as enumerated by a driver
#[derive(Debug, Clone)]
pub struct ChannelDescriptor {
    /// Channel number, unique within the driver
    pub id: u32,
    /// Driver-reported channel name
    pub name: String,
    /// Driver identifier, e.g. "mock"
    pub driver: String,
}

/// Errors raised by the device abstraction
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to open channel {channel}: {reason}")]
    OpenFailed { channel: u32, reason: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Channel handle is closed")]
    Closed,

    #[error("Not supported: {0}")]
    Unsupported(String),
}

/// A CAN driver that can enumerate and open channels
#[async_trait]
pub trait CanDriver: Send + Sync {
    /// Enumerate the channels this driver provides
    ///
    /// Called once at registry startup; the channel set is treated as
    /// immutable afterwards (no hot-plug).
    fn channels(&self) -> Vec<ChannelDescriptor>;

    /// Open a channel at the given bitrate and go on bus
    async fn open(&self, channel: u32, bitrate: u32) -> Result<Box<dyn CanBus>, DeviceError>;
}

/// An open handle to one CAN channel
#[async_trait]
pub trait CanBus: Send + Sync {
    /// Transmit a frame and wait for driver acknowledgement
    ///
    /// May block on the driver's synchronous send path; callers apply an
    /// outer timeout.
    async fn send(&mut self, frame: &Frame) -> Result<(), DeviceError>;

    /// Poll for one inbound frame
    ///
    /// Returns `Ok(None)` when nothing arrived within `timeout`; an empty
    /// poll is never an error.
    async fn recv(&mut self, timeout: Duration) -> Result<Option<CapturedFrame>, DeviceError>;

    /// Go off bus and release the handle
    async fn close(&mut self) -> Result<(), DeviceError>;
}
