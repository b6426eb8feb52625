//! cangw-core - Core types for the CAN gateway service
//!
//! This crate provides the domain model (channels, frames, monitoring
//! sessions), the gateway error taxonomy, and the device abstraction traits
//! that concrete CAN drivers implement.

pub mod device;
pub mod error;
pub mod models;

pub use device::{CanBus, CanDriver, ChannelDescriptor, DeviceError};
pub use error::{GatewayError, GatewayResult};
pub use models::*;
