//! cangw-gateway - CAN gateway core
//!
//! This crate owns everything between the REST layer and the device driver:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      CanGateway                          │
//! │  Single entry point for the HTTP layer                  │
//! │                                                         │
//! │  ┌──────────────┐  ┌───────────┐  ┌──────────────────┐  │
//! │  │ChannelRegistry│  │FrameCodec │  │ MonitorManager   │  │
//! │  │(exclusivity) │  │(validate) │  │ (capture loops)  │  │
//! │  └──────────────┘  └───────────┘  └──────────────────┘  │
//! │                         │                               │
//! │                  ┌──────┴──────┐                        │
//! │                  │  CanDriver  │                        │
//! │                  │ (mock/etc.) │                        │
//! │                  └─────────────┘                        │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod device;
pub mod gateway;
pub mod monitor;
pub mod registry;

pub use codec::{build_frame, SendMessageInput};
pub use config::{DriverConfig, GatewayConfig, MockConfig, MonitorConfig};
pub use device::create_driver;
pub use gateway::CanGateway;
pub use monitor::{MonitorManager, StopSelector};
pub use registry::{ChannelOwner, ChannelRegistry};

// Re-export for convenience
pub use cangw_core::{
    BusReport, CanBus, CanDriver, CapturedFrame, ChannelDescriptor, ChannelDiagnostic,
    ChannelInfo, ChannelState, DeviceError, Frame, GatewayError, GatewayResult, SessionState,
    SessionStatus,
};
