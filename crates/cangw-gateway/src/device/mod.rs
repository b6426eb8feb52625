//! Device drivers
//!
//! Concrete implementations of the [`CanDriver`] trait. Only the mock
//! driver ships in-tree; real hardware drivers plug in behind the same
//! trait.

pub mod mock;

use std::sync::Arc;

use cangw_core::CanDriver;

use crate::config::DriverConfig;

/// Create a driver from configuration
pub fn create_driver(config: &DriverConfig) -> Arc<dyn CanDriver> {
    match config {
        DriverConfig::Mock(cfg) => Arc::new(mock::MockCanDriver::new(cfg)),
    }
}
