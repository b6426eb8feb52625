//! Application state for the gateway API

use std::sync::Arc;

use cangw_gateway::CanGateway;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<CanGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<CanGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &CanGateway {
        &self.gateway
    }
}
