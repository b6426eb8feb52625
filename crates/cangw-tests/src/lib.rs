//! Integration tests for the CAN gateway
//!
//! This crate contains end-to-end tests that exercise the full stack:
//! - HTTP API layer (axum router over real sockets)
//! - Gateway facade, registry, codec, monitoring sessions
//! - Mock CAN driver
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cangw-tests
//! ```
//!
//! Each test binds its own ephemeral port, so tests run in parallel.
//!
//! # Test Structure
//!
//! - `gateway_e2e_test.rs` - Facade-level tests against the mock driver
//! - `api_integration_test.rs` - REST API tests over real HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use cangw_api::{create_router, AppState};
use cangw_gateway::device::mock::MockCanDriver;
use cangw_gateway::{CanGateway, GatewayConfig, MockConfig, MonitorConfig};

/// A gateway server on an ephemeral port with a handle to the mock driver
pub struct TestServer {
    pub addr: SocketAddr,
    pub gateway: Arc<CanGateway>,
    pub driver: Arc<MockCanDriver>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Spawn a server with default test configuration (2 mock channels)
    pub async fn spawn() -> Self {
        Self::spawn_with(GatewayConfig {
            monitor: MonitorConfig {
                poll_interval_ms: 20,
                ..MonitorConfig::default()
            },
            ..GatewayConfig::default()
        })
        .await
    }

    pub async fn spawn_with(config: GatewayConfig) -> Self {
        let cangw_gateway::DriverConfig::Mock(mock_config) = config.driver.clone();
        let driver = Arc::new(MockCanDriver::new(&MockConfig {
            channels: mock_config.channels,
            latency_ms: mock_config.latency_ms,
        }));

        let gateway = Arc::new(CanGateway::with_driver(config, driver.clone()));
        let app = create_router(AppState::new(gateway.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server");
        });

        Self {
            addr,
            gateway,
            driver,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}
