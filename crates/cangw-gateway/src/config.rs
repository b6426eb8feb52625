//! Gateway configuration
//!
//! Loaded from the daemon's TOML config file; every field has a default so
//! the gateway runs out of the box against the mock driver.

use serde::{Deserialize, Serialize};

/// Configuration for the gateway facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Device driver selection
    #[serde(default)]
    pub driver: DriverConfig,
    /// Monitoring session settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Upper bound on a single send, in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Bitrate assumed when a request does not supply one
    #[serde(default = "default_bitrate")]
    pub default_bitrate: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            monitor: MonitorConfig::default(),
            send_timeout_ms: default_send_timeout_ms(),
            default_bitrate: default_bitrate(),
        }
    }
}

/// Device driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DriverConfig {
    /// In-process virtual channels for development and testing
    Mock(MockConfig),
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig::Mock(MockConfig::default())
    }
}

/// Mock driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Number of virtual channels to enumerate
    #[serde(default = "default_mock_channels")]
    pub channels: u32,
    /// Simulated per-operation latency
    #[serde(default)]
    pub latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            channels: default_mock_channels(),
            latency_ms: 0,
        }
    }
}

/// Monitoring session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Ring buffer capacity per session; oldest frames are evicted on overflow
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Receive poll timeout; cancellation is observed at least this often
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Longest duration a caller may request, in seconds
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// How long stop waits for a capture loop to drain before aborting it
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            max_duration_secs: default_max_duration_secs(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

fn default_send_timeout_ms() -> u64 {
    2000
}

fn default_bitrate() -> u32 {
    cangw_core::DEFAULT_BITRATE
}

fn default_mock_channels() -> u32 {
    2
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_duration_secs() -> u64 {
    300
}

fn default_stop_grace_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.send_timeout_ms, 2000);
        assert_eq!(config.default_bitrate, 250_000);
        assert_eq!(config.monitor.buffer_capacity, 1000);
        assert_eq!(config.monitor.poll_interval_ms, 100);
        let DriverConfig::Mock(mock) = &config.driver;
        assert_eq!(mock.channels, 2);
    }

    #[test]
    fn parses_partial_toml() {
        let toml = r#"
            send_timeout_ms = 500

            [driver]
            type = "mock"
            channels = 4

            [monitor]
            buffer_capacity = 10
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.send_timeout_ms, 500);
        assert_eq!(config.monitor.buffer_capacity, 10);
        assert_eq!(config.monitor.poll_interval_ms, 100);
        let DriverConfig::Mock(mock) = &config.driver;
        assert_eq!(mock.channels, 4);
        assert_eq!(mock.latency_ms, 0);
    }
}
