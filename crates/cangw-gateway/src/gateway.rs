//! Gateway facade
//!
//! The single entry point the HTTP layer calls. Explicitly constructed and
//! passed by handle; no ambient singletons. Raw device failures never leak
//! past this crate; they surface as `GatewayError::Device` with the
//! original diagnostic text.

use std::sync::Arc;
use std::time::Duration;

use cangw_core::{
    BusReport, CanDriver, CapturedFrame, ChannelDiagnostic, ChannelInfo, DeviceError, Frame,
    GatewayError, GatewayResult, SessionStatus,
};
use uuid::Uuid;

use crate::codec::{self, SendMessageInput};
use crate::config::GatewayConfig;
use crate::device::create_driver;
use crate::monitor::{MonitorManager, StopSelector};
use crate::registry::{ChannelOwner, ChannelRegistry};

/// Wiring hints returned with every bus diagnostics report
const TROUBLESHOOT_TIPS: [&str; 5] = [
    "A blinking red light indicates error frames; make sure at least two channels are connected and on bus",
    "Check that bitrates are the same on all channels",
    "Ensure proper termination (60 Ohm) on the CAN bus",
    "Make sure the transmitting channel is in NORMAL mode, not SILENT",
    "If messages are failing, go off and back on bus to clear the transmit buffer",
];

/// The CAN gateway service
pub struct CanGateway {
    driver: Arc<dyn CanDriver>,
    registry: Arc<ChannelRegistry>,
    monitor: Arc<MonitorManager>,
    send_timeout: Duration,
}

impl CanGateway {
    /// Build a gateway with the driver named in the configuration
    pub fn new(config: GatewayConfig) -> Self {
        let driver = create_driver(&config.driver);
        Self::with_driver(config, driver)
    }

    /// Build a gateway around an existing driver (used by tests)
    pub fn with_driver(config: GatewayConfig, driver: Arc<dyn CanDriver>) -> Self {
        let registry = Arc::new(ChannelRegistry::new(
            driver.as_ref(),
            config.default_bitrate,
        ));
        let monitor = Arc::new(MonitorManager::new(
            driver.clone(),
            registry.clone(),
            config.monitor.clone(),
        ));
        Self {
            driver,
            registry,
            monitor,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
        }
    }

    /// Snapshot of all channels, ordered by id
    pub fn list_channels(&self) -> Vec<ChannelInfo> {
        self.registry.list()
    }

    /// Snapshot of one channel
    pub fn channel(&self, id: u32) -> GatewayResult<ChannelInfo> {
        self.registry.get(id)
    }

    /// Validate, frame, and transmit one message
    ///
    /// Claims the channel for the duration of the send, so a send on a
    /// monitored channel reports Conflict. The channel is released on
    /// every path, success or failure.
    pub async fn send_message(&self, input: &SendMessageInput) -> GatewayResult<Frame> {
        let frame = codec::build_frame(input, &self.registry)?;

        self.registry
            .open_exclusive(frame.channel, ChannelOwner::Send)?;
        let result = self.transmit(&frame).await;
        self.registry.close(frame.channel);

        match result {
            Ok(()) => {
                tracing::info!(
                    channel = frame.channel,
                    can_id = frame.can_id,
                    dlc = frame.dlc,
                    data = %hex::encode(&frame.data),
                    "CAN message sent"
                );
                Ok(frame)
            }
            Err(err) => {
                tracing::warn!(channel = frame.channel, error = %err, "Send failed");
                Err(err)
            }
        }
    }

    async fn transmit(&self, frame: &Frame) -> GatewayResult<()> {
        let mut bus = self
            .driver
            .open(frame.channel, frame.bitrate)
            .await
            .map_err(|err| GatewayError::Device(err.to_string()))?;
        self.registry.set_bitrate(frame.channel, frame.bitrate);

        let sent = match tokio::time::timeout(self.send_timeout, bus.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(DeviceError::Timeout)) => Err(GatewayError::TransmitTimeout(
                self.send_timeout.as_millis() as u64,
            )),
            Ok(Err(err)) => Err(GatewayError::Device(err.to_string())),
            Err(_elapsed) => Err(GatewayError::TransmitTimeout(
                self.send_timeout.as_millis() as u64,
            )),
        };

        if let Err(err) = bus.close().await {
            tracing::warn!(channel = frame.channel, error = %err, "Error closing channel");
        }
        sent
    }

    /// Start a monitoring session on a channel
    pub async fn start_monitoring(
        &self,
        channel: u32,
        duration_secs: Option<u64>,
    ) -> GatewayResult<Uuid> {
        self.monitor.start(channel, duration_secs).await
    }

    /// Stop a monitoring session by id or channel; idempotent
    pub async fn stop_monitoring(&self, selector: StopSelector) -> GatewayResult<SessionStatus> {
        self.monitor.stop(selector).await
    }

    /// Buffered frames of a session, non-blocking
    pub fn messages(
        &self,
        session_id: Uuid,
        since: Option<usize>,
    ) -> GatewayResult<Vec<CapturedFrame>> {
        self.monitor.messages(session_id, since)
    }

    /// Status of a monitoring session
    pub fn monitoring_status(&self, session_id: Uuid) -> GatewayResult<SessionStatus> {
        self.monitor.status(session_id)
    }

    /// Probe every channel and report bus health
    ///
    /// Briefly opens and closes each free channel at its last negotiated
    /// bitrate. Channels held by a session or an in-flight send are
    /// reported as busy rather than disturbed. Never fails; per-channel
    /// problems land in the per-channel status text.
    pub async fn troubleshoot(&self) -> BusReport {
        let mut channels = Vec::new();
        for info in self.registry.list() {
            let status = match self.registry.open_exclusive(info.id, ChannelOwner::Send) {
                Err(_) => "Busy: held by a monitoring session or an in-flight send".to_string(),
                Ok(()) => {
                    let probe = match self.driver.open(info.id, info.bitrate).await {
                        Ok(mut bus) => match bus.close().await {
                            Ok(()) => "OK".to_string(),
                            Err(err) => format!("Error: {}", err),
                        },
                        Err(err) => format!("Error: {}", err),
                    };
                    self.registry.close(info.id);
                    probe
                }
            };
            tracing::debug!(channel = info.id, %status, "Channel probed");
            channels.push(ChannelDiagnostic {
                id: info.id,
                name: info.name,
                status,
            });
        }

        BusReport {
            channels,
            tips: TROUBLESHOOT_TIPS.iter().map(|tip| tip.to_string()).collect(),
        }
    }

    /// Cancel all sessions and release all channels
    pub async fn shutdown(&self) {
        tracing::info!("Gateway shutting down");
        self.monitor.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use cangw_core::ChannelState;

    use super::*;
    use crate::config::{MockConfig, MonitorConfig};
    use crate::device::mock::MockCanDriver;

    fn gateway_with_mock(send_timeout_ms: u64) -> (Arc<MockCanDriver>, CanGateway) {
        let driver = Arc::new(MockCanDriver::new(&MockConfig {
            channels: 2,
            latency_ms: 0,
        }));
        let config = GatewayConfig {
            send_timeout_ms,
            monitor: MonitorConfig {
                poll_interval_ms: 20,
                ..MonitorConfig::default()
            },
            ..GatewayConfig::default()
        };
        let gateway = CanGateway::with_driver(config, driver.clone());
        (driver, gateway)
    }

    fn hello_input() -> SendMessageInput {
        SendMessageInput {
            channel: 0,
            can_id: 123,
            dlc: 6,
            byte0: Some(72),
            byte1: Some(69),
            byte2: Some(76),
            byte3: Some(76),
            byte4: Some(79),
            byte5: Some(33),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn send_succeeds_and_releases_channel() {
        let (_driver, gateway) = gateway_with_mock(2000);
        let frame = gateway.send_message(&hello_input()).await.unwrap();
        assert_eq!(frame.data, b"HELLO!".to_vec());
        assert_eq!(gateway.channel(0).unwrap().state, ChannelState::Closed);
    }

    #[tokio::test]
    async fn send_with_short_payload_is_length_mismatch() {
        let (_driver, gateway) = gateway_with_mock(2000);
        let input = SendMessageInput {
            channel: 0,
            can_id: 123,
            dlc: 6,
            data: Some(vec![72, 69, 76, 76, 79]),
            ..Default::default()
        };
        assert!(matches!(
            gateway.send_message(&input).await,
            Err(GatewayError::LengthMismatch { dlc: 6, actual: 5 })
        ));
    }

    #[tokio::test]
    async fn send_on_monitored_channel_conflicts() {
        let (_driver, gateway) = gateway_with_mock(2000);
        let session = gateway.start_monitoring(0, None).await.unwrap();

        assert!(matches!(
            gateway.send_message(&hello_input()).await,
            Err(GatewayError::ChannelBusy(0))
        ));

        gateway
            .stop_monitoring(StopSelector::Session(session))
            .await
            .unwrap();
        // released after stop
        gateway.send_message(&hello_input()).await.unwrap();
    }

    #[tokio::test]
    async fn device_send_failure_surfaces_as_device_error() {
        let (driver, gateway) = gateway_with_mock(2000);
        driver.set_fail_send(true);

        let err = gateway.send_message(&hello_input()).await.err().unwrap();
        assert!(matches!(err, GatewayError::Device(_)));
        assert!(err.to_string().contains("send failure injected"));
        assert_eq!(gateway.channel(0).unwrap().state, ChannelState::Closed);
    }

    #[tokio::test]
    async fn hung_send_times_out() {
        let (driver, gateway) = gateway_with_mock(100);
        driver.set_hang_send(true);

        let err = gateway.send_message(&hello_input()).await.err().unwrap();
        assert!(matches!(err, GatewayError::TransmitTimeout(100)));
        assert_eq!(gateway.channel(0).unwrap().state, ChannelState::Closed);
    }

    #[tokio::test]
    async fn troubleshoot_probes_free_channels_and_skips_busy_ones() {
        let (driver, gateway) = gateway_with_mock(2000);
        let session = gateway.start_monitoring(0, None).await.unwrap();

        let report = gateway.troubleshoot().await;
        assert_eq!(report.channels.len(), 2);
        assert!(report.channels[0].status.starts_with("Busy"));
        assert_eq!(report.channels[1].status, "OK");
        assert!(!report.tips.is_empty());

        // the probe does not disturb the running session
        assert_eq!(
            gateway.monitoring_status(session).unwrap().state,
            cangw_core::SessionState::Running
        );
        gateway
            .stop_monitoring(StopSelector::Session(session))
            .await
            .unwrap();

        driver.set_fail_open(true);
        let report = gateway.troubleshoot().await;
        assert!(report.channels[0].status.starts_with("Error"));
        // probe failures leave the channel released
        assert_eq!(gateway.channel(0).unwrap().state, ChannelState::Closed);
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let (_driver, gateway) = gateway_with_mock(2000);
        gateway.start_monitoring(0, None).await.unwrap();
        gateway.start_monitoring(1, None).await.unwrap();

        gateway.shutdown().await;

        assert_eq!(gateway.channel(0).unwrap().state, ChannelState::Closed);
        assert_eq!(gateway.channel(1).unwrap().state, ChannelState::Closed);
    }
}
