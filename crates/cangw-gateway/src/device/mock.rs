//! Mock CAN driver for development and testing
//!
//! Provides a configurable number of virtual channels. Inbound traffic is
//! injected with [`MockCanDriver::inject`]; failure toggles let tests drive
//! the DeviceError and TransmitTimeout paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cangw_core::{CanBus, CanDriver, CapturedFrame, ChannelDescriptor, DeviceError, Frame};
use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::MockConfig;

/// How long a hung send sleeps; long enough to trip any caller timeout
const HANG_SEND: Duration = Duration::from_secs(60);

struct MockShared {
    latency_ms: u64,
    /// One inbound feed per channel
    feeds: Vec<broadcast::Sender<CapturedFrame>>,
    fail_open: AtomicBool,
    fail_send: AtomicBool,
    hang_send: AtomicBool,
    /// Echo sent frames back onto the channel's feed (self-reception)
    local_echo: AtomicBool,
}

/// Mock CAN driver with virtual channels
pub struct MockCanDriver {
    channels: Vec<ChannelDescriptor>,
    shared: Arc<MockShared>,
}

impl MockCanDriver {
    pub fn new(config: &MockConfig) -> Self {
        let channels = (0..config.channels)
            .map(|id| ChannelDescriptor {
                id,
                name: format!("Mock CAN {}", id),
                driver: "mock".to_string(),
            })
            .collect();

        let feeds = (0..config.channels)
            .map(|_| broadcast::channel(256).0)
            .collect();

        Self {
            channels,
            shared: Arc::new(MockShared {
                latency_ms: config.latency_ms,
                feeds,
                fail_open: AtomicBool::new(false),
                fail_send: AtomicBool::new(false),
                hang_send: AtomicBool::new(false),
                local_echo: AtomicBool::new(false),
            }),
        }
    }

    /// Inject an inbound frame on a channel (simulates bus traffic)
    ///
    /// Delivered to every handle currently open on that channel; dropped
    /// silently if the channel is unknown or nothing is listening.
    pub fn inject(&self, channel: u32, can_id: u16, data: &[u8]) {
        if let Some(feed) = self.shared.feeds.get(channel as usize) {
            let frame = CapturedFrame {
                timestamp: Utc::now(),
                channel,
                can_id,
                dlc: data.len() as u8,
                data: data.to_vec(),
                flags: "STD".to_string(),
            };
            let _ = feed.send(frame);
        }
    }

    /// Make subsequent opens fail with OpenFailed
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent sends fail with SendFailed
    pub fn set_fail_send(&self, fail: bool) {
        self.shared.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent sends hang past any caller timeout
    pub fn set_hang_send(&self, hang: bool) {
        self.shared.hang_send.store(hang, Ordering::SeqCst);
    }

    /// Echo sent frames back to receivers on the same channel
    pub fn set_local_echo(&self, echo: bool) {
        self.shared.local_echo.store(echo, Ordering::SeqCst);
    }
}

#[async_trait]
impl CanDriver for MockCanDriver {
    fn channels(&self) -> Vec<ChannelDescriptor> {
        self.channels.clone()
    }

    async fn open(&self, channel: u32, bitrate: u32) -> Result<Box<dyn CanBus>, DeviceError> {
        if self.shared.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.shared.latency_ms)).await;
        }

        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(DeviceError::OpenFailed {
                channel,
                reason: "open failure injected".to_string(),
            });
        }

        let feed = self
            .shared
            .feeds
            .get(channel as usize)
            .ok_or(DeviceError::OpenFailed {
                channel,
                reason: "no such channel".to_string(),
            })?;

        tracing::debug!(channel, bitrate, "Mock channel opened");

        Ok(Box::new(MockBus {
            channel,
            rx: feed.subscribe(),
            shared: self.shared.clone(),
            open: true,
        }))
    }
}

struct MockBus {
    channel: u32,
    rx: broadcast::Receiver<CapturedFrame>,
    shared: Arc<MockShared>,
    open: bool,
}

#[async_trait]
impl CanBus for MockBus {
    async fn send(&mut self, frame: &Frame) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::Closed);
        }

        if self.shared.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.shared.latency_ms)).await;
        }

        if self.shared.hang_send.load(Ordering::SeqCst) {
            tokio::time::sleep(HANG_SEND).await;
            return Err(DeviceError::Timeout);
        }

        if self.shared.fail_send.load(Ordering::SeqCst) {
            return Err(DeviceError::SendFailed(
                "send failure injected".to_string(),
            ));
        }

        tracing::debug!(
            channel = self.channel,
            can_id = frame.can_id,
            data = %hex::encode(&frame.data),
            "Mock transmit"
        );

        if self.shared.local_echo.load(Ordering::SeqCst) {
            if let Some(feed) = self.shared.feeds.get(self.channel as usize) {
                let _ = feed.send(CapturedFrame {
                    timestamp: Utc::now(),
                    channel: self.channel,
                    can_id: frame.can_id,
                    dlc: frame.dlc,
                    data: frame.data.clone(),
                    flags: "STD,TXECHO".to_string(),
                });
            }
        }

        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Option<CapturedFrame>, DeviceError> {
        if !self.open {
            return Err(DeviceError::Closed);
        }

        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                tracing::warn!(channel = self.channel, skipped, "Mock receiver lagged");
                Ok(None)
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.open = false;
        tracing::debug!(channel = self.channel, "Mock channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(channels: u32) -> MockCanDriver {
        MockCanDriver::new(&MockConfig {
            channels,
            latency_ms: 0,
        })
    }

    #[tokio::test]
    async fn injected_frames_are_received() {
        let drv = driver(1);
        let mut bus = drv.open(0, 250_000).await.unwrap();

        drv.inject(0, 0x123, &[1, 2, 3]);
        let frame = bus
            .recv(Duration::from_millis(100))
            .await
            .unwrap()
            .expect("frame");
        assert_eq!(frame.can_id, 0x123);
        assert_eq!(frame.data, vec![1, 2, 3]);
        assert_eq!(frame.dlc, 3);
    }

    #[tokio::test]
    async fn empty_poll_returns_none() {
        let drv = driver(1);
        let mut bus = drv.open(0, 250_000).await.unwrap();
        let got = bus.recv(Duration::from_millis(10)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn open_unknown_channel_fails() {
        let drv = driver(1);
        let err = drv.open(5, 250_000).await.err().expect("error");
        assert!(matches!(err, DeviceError::OpenFailed { channel: 5, .. }));
    }

    #[tokio::test]
    async fn local_echo_loops_sent_frames_back() {
        let drv = driver(1);
        drv.set_local_echo(true);
        let mut bus = drv.open(0, 250_000).await.unwrap();

        let frame = Frame {
            channel: 0,
            can_id: 7,
            dlc: 2,
            data: vec![0xAA, 0xBB],
            bitrate: 250_000,
        };
        bus.send(&frame).await.unwrap();

        let echoed = bus
            .recv(Duration::from_millis(100))
            .await
            .unwrap()
            .expect("echo");
        assert_eq!(echoed.can_id, 7);
        assert_eq!(echoed.data, vec![0xAA, 0xBB]);
        assert!(echoed.flags.contains("TXECHO"));
    }

    #[tokio::test]
    async fn closed_handle_rejects_io() {
        let drv = driver(1);
        let mut bus = drv.open(0, 250_000).await.unwrap();
        bus.close().await.unwrap();
        let err = bus.recv(Duration::from_millis(10)).await.err().unwrap();
        assert!(matches!(err, DeviceError::Closed));
    }
}
