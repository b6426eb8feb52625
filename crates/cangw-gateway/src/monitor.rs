//! Monitoring session manager
//!
//! One background capture task per session. A session owns its channel
//! exclusively for its lifetime, buffers inbound frames in a bounded ring
//! (drop-oldest, counted, never silent) and stops on explicit request or
//! when its duration elapses. Cancellation is signalled through a watch
//! channel and observed at least once per poll interval.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cangw_core::{
    CanBus, CanDriver, CapturedFrame, GatewayError, GatewayResult, SessionState, SessionStatus,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::registry::{ChannelOwner, ChannelRegistry};

/// How a stop request addresses its target
#[derive(Debug, Clone, Copy)]
pub enum StopSelector {
    Session(Uuid),
    Channel(u32),
}

struct MonitorSession {
    id: Uuid,
    channel: u32,
    started: Instant,
    capacity: usize,
    stop_tx: watch::Sender<bool>,
    /// Flipped by the capture task after the device handle is closed
    done_rx: watch::Receiver<bool>,
    inner: Mutex<SessionInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct SessionInner {
    state: SessionState,
    buffer: VecDeque<CapturedFrame>,
    total: u64,
    overflow: u64,
    stopped_at: Option<Instant>,
}

impl MonitorSession {
    fn new(
        id: Uuid,
        channel: u32,
        capacity: usize,
        stop_tx: watch::Sender<bool>,
        done_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            channel,
            started: Instant::now(),
            capacity,
            stop_tx,
            done_rx,
            inner: Mutex::new(SessionInner {
                state: SessionState::Starting,
                buffer: VecDeque::with_capacity(capacity),
                total: 0,
                overflow: 0,
                stopped_at: None,
            }),
            task: Mutex::new(None),
        }
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn set_state(&self, state: SessionState) {
        self.inner.lock().state = state;
    }

    /// Append a frame, evicting the oldest when the buffer is full
    fn push(&self, frame: CapturedFrame) {
        let mut inner = self.inner.lock();
        if inner.buffer.len() >= self.capacity {
            inner.buffer.pop_front();
            inner.overflow += 1;
        }
        tracing::debug!(
            session = %self.id,
            can_id = frame.can_id,
            data = %hex::encode(&frame.data),
            "Frame captured"
        );
        inner.buffer.push_back(frame);
        inner.total += 1;
    }

    /// Mark the session Stopped; buffer stays readable
    fn finish(&self) {
        let mut inner = self.inner.lock();
        inner.state = SessionState::Stopped;
        if inner.stopped_at.is_none() {
            inner.stopped_at = Some(Instant::now());
        }
    }

    fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        let elapsed = match inner.stopped_at {
            Some(stopped) => stopped - self.started,
            None => self.started.elapsed(),
        };
        SessionStatus {
            session_id: self.id,
            channel: self.channel,
            state: inner.state,
            stored_messages: inner.buffer.len(),
            total_received: inner.total,
            overflow_count: inner.overflow,
            elapsed_seconds: elapsed.as_secs_f64(),
            buffer_capacity: self.capacity,
        }
    }
}

/// Owns all monitoring sessions and their capture tasks
pub struct MonitorManager {
    driver: Arc<dyn CanDriver>,
    registry: Arc<ChannelRegistry>,
    config: MonitorConfig,
    sessions: RwLock<HashMap<Uuid, Arc<MonitorSession>>>,
    /// Latest session per channel, also used for stop-by-channel
    by_channel: RwLock<HashMap<u32, Uuid>>,
}

impl MonitorManager {
    pub fn new(
        driver: Arc<dyn CanDriver>,
        registry: Arc<ChannelRegistry>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            driver,
            registry,
            config,
            sessions: RwLock::new(HashMap::new()),
            by_channel: RwLock::new(HashMap::new()),
        }
    }

    /// Start a capture session on a channel
    ///
    /// Claims the channel exclusively (Conflict for a concurrent loser),
    /// opens the device, then spawns the capture loop. A new start on a
    /// channel discards the previous, stopped session of that channel.
    pub async fn start(&self, channel: u32, duration_secs: Option<u64>) -> GatewayResult<Uuid> {
        if !self.registry.contains(channel) {
            return Err(GatewayError::InvalidChannel(format!(
                "channel {} does not exist",
                channel
            )));
        }

        let duration = duration_secs
            .map(|secs| Duration::from_secs(secs.clamp(1, self.config.max_duration_secs.max(1))));

        let id = Uuid::new_v4();
        self.registry
            .open_exclusive(channel, ChannelOwner::Session(id))?;

        let bitrate = match self.registry.get(channel) {
            Ok(info) => info.bitrate,
            Err(err) => {
                self.registry.close(channel);
                return Err(err);
            }
        };

        let bus = match self.driver.open(channel, bitrate).await {
            Ok(bus) => bus,
            Err(err) => {
                self.registry.close(channel);
                return Err(GatewayError::Device(err.to_string()));
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let session = Arc::new(MonitorSession::new(
            id,
            channel,
            self.config.buffer_capacity,
            stop_tx,
            done_rx,
        ));

        {
            let mut sessions = self.sessions.write();
            let mut by_channel = self.by_channel.write();
            if let Some(previous) = by_channel.insert(channel, id) {
                sessions.remove(&previous);
            }
            sessions.insert(id, session.clone());
        }

        let deadline = duration.map(|d| Instant::now() + d);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let registry = self.registry.clone();
        let task_session = session.clone();
        let handle = tokio::spawn(async move {
            capture_loop(task_session, bus, registry, stop_rx, poll, deadline).await;
            let _ = done_tx.send(true);
        });
        *session.task.lock() = Some(handle);

        tracing::info!(
            session = %id,
            channel,
            duration_secs = ?duration.map(|d| d.as_secs()),
            "Monitoring session started"
        );
        Ok(id)
    }

    /// Stop a session; idempotent
    ///
    /// Does not return before the capture loop has closed the device
    /// handle, up to the configured grace period; a loop that fails to
    /// drain in time is aborted and the channel released here. Concurrent
    /// stop calls all wait on the loop's completion signal, so none of
    /// them returns with the device handle still open.
    pub async fn stop(&self, selector: StopSelector) -> GatewayResult<SessionStatus> {
        let session = self.resolve(selector)?;

        if session.state() == SessionState::Stopped {
            return Ok(session.status());
        }

        let _ = session.stop_tx.send(true);

        let grace = Duration::from_millis(self.config.stop_grace_ms);
        let mut done_rx = session.done_rx.clone();
        let drained = tokio::time::timeout(grace, async {
            loop {
                if *done_rx.borrow_and_update() {
                    break;
                }
                // Err means the sender is gone: the task was aborted and
                // cleaned up by another stopper.
                if done_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                session = %session.id,
                "Capture loop did not drain within grace period, aborting"
            );
            if let Some(handle) = session.task.lock().take() {
                handle.abort();
            }
            self.registry.close(session.channel);
            session.finish();
        }

        Ok(session.status())
    }

    /// Snapshot buffered frames without blocking
    ///
    /// `since` skips the first N frames of the retained window for
    /// incremental polling.
    pub fn messages(
        &self,
        session_id: Uuid,
        since: Option<usize>,
    ) -> GatewayResult<Vec<CapturedFrame>> {
        let session = self.session(session_id)?;
        let inner = session.inner.lock();
        Ok(inner
            .buffer
            .iter()
            .skip(since.unwrap_or(0))
            .cloned()
            .collect())
    }

    pub fn status(&self, session_id: Uuid) -> GatewayResult<SessionStatus> {
        Ok(self.session(session_id)?.status())
    }

    /// Stop every session; called at process shutdown
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.sessions.read().keys().copied().collect();
        for id in ids {
            match self.stop(StopSelector::Session(id)).await {
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(session = %id, error = %err, "Error stopping session")
                }
            }
        }
        tracing::info!("All monitoring sessions stopped");
    }

    fn session(&self, id: Uuid) -> GatewayResult<Arc<MonitorSession>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound(id.to_string()))
    }

    fn resolve(&self, selector: StopSelector) -> GatewayResult<Arc<MonitorSession>> {
        match selector {
            StopSelector::Session(id) => self.session(id),
            StopSelector::Channel(channel) => {
                let id = self.by_channel.read().get(&channel).copied().ok_or_else(|| {
                    GatewayError::SessionNotFound(format!(
                        "no monitoring session for channel {}",
                        channel
                    ))
                })?;
                self.session(id)
            }
        }
    }
}

/// Per-session capture loop
///
/// The poll receive is the suspension point; the stop signal and the
/// deadline are both checked once per iteration, so cancellation takes
/// effect within one poll interval. Receive errors are logged and retried
/// after a short backoff, never fatal to the session.
async fn capture_loop(
    session: Arc<MonitorSession>,
    mut bus: Box<dyn CanBus>,
    registry: Arc<ChannelRegistry>,
    stop_rx: watch::Receiver<bool>,
    poll: Duration,
    deadline: Option<Instant>,
) {
    session.set_state(SessionState::Running);

    loop {
        if *stop_rx.borrow() {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!(session = %session.id, "Monitoring duration elapsed");
            break;
        }

        match bus.recv(poll).await {
            Ok(Some(frame)) => session.push(frame),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(session = %session.id, error = %err, "Receive error, retrying");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    session.set_state(SessionState::Stopping);
    if let Err(err) = bus.close().await {
        tracing::warn!(session = %session.id, error = %err, "Error closing channel");
    }
    registry.close(session.channel);
    session.finish();

    let status = session.status();
    tracing::info!(
        session = %session.id,
        channel = session.channel,
        received = status.total_received,
        overflow = status.overflow_count,
        "Monitoring session stopped"
    );
}

#[cfg(test)]
mod tests {
    use cangw_core::ChannelState;

    use super::*;
    use crate::config::MockConfig;
    use crate::device::mock::MockCanDriver;

    fn setup(capacity: usize) -> (Arc<MockCanDriver>, Arc<ChannelRegistry>, Arc<MonitorManager>) {
        let driver = Arc::new(MockCanDriver::new(&MockConfig {
            channels: 2,
            latency_ms: 0,
        }));
        let registry = Arc::new(ChannelRegistry::new(driver.as_ref(), 250_000));
        let config = MonitorConfig {
            buffer_capacity: capacity,
            poll_interval_ms: 20,
            max_duration_secs: 300,
            stop_grace_ms: 1000,
        };
        let manager = Arc::new(MonitorManager::new(
            driver.clone() as Arc<dyn CanDriver>,
            registry.clone(),
            config,
        ));
        (driver, registry, manager)
    }

    async fn wait_for_total(manager: &MonitorManager, id: Uuid, expected: u64) {
        for _ in 0..100 {
            if manager.status(id).unwrap().total_received >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "session never received {} frames, got {}",
            expected,
            manager.status(id).unwrap().total_received
        );
    }

    #[tokio::test]
    async fn captures_injected_frames() {
        let (driver, _registry, manager) = setup(100);
        let id = manager.start(0, None).await.unwrap();

        driver.inject(0, 0x100, &[1]);
        driver.inject(0, 0x101, &[2, 3]);
        wait_for_total(&manager, id, 2).await;

        let frames = manager.messages(id, None).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].can_id, 0x100);
        assert_eq!(frames[1].can_id, 0x101);

        // incremental polling skips already-seen frames
        let rest = manager.messages(id, Some(1)).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].can_id, 0x101);

        manager.stop(StopSelector::Session(id)).await.unwrap();
    }

    #[tokio::test]
    async fn buffer_overflow_evicts_oldest_and_counts() {
        let (driver, _registry, manager) = setup(5);
        let id = manager.start(0, None).await.unwrap();

        for i in 0..8u16 {
            driver.inject(0, 0x200 + i, &[i as u8]);
        }
        wait_for_total(&manager, id, 8).await;

        let status = manager.status(id).unwrap();
        assert_eq!(status.stored_messages, 5);
        assert_eq!(status.total_received, 8);
        assert_eq!(status.overflow_count, 3);

        // newest 5 retained
        let frames = manager.messages(id, None).unwrap();
        let ids: Vec<u16> = frames.iter().map(|f| f.can_id).collect();
        assert_eq!(ids, vec![0x203, 0x204, 0x205, 0x206, 0x207]);

        manager.stop(StopSelector::Session(id)).await.unwrap();
    }

    #[tokio::test]
    async fn stop_releases_channel_and_is_idempotent() {
        let (_driver, registry, manager) = setup(10);
        let id = manager.start(0, None).await.unwrap();
        assert_eq!(registry.get(0).unwrap().state, ChannelState::Busy);

        let status = manager.stop(StopSelector::Session(id)).await.unwrap();
        assert_eq!(status.state, SessionState::Stopped);
        // channel is released by the time stop returns
        assert_eq!(registry.get(0).unwrap().state, ChannelState::Closed);

        // second stop is a no-op returning current status
        let again = manager.stop(StopSelector::Session(id)).await.unwrap();
        assert_eq!(again.state, SessionState::Stopped);
    }

    #[tokio::test]
    async fn stop_by_channel_resolves_active_session() {
        let (_driver, _registry, manager) = setup(10);
        let id = manager.start(1, None).await.unwrap();

        let status = manager.stop(StopSelector::Channel(1)).await.unwrap();
        assert_eq!(status.session_id, id);
        assert_eq!(status.state, SessionState::Stopped);

        assert!(matches!(
            manager.stop(StopSelector::Channel(0)).await,
            Err(GatewayError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_stops_all_wait_for_drain() {
        let (_driver, registry, manager) = setup(10);
        let id = manager.start(0, None).await.unwrap();

        let (a, b) = tokio::join!(
            manager.stop(StopSelector::Session(id)),
            manager.stop(StopSelector::Session(id))
        );
        // neither stop returns before the loop has released the channel
        assert_eq!(a.unwrap().state, SessionState::Stopped);
        assert_eq!(b.unwrap().state, SessionState::Stopped);
        assert_eq!(registry.get(0).unwrap().state, ChannelState::Closed);
    }

    #[tokio::test]
    async fn zero_max_duration_config_does_not_panic() {
        let (_driver, _registry, manager) = {
            let driver = Arc::new(MockCanDriver::new(&MockConfig {
                channels: 1,
                latency_ms: 0,
            }));
            let registry = Arc::new(ChannelRegistry::new(driver.as_ref(), 250_000));
            let config = MonitorConfig {
                buffer_capacity: 10,
                poll_interval_ms: 20,
                max_duration_secs: 0,
                stop_grace_ms: 1000,
            };
            let manager = Arc::new(MonitorManager::new(
                driver.clone() as Arc<dyn CanDriver>,
                registry.clone(),
                config,
            ));
            (driver, registry, manager)
        };

        // duration is clamped to at least one second instead of panicking
        let id = manager.start(0, Some(5)).await.unwrap();
        manager.stop(StopSelector::Session(id)).await.unwrap();
    }

    #[tokio::test]
    async fn duration_expiry_stops_and_closes_channel() {
        let (_driver, registry, manager) = setup(10);
        let id = manager.start(0, Some(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1400)).await;

        let status = manager.status(id).unwrap();
        assert_eq!(status.state, SessionState::Stopped);
        assert_eq!(registry.get(0).unwrap().state, ChannelState::Closed);
        assert!(status.elapsed_seconds >= 1.0);
    }

    #[tokio::test]
    async fn concurrent_starts_have_exactly_one_winner() {
        let (_driver, _registry, manager) = setup(10);

        let mut handles = Vec::new();
        for _ in 0..100 {
            let manager = manager.clone();
            handles.push(tokio::spawn(
                async move { manager.start(0, None).await },
            ));
        }

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(GatewayError::ChannelBusy(0)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 99);
    }

    #[tokio::test]
    async fn new_start_clears_previous_session() {
        let (driver, _registry, manager) = setup(10);
        let first = manager.start(0, None).await.unwrap();
        driver.inject(0, 0x1, &[1]);
        wait_for_total(&manager, first, 1).await;
        manager.stop(StopSelector::Session(first)).await.unwrap();

        // buffer still readable after stop
        assert_eq!(manager.messages(first, None).unwrap().len(), 1);

        let second = manager.start(0, None).await.unwrap();
        assert_ne!(first, second);
        // previous session is discarded by the new start
        assert!(matches!(
            manager.messages(first, None),
            Err(GatewayError::SessionNotFound(_))
        ));
        assert_eq!(manager.messages(second, None).unwrap().len(), 0);

        manager.stop(StopSelector::Session(second)).await.unwrap();
    }

    #[tokio::test]
    async fn open_failure_releases_channel() {
        let (driver, registry, manager) = setup(10);
        driver.set_fail_open(true);

        let err = manager.start(0, None).await.err().expect("error");
        assert!(matches!(err, GatewayError::Device(_)));
        assert_eq!(registry.get(0).unwrap().state, ChannelState::Closed);

        driver.set_fail_open(false);
        let id = manager.start(0, None).await.unwrap();
        manager.stop(StopSelector::Session(id)).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_channel_is_invalid() {
        let (_driver, _registry, manager) = setup(10);
        assert!(matches!(
            manager.start(42, None).await,
            Err(GatewayError::InvalidChannel(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_all_sessions() {
        let (_driver, registry, manager) = setup(10);
        let a = manager.start(0, None).await.unwrap();
        let b = manager.start(1, None).await.unwrap();

        manager.shutdown().await;

        assert_eq!(manager.status(a).unwrap().state, SessionState::Stopped);
        assert_eq!(manager.status(b).unwrap().state, SessionState::Stopped);
        assert_eq!(registry.get(0).unwrap().state, ChannelState::Closed);
        assert_eq!(registry.get(1).unwrap().state, ChannelState::Closed);
    }
}
