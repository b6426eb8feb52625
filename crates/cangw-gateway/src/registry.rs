//! Channel registry
//!
//! Enumerates channels once at startup and enforces exclusive-open
//! semantics. Each channel carries its own lock, so operations on distinct
//! channels never contend; two concurrent opens on the same channel race to
//! exactly one winner.

use cangw_core::{
    CanDriver, ChannelDescriptor, ChannelInfo, ChannelState, GatewayError, GatewayResult,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// Who is holding a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOwner {
    /// One-shot send in flight
    Send,
    /// Monitoring session
    Session(Uuid),
}

struct ChannelSlot {
    descriptor: ChannelDescriptor,
    state: Mutex<SlotState>,
}

struct SlotState {
    state: ChannelState,
    bitrate: u32,
    session: Option<Uuid>,
}

/// Tracks per-channel state for the lifetime of the process
pub struct ChannelRegistry {
    slots: Vec<ChannelSlot>,
}

impl ChannelRegistry {
    /// Enumerate channels from the driver and cache them
    pub fn new(driver: &dyn CanDriver, default_bitrate: u32) -> Self {
        let mut slots: Vec<ChannelSlot> = driver
            .channels()
            .into_iter()
            .map(|descriptor| ChannelSlot {
                descriptor,
                state: Mutex::new(SlotState {
                    state: ChannelState::Closed,
                    bitrate: default_bitrate,
                    session: None,
                }),
            })
            .collect();
        slots.sort_by_key(|slot| slot.descriptor.id);

        tracing::info!(channels = slots.len(), "Channel registry initialized");
        Self { slots }
    }

    fn slot(&self, id: u32) -> Option<&ChannelSlot> {
        self.slots.iter().find(|slot| slot.descriptor.id == id)
    }

    fn info(slot: &ChannelSlot) -> ChannelInfo {
        let state = slot.state.lock();
        ChannelInfo {
            id: slot.descriptor.id,
            name: slot.descriptor.name.clone(),
            state: state.state,
            bitrate: state.bitrate,
            session_id: state.session,
            description: format!(
                "{} ({}/{})",
                slot.descriptor.name, slot.descriptor.driver, slot.descriptor.id
            ),
        }
    }

    /// Current snapshot of all channels, ordered by id; never fails
    pub fn list(&self) -> Vec<ChannelInfo> {
        self.slots.iter().map(Self::info).collect()
    }

    /// Snapshot of a single channel
    pub fn get(&self, id: u32) -> GatewayResult<ChannelInfo> {
        self.slot(id)
            .map(Self::info)
            .ok_or(GatewayError::ChannelNotFound(id))
    }

    /// Whether the registry knows this channel id
    pub fn contains(&self, id: u32) -> bool {
        self.slot(id).is_some()
    }

    /// Claim a channel exclusively; Conflict unless it is Closed
    pub fn open_exclusive(&self, id: u32, owner: ChannelOwner) -> GatewayResult<()> {
        let slot = self.slot(id).ok_or(GatewayError::ChannelNotFound(id))?;
        let mut state = slot.state.lock();

        if state.state != ChannelState::Closed {
            return Err(GatewayError::ChannelBusy(id));
        }

        match owner {
            ChannelOwner::Send => {
                state.state = ChannelState::Open;
            }
            ChannelOwner::Session(session_id) => {
                state.state = ChannelState::Busy;
                state.session = Some(session_id);
            }
        }
        Ok(())
    }

    /// Release a channel; idempotent, closing a Closed channel is a no-op
    pub fn close(&self, id: u32) {
        if let Some(slot) = self.slot(id) {
            let mut state = slot.state.lock();
            state.state = ChannelState::Closed;
            state.session = None;
        }
    }

    /// Record the last negotiated bitrate for status reporting
    pub fn set_bitrate(&self, id: u32, bitrate: u32) {
        if let Some(slot) = self.slot(id) {
            slot.state.lock().bitrate = bitrate;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::MockConfig;
    use crate::device::mock::MockCanDriver;

    fn registry(channels: u32) -> ChannelRegistry {
        let driver = MockCanDriver::new(&MockConfig {
            channels,
            latency_ms: 0,
        });
        ChannelRegistry::new(&driver, 250_000)
    }

    #[test]
    fn lists_channels_in_order() {
        let reg = registry(3);
        let ids: Vec<u32> = reg.list().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(reg
            .list()
            .iter()
            .all(|c| c.state == ChannelState::Closed && c.bitrate == 250_000));
    }

    #[test]
    fn unknown_channel_is_not_found() {
        let reg = registry(1);
        assert!(matches!(
            reg.get(7),
            Err(GatewayError::ChannelNotFound(7))
        ));
    }

    #[test]
    fn double_open_conflicts() {
        let reg = registry(1);
        reg.open_exclusive(0, ChannelOwner::Send).unwrap();
        assert!(matches!(
            reg.open_exclusive(0, ChannelOwner::Send),
            Err(GatewayError::ChannelBusy(0))
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let reg = registry(1);
        reg.close(0);
        reg.close(0);
        assert_eq!(reg.get(0).unwrap().state, ChannelState::Closed);

        reg.open_exclusive(0, ChannelOwner::Send).unwrap();
        reg.close(0);
        assert_eq!(reg.get(0).unwrap().state, ChannelState::Closed);
    }

    #[test]
    fn session_owner_marks_channel_busy() {
        let reg = registry(1);
        let session = Uuid::new_v4();
        reg.open_exclusive(0, ChannelOwner::Session(session)).unwrap();

        let info = reg.get(0).unwrap();
        assert_eq!(info.state, ChannelState::Busy);
        assert_eq!(info.session_id, Some(session));

        reg.close(0);
        assert_eq!(reg.get(0).unwrap().session_id, None);
    }

    #[test]
    fn concurrent_opens_have_exactly_one_winner() {
        let reg = Arc::new(registry(1));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let reg = reg.clone();
            handles.push(std::thread::spawn(move || {
                reg.open_exclusive(0, ChannelOwner::Send).is_ok()
            }));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
