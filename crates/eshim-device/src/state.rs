use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use eshim_frame::{ChannelRegister, Frame, CHANNEL_COUNT};
use tracing::trace;

use crate::decode::{decode, ChannelFault, CoilState, StatusFlag, Update};

/// Last known values reported by the device, plus link flags.
///
/// Every reading starts at zero or empty and is replaced only when a reply
/// for its register is decoded. Nothing expires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub enabled: bool,
    pub connected: bool,
    pub last_error: String,
    pub bus_voltage: i32,
    pub max_out_voltage: i32,
    pub max_out_power: i32,
    pub max_total_power: i32,
    pub ch_set_current: [i32; CHANNEL_COUNT],
    pub ch_act_current: [i32; CHANNEL_COUNT],
    pub ch_voltage: [i32; CHANNEL_COUNT],
    pub ch_power: [i32; CHANNEL_COUNT],
    pub ch_error: [Option<ChannelFault>; CHANNEL_COUNT],
    pub status: Vec<StatusFlag>,
    pub coil: Option<CoilState>,
}

impl DeviceState {
    /// Apply one decoded update.
    pub fn apply(&mut self, update: Update) {
        match update {
            Update::BusVoltage(value) => self.bus_voltage = value,
            Update::MaxOutVoltage(value) => self.max_out_voltage = value,
            Update::MaxOutPower(value) => self.max_out_power = value,
            Update::MaxTotalPower(value) => self.max_total_power = value,
            Update::ChannelValue(kind, channel, value) => {
                let slot = match kind {
                    ChannelRegister::SetCurrent => &mut self.ch_set_current,
                    ChannelRegister::ActCurrent => &mut self.ch_act_current,
                    ChannelRegister::Voltage => &mut self.ch_voltage,
                    ChannelRegister::Power => &mut self.ch_power,
                    ChannelRegister::Error => return,
                };
                slot[channel.index()] = value;
            }
            Update::ChannelFault(channel, fault) => self.ch_error[channel.index()] = Some(fault),
            Update::Status(report) => {
                self.status = report.flags;
                self.coil = Some(report.coil);
            }
        }
    }
}

/// Shared, lock-guarded device state.
///
/// One `RwLock` covers every field, so a snapshot never observes a status
/// list from one reply next to a coil state from another.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<DeviceState>,
}

impl Store {
    /// Create a store with the given `enabled` flag and everything else empty.
    pub fn new(enabled: bool) -> Self {
        Self {
            state: RwLock::new(DeviceState {
                enabled,
                ..DeviceState::default()
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DeviceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DeviceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one decoded update.
    pub fn apply(&self, update: Update) {
        trace!(?update, "applying update");
        self.write().apply(update);
    }

    /// Decode `frame` and apply its update. Returns whether state changed.
    pub fn apply_frame(&self, frame: &Frame) -> bool {
        match decode(frame) {
            Some(update) => {
                self.apply(update);
                true
            }
            None => false,
        }
    }

    /// Decode and apply a batch of replies under a single write guard.
    pub fn apply_frames(&self, frames: &[Frame]) -> usize {
        let updates: Vec<Update> = frames.iter().filter_map(decode).collect();
        let applied = updates.len();
        if applied > 0 {
            let mut state = self.write();
            for update in updates {
                state.apply(update);
            }
        }
        applied
    }

    /// Copy of the whole state.
    pub fn snapshot(&self) -> DeviceState {
        self.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.read().enabled
    }

    pub fn is_connected(&self) -> bool {
        self.read().connected
    }

    pub fn set_connected(&self, connected: bool) {
        self.write().connected = connected;
    }

    /// Record a human-readable transport failure.
    pub fn set_last_error(&self, message: impl Into<String>) {
        self.write().last_error = message.into();
    }

    pub fn last_error(&self) -> String {
        self.read().last_error.clone()
    }
}
