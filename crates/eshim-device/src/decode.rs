//! Value decoders for device replies.
//!
//! A reply's address selects how its 4-byte payload is read: a plain
//! little-endian integer, a channel fault code, or the 32-bit status word.

use std::fmt;

use eshim_frame::{Channel, ChannelRegister, Frame, Register, PAYLOAD_LEN};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Language used when rendering status, coil and fault messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

/// Status bits that carry no message.
pub const RESERVED_STATUS_BITS: [u8; 5] = [14, 19, 20, 21, 23];

/// First bit of the two-bit coil state field (bits 22 and 23).
pub const COIL_STATE_BIT: u8 = 22;

/// Bit → (English, Chinese) message for every flag bit of the status word.
const STATUS_MESSAGES: [(u8, &str, &str); 26] = [
    (0, "running", "运行"),
    (1, "module fault", "模块故障"),
    (2, "main power fault", "主电源故障"),
    (3, "DC bus output inhibited", "直流母线禁止输出"),
    (4, "channel 1 output voltage fault", "通道1输出电压故障"),
    (5, "total power exceeded", "超总功率故障"),
    (6, "channel 1 over-power fault", "通道1超功率故障"),
    (7, "DC bus voltage fault", "直流母线电压故障"),
    (8, "channel 1 command current updated", "通道1指令电流更新"),
    (9, "channel 2 command current updated", "通道2指令电流更新"),
    (10, "channel 3 command current updated", "通道3指令电流更新"),
    (11, "channel 4 command current updated", "通道4指令电流更新"),
    (12, "channel 5 command current updated", "通道5指令电流更新"),
    (13, "harness fault", "线束故障"),
    (15, "over-temperature fault", "过温故障"),
    (16, "current setting not applied", "电流设置未生效"),
    (17, "current fault", "电流故障"),
    (18, "power supply fault", "电源故障"),
    (24, "channel 2 output voltage fault", "通道2输出电压故障"),
    (25, "channel 3 output voltage fault", "通道3输出电压故障"),
    (26, "channel 4 output voltage fault", "通道4输出电压故障"),
    (27, "channel 5 output voltage fault", "通道5输出电压故障"),
    (28, "channel 2 over-power fault", "通道2超功率故障"),
    (29, "channel 3 over-power fault", "通道3超功率故障"),
    (30, "channel 4 over-power fault", "通道4超功率故障"),
    (31, "channel 5 over-power fault", "通道5超功率故障"),
];

/// Alternate labels that share a bit with a primary message. Never emitted.
pub const STATUS_ALIASES: [(u8, &str, &str); 1] = [(
    29,
    "channel 3 over-power supply fault",
    "通道3超功率电源故障",
)];

/// One set flag bit of the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusFlag(u8);

impl StatusFlag {
    /// Bit position in the status word.
    pub fn bit(self) -> u8 {
        self.0
    }

    /// Message for this flag in `locale`.
    pub fn message(self, locale: Locale) -> &'static str {
        STATUS_MESSAGES
            .iter()
            .find(|(bit, _, _)| *bit == self.0)
            .map(|(_, en, zh)| match locale {
                Locale::En => *en,
                Locale::Zh => *zh,
            })
            .unwrap_or_default()
    }
}

/// Electrical mode of the magnet coil, from status bits 22 and 23.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoilState {
    Resistive,
    Idle,
    Supercon,
    NoConnection,
}

impl CoilState {
    /// Decode the field from its two bits, bit 22 first.
    pub fn from_bits(bit22: bool, bit23: bool) -> Self {
        match (bit22, bit23) {
            (false, false) => CoilState::Resistive,
            (false, true) => CoilState::Idle,
            (true, false) => CoilState::Supercon,
            (true, true) => CoilState::NoConnection,
        }
    }

    /// Display label. The device uses the same labels in every locale.
    pub fn label(self) -> &'static str {
        match self {
            CoilState::Resistive => "Resistive",
            CoilState::Idle => "Idle",
            CoilState::Supercon => "Supercon",
            CoilState::NoConnection => "No connection",
        }
    }
}

impl fmt::Display for CoilState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fault latched in a channel error register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelFault {
    OverVoltage,
    OverPower,
    CurrentFault,
}

impl ChannelFault {
    /// Decode the error code byte. Codes other than 1, 2, 3 carry no fault.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ChannelFault::OverVoltage),
            2 => Some(ChannelFault::OverPower),
            3 => Some(ChannelFault::CurrentFault),
            _ => None,
        }
    }

    /// Message for this fault in `locale`.
    pub fn message(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ChannelFault::OverVoltage, Locale::En) => "over-voltage",
            (ChannelFault::OverPower, Locale::En) => "over-power",
            (ChannelFault::CurrentFault, Locale::En) => "current-fault",
            (ChannelFault::OverVoltage, Locale::Zh) => "过压",
            (ChannelFault::OverPower, Locale::Zh) => "过功率",
            (ChannelFault::CurrentFault, Locale::Zh) => "电流错误",
        }
    }
}

/// The decoded status word: set flags plus the coil state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub flags: Vec<StatusFlag>,
    pub coil: CoilState,
}

impl StatusReport {
    /// Decode a status payload as it arrives on the wire (little-endian).
    pub fn from_payload(payload: [u8; PAYLOAD_LEN]) -> Self {
        Self::from_word(u32::from_le_bytes(payload))
    }

    /// Decode a status word. Bit `k` is `(word >> k) & 1`.
    pub fn from_word(word: u32) -> Self {
        let bit = |k: u8| (word >> k) & 1 == 1;
        let coil = CoilState::from_bits(bit(COIL_STATE_BIT), bit(COIL_STATE_BIT + 1));
        let flags = (0..32u8)
            .filter(|k| *k != COIL_STATE_BIT && !RESERVED_STATUS_BITS.contains(k))
            .filter(|k| bit(*k))
            .map(StatusFlag)
            .collect();
        Self { flags, coil }
    }

    /// Flag messages in ascending bit order.
    pub fn messages(&self, locale: Locale) -> Vec<String> {
        self.flags
            .iter()
            .map(|flag| flag.message(locale).to_string())
            .collect()
    }
}

/// A state change carried by one device reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    BusVoltage(i32),
    MaxOutVoltage(i32),
    MaxOutPower(i32),
    MaxTotalPower(i32),
    /// A numeric channel register (set current, actual current, voltage, power).
    ChannelValue(ChannelRegister, Channel, i32),
    ChannelFault(Channel, ChannelFault),
    Status(StatusReport),
}

/// Decode one reply into the state change it carries.
///
/// Returns `None` for unknown addresses, for registers that carry no state
/// (on/off, clear) and for channel error codes without a fault.
pub fn decode(frame: &Frame) -> Option<Update> {
    let Some(register) = frame.register() else {
        debug!(address = frame.address, "reply for unknown address dropped");
        return None;
    };

    let update = match register {
        Register::Channel(ChannelRegister::Error, channel) => {
            ChannelFault::from_code(frame.payload[0]).map(|fault| Update::ChannelFault(channel, fault))
        }
        Register::Channel(kind, channel) => Some(Update::ChannelValue(kind, channel, frame.value())),
        Register::BusVoltage => Some(Update::BusVoltage(frame.value())),
        Register::MaxOutVoltage => Some(Update::MaxOutVoltage(frame.value())),
        Register::MaxOutPower => Some(Update::MaxOutPower(frame.value())),
        Register::MaxTotalPower => Some(Update::MaxTotalPower(frame.value())),
        Register::Status => Some(Update::Status(StatusReport::from_payload(frame.payload))),
        Register::OnOff | Register::Clear => None,
    };

    if update.is_none() {
        debug!(%register, payload = ?frame.payload, "reply carries no state change");
    }
    update
}
