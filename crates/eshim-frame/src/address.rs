//! Register address table.
//!
//! Every register the device exposes has exactly one address byte. Channel
//! registers occupy six consecutive addresses starting at a per-register
//! base; scalar registers have fixed addresses. Both directions (register to
//! byte, byte to register) go through the tables below.

use std::fmt;

/// Number of output channels on the device.
pub const CHANNEL_COUNT: usize = 6;

/// An output channel, numbered 1 through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    /// All channels in ascending order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel(1),
        Channel(2),
        Channel(3),
        Channel(4),
        Channel(5),
        Channel(6),
    ];

    /// Returns `None` unless `number` is in `1..=6`.
    pub fn new(number: u8) -> Option<Self> {
        (1..=CHANNEL_COUNT as u8)
            .contains(&number)
            .then_some(Self(number))
    }

    /// One-based channel number.
    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based index into per-channel arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Per-channel register kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRegister {
    SetCurrent,
    ActCurrent,
    Error,
    Voltage,
    Power,
}

/// Base address of each channel register; channel `n` lives at `base + n - 1`.
const CHANNEL_BASES: [(ChannelRegister, u8); 5] = [
    (ChannelRegister::SetCurrent, 0x01),
    (ChannelRegister::ActCurrent, 0x07),
    (ChannelRegister::Error, 0x10),
    (ChannelRegister::Voltage, 0x16),
    (ChannelRegister::Power, 0x1C),
];

/// Fixed addresses of the scalar registers.
const SCALARS: [(Register, u8); 7] = [
    (Register::BusVoltage, 0x22),
    (Register::OnOff, 0x23),
    (Register::Clear, 0x24),
    (Register::Status, 0x25),
    (Register::MaxOutVoltage, 0x27),
    (Register::MaxOutPower, 0x28),
    (Register::MaxTotalPower, 0x29),
];

impl ChannelRegister {
    /// All channel register kinds.
    pub const ALL: [ChannelRegister; 5] = [
        ChannelRegister::SetCurrent,
        ChannelRegister::ActCurrent,
        ChannelRegister::Error,
        ChannelRegister::Voltage,
        ChannelRegister::Power,
    ];

    fn base(self) -> u8 {
        CHANNEL_BASES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, base)| *base)
            .unwrap_or_default()
    }

    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            ChannelRegister::SetCurrent => "set_current",
            ChannelRegister::ActCurrent => "act_current",
            ChannelRegister::Error => "error",
            ChannelRegister::Voltage => "voltage",
            ChannelRegister::Power => "power",
        }
    }
}

/// A device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Channel(ChannelRegister, Channel),
    BusVoltage,
    OnOff,
    Clear,
    Status,
    MaxOutVoltage,
    MaxOutPower,
    MaxTotalPower,
}

impl Register {
    /// Protocol address byte of this register.
    pub fn address(self) -> u8 {
        match self {
            Register::Channel(kind, channel) => kind.base() + channel.number() - 1,
            scalar => SCALARS
                .iter()
                .find(|(register, _)| *register == scalar)
                .map(|(_, address)| *address)
                .unwrap_or_default(),
        }
    }

    /// Look up the register at `address`, if any.
    pub fn from_address(address: u8) -> Option<Self> {
        for (kind, base) in CHANNEL_BASES {
            if let Some(offset) = address.checked_sub(base) {
                if usize::from(offset) < CHANNEL_COUNT {
                    return Channel::new(offset + 1).map(|channel| Register::Channel(kind, channel));
                }
            }
        }
        SCALARS
            .iter()
            .find(|(_, scalar)| *scalar == address)
            .map(|(register, _)| *register)
    }

    /// The channel this register belongs to, for channel registers.
    pub fn channel(self) -> Option<Channel> {
        match self {
            Register::Channel(_, channel) => Some(channel),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Channel(kind, channel) => write!(f, "{channel}.{}", kind.name()),
            Register::BusVoltage => f.write_str("bus_voltage"),
            Register::OnOff => f.write_str("on_off"),
            Register::Clear => f.write_str("clear"),
            Register::Status => f.write_str("status"),
            Register::MaxOutVoltage => f.write_str("max_out_voltage"),
            Register::MaxOutPower => f.write_str("max_out_power"),
            Register::MaxTotalPower => f.write_str("max_total_power"),
        }
    }
}
