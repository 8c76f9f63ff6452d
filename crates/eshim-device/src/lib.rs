//! Protocol engine for the EShim power supply.
//!
//! Sends paced commands, decodes replies into a shared state store, and
//! renders snapshots of the last known device state.

pub mod config;
pub mod decode;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod pacing;
pub mod session;
pub mod snapshot;
pub mod state;

pub use config::{DeviceConfig, SerialConfig, CONFIG_KEY, DEFAULT_CONFIG_PATH};
pub use decode::{
    decode, ChannelFault, CoilState, Locale, StatusFlag, StatusReport, Update,
    RESERVED_STATUS_BITS, STATUS_ALIASES,
};
pub use device::{Device, DeviceOptions, MAX_CHANNEL_CURRENT, MIN_CHANNEL_CURRENT};
pub use dispatcher::Dispatcher;
pub use error::{DeviceError, Result};
pub use pacing::{Pacer, DEFAULT_MIN_INTERVAL};
pub use session::{Poller, ReceiveLoop, Session, MAX_CONSECUTIVE_READ_ERRORS};
pub use snapshot::{Readings, Snapshot};
pub use state::{DeviceState, Store};
