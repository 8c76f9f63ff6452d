//! Serial transport for the EShim power supply.
//!
//! Provides port discovery, selector matching and an open [`SerialStream`]
//! configured for the device's 8N1 link. This is the lowest layer of eshim.
//! Everything else reads and writes through the stream provided here.

pub mod error;
pub mod port;
pub mod stream;

pub use error::{Result, TransportError};
pub use port::{
    checked_baud_rate, list_ports, open, select_port, PortInfo, PortSelector, SerialSettings,
    DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES,
};
pub use stream::SerialStream;
