//! Driver for the EShim laboratory power supply.
//!
//! The device speaks a fixed 8-byte frame protocol over a serial link. This
//! crate bundles the layers needed to talk to it.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial port discovery and I/O
//! - [`frame`]: frame codec, register table, reply scanning
//! - [`device`]: paced commands, reply decoding, state snapshots (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use eshim_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use eshim_frame::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use eshim_device::*;
}
