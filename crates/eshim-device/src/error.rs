use eshim_frame::CHANNEL_COUNT;

use crate::device::{MAX_CHANNEL_CURRENT, MIN_CHANNEL_CURRENT};

/// Errors that can occur in device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] eshim_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] eshim_frame::FrameError),

    /// Channel number outside `1..=6`.
    #[error("invalid channel {0} (expected 1..={max})", max = CHANNEL_COUNT)]
    InvalidChannel(u8),

    /// Channel current outside the accepted range.
    #[error("current {0} out of range ({min}..={max})", min = MIN_CHANNEL_CURRENT, max = MAX_CHANNEL_CURRENT)]
    CurrentOutOfRange(i32),

    /// The device is disabled in configuration.
    #[error("device disabled")]
    Disabled,

    /// The serial link is down.
    #[error("device not connected")]
    NotConnected,

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// A background thread could not be started.
    #[error("failed to spawn {0} thread: {1}")]
    Spawn(&'static str, std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
