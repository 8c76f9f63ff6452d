/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the specified port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// Port enumeration failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// No available port matched the configured selector.
    #[error("no serial port matches {0}")]
    NoMatchingPort(String),

    /// A serial driver error on an already open port.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
