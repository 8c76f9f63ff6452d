/// Errors that can occur while writing or reading frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The transport accepted only part of a frame.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reported end-of-file or accepted zero bytes.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

pub(crate) fn transport_to_frame_error(err: eshim_transport::TransportError) -> FrameError {
    match err {
        eshim_transport::TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
