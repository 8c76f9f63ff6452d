use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use eshim_transport::SerialStream;
use tracing::{debug, trace};

use crate::codec::{hex_dump, scan, Frame, FRAME_LEN};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Default cap on bytes held while waiting for a complete reply: 4 KiB.
pub const DEFAULT_MAX_BUFFERED: usize = 4 * 1024;

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum bytes kept in the accumulation buffer. Default: 4 KiB.
    pub max_buffered: usize,
    /// Read timeout applied to serial streams.
    pub read_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_buffered: DEFAULT_MAX_BUFFERED,
            read_timeout: Some(std::time::Duration::from_millis(100)),
        }
    }
}

/// Accumulates raw bytes and extracts device replies from them.
///
/// Bytes that never complete a reply are kept until the cap is hit, then
/// trimmed down to the last `FRAME_LEN - 1` bytes (a possible partial reply).
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_buffered: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED)
    }
}

impl FrameBuffer {
    /// Create an empty buffer holding at most `max_buffered` bytes.
    pub fn new(max_buffered: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(FRAME_LEN * 4),
            max_buffered: max_buffered.max(FRAME_LEN),
        }
    }

    /// Append newly arrived bytes and return every complete reply, in order.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() < FRAME_LEN {
            return Vec::new();
        }

        let frames: Vec<Frame> = scan(&mut self.buf).collect();

        if self.buf.len() > self.max_buffered {
            let keep = FRAME_LEN - 1;
            let dropped = self.buf.len() - keep;
            debug!(
                dropped,
                head = %hex_dump(&self.buf[..dropped.min(16)]),
                "receive buffer over limit, discarding unmatched bytes"
            );
            let _ = self.buf.split_to(dropped);
        }

        frames
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Reads device replies from any `Read` stream.
///
/// Each call performs at most one read and returns whatever complete
/// replies the buffered bytes now contain. Partial replies stay buffered.
pub struct FrameReader<T> {
    inner: T,
    buffer: FrameBuffer,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buffer: FrameBuffer::new(config.max_buffered),
            config,
        }
    }

    /// Read once and return complete replies (blocking up to the read timeout).
    ///
    /// A read timeout yields an empty batch. Returns
    /// `Err(FrameError::ConnectionClosed)` when the stream reports EOF.
    pub fn read_frames(&mut self) -> Result<Vec<Frame>> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
                {
                    return Ok(Vec::new());
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        trace!(bytes = %hex_dump(&chunk[..read]), "received");
        Ok(self.buffer.extend(&chunk[..read]))
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SerialStream> {
    /// Create a frame reader for a serial stream and apply the read timeout from config.
    pub fn with_config_serial(mut inner: SerialStream, config: FrameConfig) -> Result<Self> {
        if let Some(timeout) = config.read_timeout {
            inner
                .set_timeout(timeout)
                .map_err(crate::error::transport_to_frame_error)?;
        }
        Ok(Self::with_config(inner, config))
    }
}
