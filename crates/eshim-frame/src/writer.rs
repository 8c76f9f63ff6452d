use std::io::{ErrorKind, Write};

use tracing::debug;

use crate::codec::{hex_dump, Frame, FRAME_LEN};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// A frame is handed to the stream in a single write. Zero-length and short
/// writes are reported as errors and never retried; only `Interrupted` is.
pub struct FrameWriter<T> {
    inner: T,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            frames_written: 0,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(&frame.to_bytes())
    }

    /// Send raw frame bytes.
    pub fn send(&mut self, bytes: &[u8; FRAME_LEN]) -> Result<()> {
        debug!(frame = %hex_dump(bytes), "sending");

        loop {
            match self.inner.write(bytes) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) if n < FRAME_LEN => {
                    return Err(FrameError::ShortWrite {
                        written: n,
                        expected: FRAME_LEN,
                    })
                }
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        self.frames_written = self.frames_written.saturating_add(1);
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Frames successfully written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
