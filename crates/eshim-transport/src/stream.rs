use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// An open serial port. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by [`crate::open`]. The read
/// side and the write side are usually split with [`SerialStream::try_clone`]
/// so a receive thread can block on reads while commands are written.
pub struct SerialStream {
    inner: SerialStreamInner,
    name: String,
}

enum SerialStreamInner {
    Native(Box<dyn serialport::SerialPort>),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Native(port) => port.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Native(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Native(port) => port.flush(),
        }
    }
}

impl SerialStream {
    pub(crate) fn from_native(port: Box<dyn serialport::SerialPort>, name: String) -> Self {
        Self {
            inner: SerialStreamInner::Native(port),
            name,
        }
    }

    /// Port name this stream was opened on.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the read timeout of the underlying port.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Native(port) => port.set_timeout(timeout).map_err(Into::into),
        }
    }

    /// Discard anything pending in the driver's input and output buffers.
    pub fn clear(&self) -> Result<()> {
        match &self.inner {
            SerialStreamInner::Native(port) => port
                .clear(serialport::ClearBuffer::All)
                .map_err(Into::into),
        }
    }

    /// Try to clone this stream (opens a second handle on the same port).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            SerialStreamInner::Native(port) => {
                let cloned = port.try_clone()?;
                Ok(Self::from_native(cloned, self.name.clone()))
            }
        }
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SerialStreamInner::Native(_) => f
                .debug_struct("SerialStream")
                .field("type", &"native")
                .field("name", &self.name)
                .finish(),
        }
    }
}
