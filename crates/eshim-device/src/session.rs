use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eshim_frame::{FrameConfig, FrameError, FrameReader};
use eshim_transport::SerialStream;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::device::{Device, DeviceOptions};
use crate::error::{DeviceError, Result};
use crate::state::Store;

/// Consecutive non-timeout read failures after which the link is treated as lost.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 10;

const DEFAULT_READ_BACKOFF: Duration = Duration::from_millis(100);

/// Background thread that reads replies and applies them to a [`Store`].
///
/// Never touches the writer. Stopped by [`ReceiveLoop::stop`] or on drop.
/// After a failed read the thread waits one read timeout before retrying.
pub struct ReceiveLoop {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveLoop {
    /// Spawn the loop over `reader`. The reader should have a short read timeout.
    pub fn spawn<R>(mut reader: FrameReader<R>, store: Arc<Store>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let backoff = reader.config().read_timeout.unwrap_or(DEFAULT_READ_BACKOFF);
        let handle = thread::Builder::new()
            .name("eshim-receive".to_string())
            .spawn(move || {
                let mut failures = 0u32;
                while !flag.load(Ordering::Relaxed) {
                    match reader.read_frames() {
                        Ok(frames) => {
                            failures = 0;
                            if !frames.is_empty() {
                                let applied = store.apply_frames(&frames);
                                debug!(received = frames.len(), applied, "replies applied");
                            }
                        }
                        Err(err) if is_disconnect(&err) => {
                            warn!(error = %err, "serial link lost");
                            store.set_last_error(format!("serial link lost: {err}"));
                            store.set_connected(false);
                            break;
                        }
                        Err(err) => {
                            failures += 1;
                            if failures >= MAX_CONSECUTIVE_READ_ERRORS {
                                warn!(error = %err, failures, "serial link lost after repeated read errors");
                                store.set_last_error(format!(
                                    "serial link lost after {failures} failed reads: {err}"
                                ));
                                store.set_connected(false);
                                break;
                            }
                            if failures == 1 {
                                warn!(error = %err, "serial read failed");
                            } else {
                                debug!(error = %err, failures, "serial read failed again");
                            }
                            store.set_last_error(format!("serial read failed: {err}"));
                            thread::sleep(backoff);
                        }
                    }
                }
                debug!("receive loop stopped");
            })
            .map_err(|err| DeviceError::Spawn("receive", err))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Whether the thread has exited (stopped or link lost).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReceiveLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_disconnect(err: &FrameError) -> bool {
    match err {
        FrameError::ConnectionClosed => true,
        FrameError::Io(io) => matches!(
            io.kind(),
            ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof
        ),
        FrameError::ShortWrite { .. } => false,
    }
}

/// Background thread that issues full polls.
///
/// Waits `initial_delay`, runs [`Device::query_all`], then repeats every
/// `interval` when one is given. A poll in progress is not interrupted.
pub struct Poller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<W>(
        device: Arc<Device<W>>,
        initial_delay: Duration,
        interval: Option<Duration>,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("eshim-poll".to_string())
            .spawn(move || {
                let mut wait = initial_delay;
                loop {
                    match rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if let Err(err) = device.query_all() {
                        warn!(error = %err, "poll failed");
                        if matches!(err, DeviceError::Disabled | DeviceError::NotConnected) {
                            break;
                        }
                    }
                    match interval {
                        Some(interval) => wait = interval,
                        None => break,
                    }
                }
                debug!("poller stopped");
            })
            .map_err(|err| DeviceError::Spawn("poll", err))?;

        Ok(Self {
            stop: Some(tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An open device link: the engine plus its receive loop.
pub struct Session {
    device: Arc<Device<SerialStream>>,
    receiver: Option<ReceiveLoop>,
    poller: Option<Poller>,
    config: DeviceConfig,
}

impl Session {
    /// Open the link described by `config`.
    ///
    /// A disabled config yields a disabled session. A port that cannot be
    /// opened yields a session whose device is enabled but not connected,
    /// with the failure recorded as its last error.
    pub fn open(config: DeviceConfig) -> Self {
        let options = DeviceOptions {
            locale: config.language,
            ..DeviceOptions::default()
        };
        if !config.enabled {
            return Self::detached(Device::disabled(options.locale), config);
        }

        match Self::connect(&config, options.clone()) {
            Ok((device, receiver)) => Self {
                device,
                receiver: Some(receiver),
                poller: None,
                config,
            },
            Err(err) => {
                warn!(selector = %config.serial.selector, error = %err, "failed to open device port");
                let device = Device::unreachable(options.locale, err.to_string());
                Self::detached(device, config)
            }
        }
    }

    fn detached(device: Device<SerialStream>, config: DeviceConfig) -> Self {
        Self {
            device: Arc::new(device),
            receiver: None,
            poller: None,
            config,
        }
    }

    fn connect(
        config: &DeviceConfig,
        options: DeviceOptions,
    ) -> Result<(Arc<Device<SerialStream>>, ReceiveLoop)> {
        let settings = config.serial_settings();
        let stream = eshim_transport::open(&config.serial.selector, settings)?;
        stream.clear()?;
        let reader_stream = stream.try_clone()?;
        let frame_config = FrameConfig {
            read_timeout: Some(settings.read_timeout),
            ..FrameConfig::default()
        };
        let reader = FrameReader::with_config_serial(reader_stream, frame_config)?;

        let device = Arc::new(Device::new(stream, options));
        let receiver = ReceiveLoop::spawn(reader, Arc::clone(device.store()))?;
        info!(port = %config.serial.selector, "device session started");
        Ok((device, receiver))
    }

    pub fn device(&self) -> &Arc<Device<SerialStream>> {
        &self.device
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Start background polling: first poll after the configured initial
    /// delay, then every `interval` if given. Replaces any running poller.
    pub fn start_polling(&mut self, interval: Option<Duration>) -> Result<()> {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        if !self.device.is_connected() {
            return Err(if self.device.is_enabled() {
                DeviceError::NotConnected
            } else {
                DeviceError::Disabled
            });
        }
        self.poller = Some(Poller::spawn(
            Arc::clone(&self.device),
            self.config.initial_poll_delay(),
            interval,
        )?);
        Ok(())
    }

    /// Stop polling and receiving.
    pub fn close(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        if let Some(mut receiver) = self.receiver.take() {
            receiver.stop();
        }
        info!("device session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.receiver.is_some() || self.poller.is_some() {
            self.close();
        }
    }
}
