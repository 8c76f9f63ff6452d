use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use eshim_frame::{hex_dump, Channel, ChannelRegister, Frame, Register};
use tracing::{debug, warn};

use crate::decode::Locale;
use crate::dispatcher::Dispatcher;
use crate::error::{DeviceError, Result};
use crate::pacing::DEFAULT_MIN_INTERVAL;
use crate::snapshot::Snapshot;
use crate::state::{DeviceState, Store};

/// Lowest accepted channel current setpoint.
pub const MIN_CHANNEL_CURRENT: i32 = -5000;
/// Highest accepted channel current setpoint.
pub const MAX_CHANNEL_CURRENT: i32 = 5000;

const FLAG_BOOT: u8 = 0x01;
const FLAG_SHUT: u8 = 0x00;
const FLAG_CLEAR: u8 = 0x01;

const POLL_ORDER: [ChannelRegister; 4] = [
    ChannelRegister::Error,
    ChannelRegister::ActCurrent,
    ChannelRegister::Power,
    ChannelRegister::Voltage,
];

/// Device behavior knobs.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Minimum spacing between outbound frames. Default: 200 ms.
    pub min_interval: Duration,
    /// Language of rendered messages.
    pub locale: Locale,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            locale: Locale::default(),
        }
    }
}

/// The protocol engine: issues commands and tracks what the device reports.
///
/// Commands go out through a paced dispatcher. Replies are fed into the
/// shared [`Store`] by whoever reads the link (see
/// [`ReceiveLoop`](crate::session::ReceiveLoop)); this type never reads.
pub struct Device<W> {
    dispatcher: Option<Dispatcher<W>>,
    store: Arc<Store>,
    locale: Locale,
}

impl<W: Write> Device<W> {
    /// An enabled, connected device writing to `writer`.
    pub fn new(writer: W, options: DeviceOptions) -> Self {
        let store = Arc::new(Store::new(true));
        store.set_connected(true);
        Self {
            dispatcher: Some(Dispatcher::new(writer, options.min_interval)),
            store,
            locale: options.locale,
        }
    }

    /// A device disabled in configuration. Every command fails without sending.
    pub fn disabled(locale: Locale) -> Self {
        Self {
            dispatcher: None,
            store: Arc::new(Store::new(false)),
            locale,
        }
    }

    /// An enabled device whose port could not be opened.
    pub fn unreachable(locale: Locale, reason: impl Into<String>) -> Self {
        let store = Arc::new(Store::new(true));
        store.set_last_error(reason);
        Self {
            dispatcher: None,
            store,
            locale,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    /// Copy of the current state.
    pub fn state(&self) -> DeviceState {
        self.store.snapshot()
    }

    /// Serializable snapshot with messages in the configured locale.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_state(&self.store.snapshot(), self.locale)
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.dispatcher
            .as_ref()
            .map(Dispatcher::frames_written)
            .unwrap_or_default()
    }

    /// Run `f` against the underlying writer, if any.
    pub fn with_writer<R>(&self, f: impl FnOnce(&W) -> R) -> Option<R> {
        self.dispatcher.as_ref().map(|dispatcher| dispatcher.with_stream(f))
    }

    fn send(&self, frame: Frame) -> Result<()> {
        let dispatcher = match &self.dispatcher {
            Some(dispatcher) if self.store.is_enabled() => dispatcher,
            _ if !self.store.is_enabled() => return Err(DeviceError::Disabled),
            _ => return Err(DeviceError::NotConnected),
        };
        if !self.store.is_connected() {
            return Err(DeviceError::NotConnected);
        }

        debug!(register = ?frame.register(), frame = %hex_dump(&frame.to_bytes()), "dispatching");
        dispatcher.send(&frame).inspect_err(|err| {
            warn!(address = frame.address, error = %err, "send failed");
            self.store.set_last_error(format!(
                "failed to write frame {}: {err}",
                hex_dump(&frame.to_bytes())
            ));
        })
    }

    fn read(&self, register: Register) -> Result<()> {
        self.send(Frame::read(register))
    }

    fn channel(number: u8) -> Result<Channel> {
        Channel::new(number).ok_or_else(|| {
            warn!(channel = number, "rejected command for invalid channel");
            DeviceError::InvalidChannel(number)
        })
    }

    fn read_channel(&self, kind: ChannelRegister, number: u8) -> Result<()> {
        let channel = Self::channel(number)?;
        self.read(Register::Channel(kind, channel))
    }

    pub fn query_channel_set_current(&self, channel: u8) -> Result<()> {
        self.read_channel(ChannelRegister::SetCurrent, channel)
    }

    pub fn query_channel_act_current(&self, channel: u8) -> Result<()> {
        self.read_channel(ChannelRegister::ActCurrent, channel)
    }

    pub fn query_channel_voltage(&self, channel: u8) -> Result<()> {
        self.read_channel(ChannelRegister::Voltage, channel)
    }

    pub fn query_channel_power(&self, channel: u8) -> Result<()> {
        self.read_channel(ChannelRegister::Power, channel)
    }

    pub fn query_channel_error(&self, channel: u8) -> Result<()> {
        self.read_channel(ChannelRegister::Error, channel)
    }

    pub fn query_bus_voltage(&self) -> Result<()> {
        self.read(Register::BusVoltage)
    }

    pub fn query_max_out_voltage(&self) -> Result<()> {
        self.read(Register::MaxOutVoltage)
    }

    pub fn query_max_out_power(&self) -> Result<()> {
        self.read(Register::MaxOutPower)
    }

    pub fn query_max_total_power(&self) -> Result<()> {
        self.read(Register::MaxTotalPower)
    }

    pub fn query_status(&self) -> Result<()> {
        self.read(Register::Status)
    }

    /// Turn the output on.
    pub fn set_boot(&self) -> Result<()> {
        self.send(Frame::write_flag(Register::OnOff, FLAG_BOOT))
    }

    /// Turn the output off.
    pub fn set_shut(&self) -> Result<()> {
        self.send(Frame::write_flag(Register::OnOff, FLAG_SHUT))
    }

    /// Clear latched faults and reinitialize the channels.
    pub fn init_channels(&self) -> Result<()> {
        self.send(Frame::write_flag(Register::Clear, FLAG_CLEAR))
    }

    /// Set the current setpoint of `channel` (1..=6) to `current` (-5000..=5000).
    pub fn set_channel_current(&self, channel: u8, current: i32) -> Result<()> {
        let channel = Self::channel(channel)?;
        if !(MIN_CHANNEL_CURRENT..=MAX_CHANNEL_CURRENT).contains(&current) {
            warn!(%channel, current, "rejected out-of-range channel current");
            return Err(DeviceError::CurrentOutOfRange(current));
        }
        self.send(Frame::write_value(
            Register::Channel(ChannelRegister::SetCurrent, channel),
            current,
        ))
    }

    pub fn set_max_out_voltage(&self, value: i32) -> Result<()> {
        self.send(Frame::write_value(Register::MaxOutVoltage, value))
    }

    pub fn set_max_out_power(&self, value: i32) -> Result<()> {
        self.send(Frame::write_value(Register::MaxOutPower, value))
    }

    pub fn set_max_total_power(&self, value: i32) -> Result<()> {
        self.send(Frame::write_value(Register::MaxTotalPower, value))
    }

    /// Send each frame in order. A failed send does not stop the rest; the
    /// first error is returned once every frame has been attempted.
    fn send_each(&self, frames: impl IntoIterator<Item = Frame>) -> Result<()> {
        let mut first_err = None;
        for frame in frames {
            match self.send(frame) {
                Ok(()) => {}
                Err(err @ (DeviceError::Disabled | DeviceError::NotConnected)) => return Err(err),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Read every channel (error, actual current, power, voltage) then the status word.
    pub fn query_all(&self) -> Result<()> {
        let channels = Channel::ALL.into_iter().flat_map(|channel| {
            POLL_ORDER.map(|kind| Frame::read(Register::Channel(kind, channel)))
        });
        self.send_each(channels.chain(std::iter::once(Frame::read(Register::Status))))
    }

    /// Read bus voltage and the three configured limits.
    pub fn query_limits(&self) -> Result<()> {
        self.send_each(
            [
                Register::BusVoltage,
                Register::MaxOutVoltage,
                Register::MaxOutPower,
                Register::MaxTotalPower,
            ]
            .map(Frame::read),
        )
    }
}

#[cfg(test)]
mod tests {
    use eshim_frame::{encode_i32_le, FRAME_LEN};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        bytes: Vec<u8>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn fast_device() -> Device<Recorder> {
        Device::new(
            Recorder::default(),
            DeviceOptions {
                min_interval: Duration::ZERO,
                ..DeviceOptions::default()
            },
        )
    }

    fn written(device: &Device<Recorder>) -> Vec<u8> {
        device.with_writer(|w| w.bytes.clone()).unwrap_or_default()
    }

    #[test]
    fn set_channel_current_encodes_one_frame() {
        let device = fast_device();
        for (channel, current) in [(1u8, -5000), (3, 0), (6, 5000), (2, 1234)] {
            let before = written(&device).len();
            device.set_channel_current(channel, current).unwrap();
            let bytes = written(&device);
            let frame = &bytes[before..];
            assert_eq!(frame.len(), FRAME_LEN);
            assert_eq!(&frame[..3], &[0xA5, 0x5A, 0x30]);
            assert_eq!(frame[3], channel);
            assert_eq!(&frame[4..], &encode_i32_le(current));
        }
    }

    #[test]
    fn set_channel_current_rejects_bad_input_without_sending() {
        let device = fast_device();
        assert!(matches!(
            device.set_channel_current(0, 10),
            Err(DeviceError::InvalidChannel(0))
        ));
        assert!(matches!(
            device.set_channel_current(7, 10),
            Err(DeviceError::InvalidChannel(7))
        ));
        assert!(matches!(
            device.set_channel_current(1, 5001),
            Err(DeviceError::CurrentOutOfRange(5001))
        ));
        assert!(matches!(
            device.set_channel_current(1, -5001),
            Err(DeviceError::CurrentOutOfRange(-5001))
        ));
        assert!(written(&device).is_empty());
        assert_eq!(device.frames_written(), 0);
    }

    #[test]
    fn channel_queries_reject_invalid_channel() {
        let device = fast_device();
        assert!(device.query_channel_voltage(0).is_err());
        assert!(device.query_channel_power(9).is_err());
        assert!(device.query_channel_error(7).is_err());
        assert!(written(&device).is_empty());
    }

    #[test]
    fn on_off_and_clear_flags() {
        let device = fast_device();
        device.set_boot().unwrap();
        device.set_shut().unwrap();
        device.init_channels().unwrap();
        let bytes = written(&device);
        assert_eq!(&bytes[..8], &[0xA5, 0x5A, 0x30, 0x23, 0x01, 0, 0, 0]);
        assert_eq!(&bytes[8..16], &[0xA5, 0x5A, 0x30, 0x23, 0x00, 0, 0, 0]);
        assert_eq!(&bytes[16..24], &[0xA5, 0x5A, 0x30, 0x24, 0x01, 0, 0, 0]);
    }

    #[test]
    fn limit_writes() {
        let device = fast_device();
        device.set_max_out_voltage(24).unwrap();
        device.set_max_out_power(300).unwrap();
        device.set_max_total_power(1200).unwrap();
        let addresses: Vec<u8> = written(&device).chunks(FRAME_LEN).map(|f| f[3]).collect();
        assert_eq!(addresses, vec![0x27, 0x28, 0x29]);
    }

    #[test]
    fn query_all_reads_channels_then_status() {
        let device = fast_device();
        device.query_all().unwrap();
        let bytes = written(&device);
        let frames: Vec<&[u8]> = bytes.chunks(FRAME_LEN).collect();
        assert_eq!(frames.len(), 25);
        assert!(frames.iter().all(|f| f[2] == 0x20 && f[4..] == [0, 0, 0, 0]));
        assert_eq!(
            frames[..4].iter().map(|f| f[3]).collect::<Vec<_>>(),
            vec![0x10, 0x07, 0x1C, 0x16]
        );
        assert_eq!(
            frames[20..24].iter().map(|f| f[3]).collect::<Vec<_>>(),
            vec![0x15, 0x0C, 0x21, 0x1B]
        );
        assert_eq!(frames[24][3], 0x25);
    }

    #[test]
    fn query_limits_reads_four_registers() {
        let device = fast_device();
        device.query_limits().unwrap();
        let addresses: Vec<u8> = written(&device).chunks(FRAME_LEN).map(|f| f[3]).collect();
        assert_eq!(addresses, vec![0x22, 0x27, 0x28, 0x29]);
    }

    #[test]
    fn disabled_device_sends_nothing() {
        let device: Device<Recorder> = Device::disabled(Locale::En);
        assert!(matches!(device.query_all(), Err(DeviceError::Disabled)));
        assert!(matches!(device.set_boot(), Err(DeviceError::Disabled)));
        assert_eq!(device.frames_written(), 0);
        assert!(device.with_writer(|_| ()).is_none());

        let json = device.snapshot().to_json();
        assert_eq!(json["enabled"], false);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn unreachable_device_reports_not_connected() {
        let device: Device<Recorder> = Device::unreachable(Locale::En, "no such port");
        assert!(matches!(device.query_status(), Err(DeviceError::NotConnected)));
        let state = device.state();
        assert!(state.enabled);
        assert!(!state.connected);
        assert_eq!(state.last_error, "no such port");
    }

    #[test]
    fn disconnected_device_sends_nothing() {
        let device = fast_device();
        device.store().set_connected(false);
        assert!(matches!(device.query_status(), Err(DeviceError::NotConnected)));
        assert!(written(&device).is_empty());
    }

    #[test]
    fn write_failure_records_last_error_and_stays_connected() {
        struct Short;
        impl Write for Short {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(3)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let device = Device::new(
            Short,
            DeviceOptions {
                min_interval: Duration::ZERO,
                ..DeviceOptions::default()
            },
        );
        let err = device.query_bus_voltage().unwrap_err();
        assert!(matches!(err, DeviceError::Frame(_)));
        let state = device.state();
        assert!(state.connected);
        assert!(state.last_error.contains("A5 5A 20 22"));
        assert!(state.last_error.contains("short write"));
    }

    #[test]
    fn query_all_keeps_polling_after_a_failed_write() {
        #[derive(Default)]
        struct FailsThird {
            calls: usize,
            bytes: Vec<u8>,
        }
        impl Write for FailsThird {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.calls += 1;
                if self.calls == 3 {
                    return Err(std::io::Error::other("line glitch"));
                }
                self.bytes.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let device = Device::new(
            FailsThird::default(),
            DeviceOptions {
                min_interval: Duration::ZERO,
                ..DeviceOptions::default()
            },
        );
        let err = device.query_all().unwrap_err();
        assert!(matches!(err, DeviceError::Frame(_)));

        let (calls, bytes) = device
            .with_writer(|w| (w.calls, w.bytes.clone()))
            .unwrap_or_default();
        assert_eq!(calls, 25);
        assert_eq!(bytes.len(), 24 * FRAME_LEN);
        assert_eq!(bytes[bytes.len() - FRAME_LEN + 3], 0x25);

        let state = device.state();
        assert!(state.connected);
        assert!(state.last_error.contains("line glitch"));
    }

    #[test]
    fn paced_commands_are_spaced() {
        #[derive(Default)]
        struct Timed {
            at: Vec<std::time::Instant>,
        }
        impl Write for Timed {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.at.push(std::time::Instant::now());
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let device = Device::new(Timed::default(), DeviceOptions::default());
        device.query_limits().unwrap();
        let at = device.with_writer(|w| w.at.clone()).unwrap_or_default();
        assert_eq!(at.len(), 4);
        for pair in at.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= DEFAULT_MIN_INTERVAL);
        }
    }
}
