use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::stream::SerialStream;

/// Baud rate used when the configured one is missing or unsupported.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Baud rates the device's serial bridge accepts.
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Default read timeout applied to opened ports.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Identifies which serial port the device is attached to.
///
/// Either an explicit port name, or a USB identity (`vid`/`pid`, optionally
/// narrowed by serial number). An explicit name wins when both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vid: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl PortSelector {
    /// Select a port by name.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            port: Some(name.into()),
            ..Self::default()
        }
    }

    /// Select a port by USB vendor and product id.
    pub fn by_usb(vid: u16, pid: u16) -> Self {
        Self {
            vid: Some(vid),
            pid: Some(pid),
            ..Self::default()
        }
    }

    /// True when the selector names neither a port nor a USB identity.
    pub fn is_empty(&self) -> bool {
        self.port.is_none() && self.vid.is_none() && self.pid.is_none()
    }

    fn matches(&self, info: &PortInfo) -> bool {
        if let Some(name) = &self.port {
            return info.name == *name || base_name(&info.name) == base_name(name);
        }
        if self.vid.is_none() && self.pid.is_none() {
            return false;
        }
        self.vid.is_none_or(|vid| info.vid == Some(vid))
            && self.pid.is_none_or(|pid| info.pid == Some(pid))
            && self
                .serial_number
                .as_ref()
                .is_none_or(|sn| info.serial_number.as_deref() == Some(sn.as_str()))
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.port {
            return write!(f, "port '{name}'");
        }
        write!(f, "usb")?;
        if let Some(vid) = self.vid {
            write!(f, " vid={vid:04x}")?;
        }
        if let Some(pid) = self.pid {
            write!(f, " pid={pid:04x}")?;
        }
        if let Some(sn) = &self.serial_number {
            write!(f, " serial={sn}")?;
        }
        Ok(())
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// A discovered serial port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub name: String,
    pub kind: &'static str,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let name = info.port_name;
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name,
                kind: "usb",
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number,
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            SerialPortType::PciPort => Self {
                name,
                kind: "pci",
                ..Self::default()
            },
            SerialPortType::BluetoothPort => Self {
                name,
                kind: "bluetooth",
                ..Self::default()
            },
            _ => Self {
                name,
                kind: "unknown",
                ..Self::default()
            },
        }
    }
}

/// Line settings for opening the device port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate. Unsupported values are replaced by [`DEFAULT_BAUD_RATE`].
    pub baud_rate: u32,
    /// Read timeout for blocking reads.
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Return `baud_rate` if supported, otherwise [`DEFAULT_BAUD_RATE`].
pub fn checked_baud_rate(baud_rate: u32) -> u32 {
    if SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        baud_rate
    } else {
        warn!(
            baud_rate,
            fallback = DEFAULT_BAUD_RATE,
            "unsupported baud rate, using default"
        );
        DEFAULT_BAUD_RATE
    }
}

/// Enumerate the serial ports present on this machine.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// Pick the first port matching `selector`.
pub fn select_port<'a>(ports: &'a [PortInfo], selector: &PortSelector) -> Option<&'a PortInfo> {
    ports.iter().find(|info| selector.matches(info))
}

/// Resolve `selector` and open the port with 8N1, no flow control.
///
/// A selector naming a port explicitly is opened even when enumeration does
/// not report it (pseudo terminals and some adapters are not enumerated).
pub fn open(selector: &PortSelector, settings: SerialSettings) -> Result<SerialStream> {
    let name = resolve(selector)?;
    let baud_rate = checked_baud_rate(settings.baud_rate);

    let port = serialport::new(&name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(settings.read_timeout)
        .open()
        .map_err(|source| TransportError::Open {
            port: name.clone(),
            source,
        })?;

    info!(port = %name, baud_rate, "opened serial port");
    Ok(SerialStream::from_native(port, name))
}

fn resolve(selector: &PortSelector) -> Result<String> {
    if selector.is_empty() {
        return Err(TransportError::NoMatchingPort(
            "an empty selector".to_string(),
        ));
    }

    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(err) if selector.port.is_some() => {
            debug!(error = %err, "port enumeration failed, opening by name");
            Vec::new()
        }
        Err(err) => return Err(err),
    };

    if let Some(info) = select_port(&ports, selector) {
        debug!(port = %info.name, %selector, "selected serial port");
        return Ok(info.name.clone());
    }

    match &selector.port {
        Some(name) => Ok(name.clone()),
        None => Err(TransportError::NoMatchingPort(selector.to_string())),
    }
}
