use std::path::Path;
use std::time::Duration;

use eshim_transport::{checked_baud_rate, PortSelector, SerialSettings, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::decode::Locale;
use crate::error::{DeviceError, Result};

/// Default location of the hardware configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/exthw.json";

/// Key of the device section inside the hardware configuration file.
pub const CONFIG_KEY: &str = "eshim";

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_INITIAL_POLL_DELAY_MS: u64 = 1000;

/// Serial link section of the device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialConfig {
    #[serde(flatten)]
    pub selector: PortSelector,
    #[serde(default = "default_baud_rate", deserialize_with = "lenient_baud_rate")]
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            selector: PortSelector::default(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

/// Accept any JSON value for `baudRate`. Numbers and numeric strings go
/// through [`checked_baud_rate`]; anything else becomes the default.
fn lenient_baud_rate<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .and_then(|rate| u32::try_from(rate).ok());
    Ok(match parsed {
        Some(rate) => checked_baud_rate(rate),
        None => {
            warn!(baud_rate = %value, "invalid baud rate, using default");
            DEFAULT_BAUD_RATE
        }
    })
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_initial_poll_delay_ms() -> u64 {
    DEFAULT_INITIAL_POLL_DELAY_MS
}

/// Device section of the hardware configuration file.
///
/// ```json
/// { "eshim": { "enabled": true,
///              "serial": { "port": "/dev/ttyUSB0", "baudRate": 9600 },
///              "language": "en" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub language: Locale,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_initial_poll_delay_ms")]
    pub initial_poll_delay_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            serial: SerialConfig::default(),
            language: Locale::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            initial_poll_delay_ms: DEFAULT_INITIAL_POLL_DELAY_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HardwareFile {
    #[serde(rename = "eshim")]
    device: Option<DeviceConfig>,
}

impl DeviceConfig {
    /// A disabled configuration.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Parse the hardware configuration JSON and extract the device section.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: HardwareFile = serde_json::from_str(text)?;
        file.device
            .ok_or_else(|| DeviceError::Config(format!("missing \"{CONFIG_KEY}\" section")))
    }

    /// Load the device section from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| DeviceError::Config(format!("{}: {err}", path.display())))?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), enabled = config.enabled, "loaded device config");
        Ok(config)
    }

    /// Load the device section from `path`, falling back to a disabled device.
    ///
    /// A missing file, a missing section, or malformed JSON is logged and
    /// treated as `enabled = false`.
    pub fn load_or_disabled(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                if !config.enabled {
                    info!(path = %path.display(), "device disabled in config");
                }
                config
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "device config unusable, device disabled");
                Self::disabled()
            }
        }
    }

    /// Serial settings with the configured baud rate validated.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: checked_baud_rate(self.serial.baud_rate),
            ..SerialSettings::default()
        }
    }

    /// Interval between full polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay before the first full poll after opening.
    pub fn initial_poll_delay(&self) -> Duration {
        Duration::from_millis(self.initial_poll_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_port_by_name() {
        let config = DeviceConfig::from_json(
            r#"{"eshim":{"enabled":true,"serial":{"port":"/dev/ttyUSB0","baudRate":19200}}}"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.serial.selector.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.language, Locale::En);
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn parses_usb_selector_and_locale() {
        let config = DeviceConfig::from_json(
            r#"{"other":{},"eshim":{"enabled":true,"language":"zh",
                "serial":{"vid":1027,"pid":24577,"serialNumber":"A10K"},
                "pollIntervalMs":500,"initialPollDelayMs":0}}"#,
        )
        .unwrap();
        assert_eq!(config.serial.selector.vid, Some(1027));
        assert_eq!(config.serial.selector.pid, Some(24577));
        assert_eq!(config.serial.selector.serial_number.as_deref(), Some("A10K"));
        assert_eq!(config.serial.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.language, Locale::Zh);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.initial_poll_delay(), Duration::ZERO);
    }

    #[test]
    fn missing_section_is_an_error() {
        let err = DeviceConfig::from_json(r#"{"other":{}}"#).unwrap_err();
        assert!(matches!(err, DeviceError::Config(_)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = DeviceConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, DeviceError::Json(_)));
    }

    #[test]
    fn missing_file_falls_back_to_disabled() {
        let config = DeviceConfig::load_or_disabled("/nonexistent/eshim/exthw.json");
        assert_eq!(config, DeviceConfig::disabled());
        assert!(!config.enabled);
    }

    #[test]
    fn unusable_file_falls_back_to_disabled() {
        let path = std::env::temp_dir().join(format!("eshim-config-{}.json", std::process::id()));
        std::fs::write(&path, "[1, 2").unwrap();
        let config = DeviceConfig::load_or_disabled(&path);
        assert!(!config.enabled);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_baud_rate_falls_back_without_disabling() {
        for baud in ["-1", r#""fast""#, "9600.5", "null", "4294967296"] {
            let json = format!(
                r#"{{"eshim":{{"enabled":true,"serial":{{"port":"COM3","baudRate":{baud}}}}}}}"#
            );
            let config = DeviceConfig::from_json(&json)
                .unwrap_or_else(|err| panic!("baudRate {baud} should not fail: {err}"));
            assert!(config.enabled, "baudRate {baud}");
            assert_eq!(config.serial.baud_rate, DEFAULT_BAUD_RATE, "baudRate {baud}");
            assert_eq!(config.serial.selector.port.as_deref(), Some("COM3"));
        }
    }

    #[test]
    fn numeric_string_baud_rate_is_accepted() {
        let config = DeviceConfig::from_json(
            r#"{"eshim":{"enabled":true,"serial":{"port":"COM3","baudRate":"115200"}}}"#,
        )
        .unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
    }

    #[test]
    fn unsupported_baud_rate_falls_back() {
        let config = DeviceConfig::from_json(
            r#"{"eshim":{"enabled":true,"serial":{"port":"COM3","baudRate":12345}}}"#,
        )
        .unwrap();
        assert_eq!(config.serial_settings().baud_rate, DEFAULT_BAUD_RATE);
    }
}
