use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use eshim_device::{DeviceConfig, DeviceError, Locale, Session, DEFAULT_CONFIG_PATH};
use eshim_transport::PortSelector;
use tracing::debug;

use crate::exit::{device_error, CliError, CliResult, CONFIG, TRANSPORT_ERROR, USAGE};
use crate::output::OutputFormat;

pub mod clear;
pub mod decode;
pub mod monitor;
pub mod ports;
pub mod power;
pub mod set_current;
pub mod set_limit;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll every register once and print the device state.
    Status(StatusArgs),
    /// Poll continuously and print the device state until interrupted.
    Monitor(MonitorArgs),
    /// Set the current setpoint of one channel.
    SetCurrent(SetCurrentArgs),
    /// Set an output limit.
    SetLimit(SetLimitArgs),
    /// Switch the output on or off.
    Power(PowerArgs),
    /// Clear latched faults and reinitialize the channels.
    Clear(ClearArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Decode captured reply bytes without a device.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Status(args) => status::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::SetCurrent(args) => set_current::run(args),
        Command::SetLimit(args) => set_limit::run(args),
        Command::Power(args) => power::run(args),
        Command::Clear(args) => clear::run(args),
        Command::Ports(args) => ports::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Language {
    En,
    Zh,
}

impl From<Language> for Locale {
    fn from(language: Language) -> Self {
        match language {
            Language::En => Locale::En,
            Language::Zh => Locale::Zh,
        }
    }
}

/// How to reach the device.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Hardware config file.
    #[arg(long, value_name = "PATH", env = "ESHIM_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Serial port; overrides the config file and enables the device.
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,
    /// Baud rate; overrides the config file.
    #[arg(long, value_name = "BAUD")]
    pub baud: Option<u32>,
    /// Message language; overrides the config file.
    #[arg(long, value_name = "LANG")]
    pub language: Option<Language>,
}

impl ConnectArgs {
    /// Config file contents with command-line overrides applied.
    pub fn device_config(&self) -> DeviceConfig {
        let mut config = DeviceConfig::load_or_disabled(&self.config);
        if let Some(port) = &self.port {
            config.enabled = true;
            config.serial.selector = PortSelector::by_name(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(language) = self.language {
            config.language = language.into();
        }
        debug!(?config, "effective device config");
        config
    }

    /// Open a session. Open failures are recorded in the device state.
    pub fn open(&self) -> Session {
        Session::open(self.device_config())
    }

    /// Open a session and require a live link.
    pub fn open_connected(&self) -> CliResult<Session> {
        let session = self.open();
        ensure_connected(&session)?;
        Ok(session)
    }
}

/// Map a failed device command, adding the recorded link error when the
/// device never connected.
pub fn command_error(session: &Session, context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::NotConnected => CliError::new(
            TRANSPORT_ERROR,
            format!("{context}: device not connected: {}", session.device().state().last_error),
        ),
        other => device_error(context, other),
    }
}

pub fn ensure_connected(session: &Session) -> CliResult<()> {
    let device = session.device();
    if !device.is_enabled() {
        return Err(CliError::new(
            CONFIG,
            "device disabled (enable it in the config file or pass --port)",
        ));
    }
    if !device.is_connected() {
        let state = device.state();
        return Err(CliError::new(
            TRANSPORT_ERROR,
            format!("device not connected: {}", state.last_error),
        ));
    }
    Ok(())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Time to wait for replies after the last request (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Interval between polls; defaults to the config file's pollIntervalMs.
    #[arg(long)]
    pub interval: Option<String>,
    /// Exit after printing N snapshots.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SetCurrentArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Channel number (1-6).
    pub channel: u8,
    /// Current setpoint (-5000..=5000).
    #[arg(allow_negative_numbers = true)]
    pub current: i32,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LimitKind {
    /// Maximum output voltage.
    OutVoltage,
    /// Maximum output power per channel.
    OutPower,
    /// Maximum total output power.
    TotalPower,
}

#[derive(Args, Debug)]
pub struct SetLimitArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Which limit to set.
    pub kind: LimitKind,
    /// New limit value.
    #[arg(allow_negative_numbers = true)]
    pub value: i32,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct PowerArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Desired output state.
    pub state: PowerState,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured bytes as hex, e.g. "5A A5 40 25 01 00 00 00".
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
    /// Message language.
    #[arg(long, value_name = "LANG", default_value = "en")]
    pub language: Language,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
