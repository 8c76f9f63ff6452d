use clap::ValueEnum;
use tracing_subscriber::filter::EnvFilter;

/// Overrides the computed filter with full `EnvFilter` directives.
pub const LOG_ENV: &str = "ESHIM_LOG";

/// Our crates. Everything else (the serial backend) stays at `warn`.
const CRATE_TARGETS: [&str; 3] = ["eshim", "eshim_device", "eshim_transport"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Directives for `level`.
///
/// `eshim_frame` logs every frame sent at `debug`; it only follows the
/// requested level at `trace`.
pub fn filter_directives(level: LogLevel) -> String {
    let frame_level = match level {
        LogLevel::Trace => LogLevel::Trace,
        LogLevel::Debug => LogLevel::Info,
        other => other,
    };
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        CRATE_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.directive())),
    );
    directives.push(format!("eshim_frame={}", frame_level.directive()));
    directives.join(",")
}

fn build_filter(level: LogLevel) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); using --log-level");
            EnvFilter::new(filter_directives(level))
        }),
        Err(_) => EnvFilter::new(filter_directives(level)),
    }
}

/// Install the stderr subscriber. `ESHIM_LOG` wins over `--log-level`.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let verbose = matches!(level, LogLevel::Debug | LogLevel::Trace);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level))
        .with_ansi(false)
        .with_target(verbose)
        .with_thread_names(verbose);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
