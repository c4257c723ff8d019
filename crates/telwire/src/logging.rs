//! Stderr diagnostics for the CLI.
//!
//! Logs always go to stderr so `serve`'s JSON-lines output on stdout stays a
//! clean machine-readable stream regardless of log format or level.

use clap::{Args, ValueEnum};
use tracing::level_filters::LevelFilter;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Log output format.
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Minimum log level.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

impl LogArgs {
    /// Install the global stderr subscriber.
    ///
    /// Targets stay on: with one session thread per sensor connection, the
    /// module path is what tells a session's frame events apart from the
    /// accept loop's. Idempotent; a second call keeps the first subscriber.
    pub fn init(&self) {
        let base = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(LevelFilter::from(self.log_level))
            .with_target(true)
            .with_ansi(false);

        let _ = match self.log_format {
            LogFormat::Text => base.try_init(),
            LogFormat::Json => base.json().flatten_event(true).try_init(),
        };
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
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

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}
