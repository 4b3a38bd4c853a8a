//! Logging setup for quorum.
//!
//! Library crates only emit `tracing` events; installing a subscriber is left
//! to the binary (or to tests) through the functions here.

use serde::{Deserialize, Serialize};
use std::fmt as stdfmt;
use std::str::FromStr;

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};
pub use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Output format of the installed subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human-readable, for interactive use
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl stdfmt::Display for LogFormat {
    fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Initialize the global subscriber with JSON output, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() -> InitResult {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    init_with_filter(filter, LogFormat::Json)
}

/// Initialize tracing with a specific level filter
pub fn init_tracing_with_level(level: &str, format: LogFormat) -> InitResult {
    init_with_filter(EnvFilter::try_new(level)?, format)
}

/// Initialize tracing for testing with simplified output
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing_test() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

fn init_with_filter(filter: EnvFilter, format: LogFormat) -> InitResult {
    // Logs go to stderr so command output on stdout stays machine-readable
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_macros() {
        init_tracing_test();
        info!(signers = 2, "test info message");
        debug!("test debug message");
        warn!("test warning message");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default().to_string(), "json");
    }
}
