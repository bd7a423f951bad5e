//! Tracing subscriber bootstrap
//!
//! `RUST_LOG` wins when set; otherwise the level follows the environment
//! profile (`debug` in development, `info` elsewhere).

use crate::config::Environment;
use serde::Deserialize;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One human-readable line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

fn filter_for(env: &Environment) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env.default_log_level()))
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(
    format: LogFormat,
    env: &Environment,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = filter_for(env);
    match format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let env = Environment::Production;
        let first = init_tracing(LogFormat::Compact, &env);
        let second = init_tracing(LogFormat::Json, &env);
        // Another test may already have installed a subscriber
        assert!(first.is_err() || second.is_err());
    }
}
