//! # Logging
//!
//! `tracing` subscriber setup shared by both binaries.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the level filter; `RUST_LOG` wins over the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber
///
/// Logs always go to stdout. With `dir` set they are also written to a
/// daily-rolling file named after `file_prefix`; keep the returned guard
/// alive until exit or buffered lines are lost.
pub fn init(config: &LoggingConfig, file_prefix: &str) -> Option<WorkerGuard> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt::layer());

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_configured_level() {
        let filter = env_filter("debug");
        assert!(filter.to_string().contains("debug") || std::env::var("RUST_LOG").is_ok());
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        let filter = env_filter("signal_survey=trace,sqlx=warn");
        let rendered = filter.to_string();
        assert!(rendered.contains("signal_survey") || std::env::var("RUST_LOG").is_ok());
    }
}
