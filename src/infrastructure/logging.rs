//! Tracing subscriber setup, mirroring
//! `infrastructure::logging::logger::LoggerImpl::init`: stdout always on,
//! an optional rolling file sink, level/format driven by `LoggingConfig`.

use std::io;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::domain::error::ConfigError;
use crate::infrastructure::config::LoggingConfig;

/// Holds the non-blocking writer's flush guard alive for the process
/// lifetime; dropping it early would silently stop file output.
pub struct LoggerGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initializes the global tracing subscriber from `config`. Call once, as
/// early as possible in `main`.
pub fn init(config: &LoggingConfig) -> Result<LoggerGuard, ConfigError> {
    let level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let stdout_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format.as_str() {
        "json" => Box::new(tracing_subscriber::fmt::layer().json().with_target(true).with_filter(env_filter.clone())),
        _ => Box::new(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stdout)
                .with_target(true)
                .with_filter(env_filter.clone()),
        ),
    };

    let (file_layer, guard): (Option<Box<dyn Layer<Registry> + Send + Sync>>, Option<WorkerGuard>) =
        match &config.log_dir {
            Some(dir) => {
                let appender = tracing_appender::rolling::daily(dir, "synthline.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                let layer: Box<dyn Layer<Registry> + Send + Sync> = Box::new(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_filter(env_filter),
                );
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

    tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();

    Ok(LoggerGuard { _file_guard: guard })
}

fn parse_level(level: &str) -> Result<Level, ConfigError> {
    level
        .parse()
        .map_err(|_| ConfigError::InvalidValue { field: "logging.level".to_string(), value: level.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_known_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(parse_level(level).is_ok());
        }
    }

    #[test]
    fn parse_level_rejects_unknown_level() {
        assert!(parse_level("verbose").is_err());
    }
}
