//! Ambient process concerns: configuration loading and log subscriber setup.
//! Nothing under `domain` or `services` knows either of these modules exist.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigLoader};
pub use logging::LoggerGuard;
