//! Application configuration loading

mod app_config;

pub use app_config::{AppConfig, BreakerProfile, BreakerSettings, LogFormat, LoggingConfig};
