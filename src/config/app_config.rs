use serde::Deserialize;

use crate::domain::breaker::CircuitBreakerConfig;
use crate::domain::query_cache::QueryCacheConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub query_cache: QueryCacheConfig,
    #[serde(default)]
    pub breaker: BreakerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Circuit breaker settings: a named profile plus per-field overrides
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BreakerSettings {
    #[serde(default)]
    pub profile: BreakerProfile,
    pub failure_threshold: Option<u32>,
    pub open_timeout_secs: Option<u64>,
    pub reset_timeout_secs: Option<u64>,
    pub retry_grace_secs: Option<u64>,
    pub resource_limit_sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BreakerProfile {
    /// Strict thresholds for production traffic
    #[default]
    Production,
    /// Tolerant thresholds for local/interactive use
    Local,
}

impl BreakerSettings {
    /// Resolve the profile and overrides into a breaker configuration
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        use std::time::Duration;

        let mut config = match self.profile {
            BreakerProfile::Production => CircuitBreakerConfig::production(),
            BreakerProfile::Local => CircuitBreakerConfig::local(),
        };

        if let Some(threshold) = self.failure_threshold {
            config = config.with_failure_threshold(threshold);
        }
        if let Some(secs) = self.open_timeout_secs {
            config = config.with_open_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.reset_timeout_secs {
            config = config.with_reset_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.retry_grace_secs {
            config = config.with_retry_grace(Duration::from_secs(secs));
        }
        if let Some(rate) = self.resource_limit_sample_rate {
            config = config.with_resource_limit_sample_rate(rate);
        }

        config
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
