use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_rate: u32,
    pub rate_window_ms: u64,
    pub permit_poll_ms: u64,
    pub max_retries: u32,
    pub dispatch_interval_secs: u64,
    pub stale_after_secs: u64,
    pub settle_concurrency: usize,
    pub trigger_buffer_size: usize,
    pub log_filter: String,
    pub mock_provider: MockProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MockProviderSettings {
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub retryable_percent: u32,
    pub permanent_percent: u32,
}

impl Default for MockProviderSettings {
    fn default() -> Self {
        Self {
            min_latency_ms: 50,
            max_latency_ms: 200,
            retryable_percent: 5,
            permanent_percent: 3,
        }
    }
}

/// Retry and recovery policy of the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_retries: u32,
    /// A `PROCESSING` record untouched for longer than this is orphaned.
    pub stale_after: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            stale_after: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    pub interval: Duration,
    pub settle_concurrency: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            settle_concurrency: 1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_rate: 2,
            rate_window_ms: 1000,
            permit_poll_ms: 100,
            max_retries: 3,
            dispatch_interval_secs: 5,
            stale_after_secs: 300,
            settle_concurrency: 1,
            trigger_buffer_size: 1000,
            log_filter: "info".to_string(),
            mock_provider: MockProviderSettings::default(),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Reads a TOML file and layers environment overrides on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?.with_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn with_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mock = self.mock_provider;
        Self {
            max_rate: parse_or(&lookup, "RATE_LIMIT_MAX", self.max_rate),
            rate_window_ms: parse_or(&lookup, "RATE_LIMIT_WINDOW_MS", self.rate_window_ms),
            permit_poll_ms: parse_or(&lookup, "RATE_LIMIT_POLL_MS", self.permit_poll_ms),
            max_retries: parse_or(&lookup, "MAX_RETRIES", self.max_retries),
            dispatch_interval_secs: parse_or(&lookup, "DISPATCH_INTERVAL_SECS", self.dispatch_interval_secs),
            stale_after_secs: parse_or(&lookup, "STALE_AFTER_SECS", self.stale_after_secs),
            settle_concurrency: parse_or(&lookup, "SETTLE_CONCURRENCY", self.settle_concurrency),
            trigger_buffer_size: parse_or(&lookup, "TRIGGER_BUFFER_SIZE", self.trigger_buffer_size),
            log_filter: lookup("RUST_LOG").unwrap_or(self.log_filter),
            mock_provider: MockProviderSettings {
                min_latency_ms: parse_or(&lookup, "MOCK_MIN_LATENCY_MS", mock.min_latency_ms),
                max_latency_ms: parse_or(&lookup, "MOCK_MAX_LATENCY_MS", mock.max_latency_ms),
                retryable_percent: parse_or(&lookup, "MOCK_RETRYABLE_PERCENT", mock.retryable_percent),
                permanent_percent: parse_or(&lookup, "MOCK_PERMANENT_PERCENT", mock.permanent_percent),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rate == 0 {
            return Err(ConfigError::Invalid("max_rate must be at least 1".into()));
        }
        if self.rate_window_ms == 0 || self.dispatch_interval_secs == 0 {
            return Err(ConfigError::Invalid("rate window and dispatch interval must be non-zero".into()));
        }
        if self.settle_concurrency == 0 || self.trigger_buffer_size == 0 {
            return Err(ConfigError::Invalid("settle_concurrency and trigger_buffer_size must be at least 1".into()));
        }
        let mock = &self.mock_provider;
        if mock.min_latency_ms > mock.max_latency_ms {
            return Err(ConfigError::Invalid("mock min latency exceeds max latency".into()));
        }
        if mock.retryable_percent + mock.permanent_percent > 100 {
            return Err(ConfigError::Invalid("mock failure percentages exceed 100".into()));
        }
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn permit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.permit_poll_ms)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_retries: self.max_retries,
            stale_after: Duration::from_secs(self.stale_after_secs),
        }
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            interval: Duration::from_secs(self.dispatch_interval_secs),
            settle_concurrency: self.settle_concurrency,
        }
    }
}
