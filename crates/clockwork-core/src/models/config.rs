//! Application configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Connection settings for the hosted backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// How long a fetched range stays fresh
    pub range_freshness_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Delay before attempt `n` (0-based) is `n * backoff_step_ms`
    pub backoff_step_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerConfig {
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    pub log_level: String,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.cache.validate()?;
        self.retry.validate()?;
        self.timer.validate()?;
        self.log.validate()?;
        Ok(())
    }

    /// Apply `CLOCKWORK_STORE_URL` / `CLOCKWORK_STORE_KEY` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("CLOCKWORK_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(key) = std::env::var("CLOCKWORK_STORE_KEY") {
            self.store.api_key = key;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            timer: TimerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(Error::Validation("Store URL cannot be empty".to_string()));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Validation(format!(
                "Store URL '{}' must start with http:// or https://",
                url
            )));
        }

        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: String::new(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.range_freshness_secs == 0 {
            return Err(Error::Validation(
                "Range freshness must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn range_freshness(&self) -> Duration {
        Duration::from_secs(self.range_freshness_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            range_freshness_secs: 120,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Validation(
                "Retry attempts must be greater than 0".to_string(),
            ));
        }

        const MAX_ATTEMPTS: u32 = 10;
        if self.max_attempts > MAX_ATTEMPTS {
            return Err(Error::Validation(format!(
                "Too many retry attempts (max {})",
                MAX_ATTEMPTS
            )));
        }

        Ok(())
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 1000,
        }
    }
}

impl TimerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(Error::Validation(
                "Tick period must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { tick_ms: 1000 }
    }
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
