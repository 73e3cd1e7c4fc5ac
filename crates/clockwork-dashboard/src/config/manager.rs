//! Configuration manager

use std::sync::Arc;
use tokio::sync::RwLock;

use clockwork_core::{
    models::Config,
    storage::{init_config_dir, ConfigStorage},
    Result as CoreResult,
};

/// Config manager error
#[derive(Debug, thiserror::Error)]
pub enum ConfigManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] clockwork_core::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigManagerError>;

/// Manages application configuration
pub struct ConfigManager {
    storage: ConfigStorage,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    pub fn new() -> CoreResult<Self> {
        let config_dir = init_config_dir()?;
        Self::with_storage(ConfigStorage::new(config_dir))
    }

    /// Load the stored config, rejecting one that does not validate.
    pub fn with_storage(storage: ConfigStorage) -> CoreResult<Self> {
        // Load or create default config
        let config = storage.load()?;
        config.validate().map_err(|e| {
            clockwork_core::Error::InvalidData(format!("{}: {}", storage.path().display(), e))
        })?;

        Ok(Self {
            storage,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Overwrite whatever is stored with the defaults, even a config that
    /// no longer loads.
    pub fn reset_to_default(storage: ConfigStorage) -> CoreResult<Self> {
        let config = Config::default();
        storage.save(&config)?;
        tracing::info!("Configuration reset at {}", storage.path().display());

        Ok(Self {
            storage,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// The stored config
    pub async fn get(&self) -> Config {
        self.config.read().await.clone()
    }

    /// The stored config with environment overrides applied; never saved
    pub async fn effective(&self) -> Config {
        self.get().await.with_env_overrides()
    }

    pub async fn update(&self, config: Config) -> Result<Config> {
        config
            .validate()
            .map_err(|e| ConfigManagerError::Invalid(e.to_string()))?;

        self.storage.save(&config)?;

        {
            let mut current = self.config.write().await;
            *current = config.clone();
        }

        tracing::info!("Configuration saved to {}", self.storage.path().display());
        Ok(config)
    }

    pub async fn set_store(&self, url: Option<String>, api_key: Option<String>) -> Result<Config> {
        let mut config = self.get().await;

        if let Some(url) = url {
            config.store.url = url;
        }

        if let Some(key) = api_key {
            config.store.api_key = key;
        }

        self.update(config).await
    }

    pub async fn update_retry_config(
        &self,
        max_attempts: Option<u32>,
        backoff_step_ms: Option<u64>,
    ) -> Result<Config> {
        let mut config = self.get().await;

        if let Some(attempts) = max_attempts {
            config.retry.max_attempts = attempts;
        }

        if let Some(step) = backoff_step_ms {
            config.retry.backoff_step_ms = step;
        }

        self.update(config).await
    }

    pub async fn update_cache_config(&self, range_freshness_secs: u64) -> Result<Config> {
        let mut config = self.get().await;
        config.cache.range_freshness_secs = range_freshness_secs;
        self.update(config).await
    }

    pub async fn set_log_level(&self, log_level: String) -> Result<Config> {
        let mut config = self.get().await;
        config.log.log_level = log_level;
        self.update(config).await
    }
}
