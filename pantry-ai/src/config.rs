//! Service configuration for pantry-ai
//!
//! Combines the TOML bootstrap file with command-line/environment overrides
//! into the settings used to construct the service's dependencies.

use pantry_common::config::{
    resolve_data_folder, resolve_vision_api_key, StorageConfig, TomlConfig, VisionConfig,
    VisionProvider, DEFAULT_PORT,
};
use pantry_common::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::RetryPolicy;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub data_folder: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub provider: Option<VisionProvider>,
    pub log_level: Option<String>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub data_folder: PathBuf,
    /// Base for URLs handed out by the image store
    pub public_base_url: String,
    pub log_level: String,
    pub vision: VisionConfig,
    pub storage: StorageConfig,
}

impl ServiceConfig {
    /// Apply overrides on top of the TOML configuration
    ///
    /// Priority: CLI/environment > TOML > compiled default.
    pub fn resolve(toml_config: TomlConfig, overrides: ConfigOverrides) -> Self {
        let data_folder = resolve_data_folder(overrides.data_folder.as_deref(), &toml_config);
        let port = overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
        let bind_address = overrides
            .bind_address
            .or(toml_config.bind_address)
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let public_base_url = overrides
            .public_base_url
            .or(toml_config.public_base_url)
            .unwrap_or_else(|| format!("http://{}:{}", bind_address, port))
            .trim_end_matches('/')
            .to_string();

        let mut vision = toml_config.vision;
        if let Some(provider) = overrides.provider {
            vision.provider = provider;
        }

        Self {
            bind_address,
            port,
            data_folder,
            public_base_url,
            log_level: overrides.log_level.unwrap_or(toml_config.logging.level),
            vision,
            storage: toml_config.storage,
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join("pantry.db")
    }

    pub fn storage_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.storage.max_retries, self.storage.initial_backoff_ms)
    }
}

/// Fully resolved vision backend settings
#[derive(Debug, Clone)]
pub struct VisionSettings {
    pub provider: VisionProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl VisionSettings {
    /// Fill provider defaults and resolve the API key
    pub fn resolve(vision: &VisionConfig) -> Result<Self> {
        let api_key = resolve_vision_api_key(vision)?;

        Ok(Self {
            provider: vision.provider,
            model: vision
                .model
                .clone()
                .unwrap_or_else(|| vision.provider.default_model().to_string()),
            base_url: vision
                .base_url
                .clone()
                .unwrap_or_else(|| vision.provider.default_base_url().to_string()),
            api_key,
            timeout: Duration::from_secs(vision.timeout_secs.max(1)),
            max_retries: vision.max_retries,
        })
    }
}
