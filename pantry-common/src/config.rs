//! Configuration loading and data folder resolution
//!
//! Bootstrap settings come from a TOML file. A missing file is not fatal:
//! a warning is logged and compiled defaults are used. Individual settings
//! are resolved with the priority CLI argument > environment > TOML >
//! compiled default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "PANTRY_DATA_FOLDER";

/// Default HTTP port for pantry-ai
pub const DEFAULT_PORT: u16 = 5731;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Address to bind, e.g. "127.0.0.1"
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Folder holding pantry.db and pantry_images/
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Externally reachable base URL for stored images
    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Which vision backend adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionProvider {
    /// Chat-completion API taking an image URL
    #[default]
    OpenAi,
    /// Generate-content API taking inline base64 bytes
    Gemini,
}

impl VisionProvider {
    /// Environment variable conventionally holding this provider's key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "OPENAI_API_KEY",
            VisionProvider::Gemini => "GOOGLE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "gpt-4o-mini",
            VisionProvider::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "https://api.openai.com/v1",
            VisionProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl fmt::Display for VisionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionProvider::OpenAi => write!(f, "openai"),
            VisionProvider::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for VisionProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(VisionProvider::OpenAi),
            "gemini" | "google" => Ok(VisionProvider::Gemini),
            other => Err(Error::Config(format!(
                "Unknown vision provider '{}' (expected 'openai' or 'gemini')",
                other
            ))),
        }
    }
}

/// Vision backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub provider: VisionProvider,

    /// Model name; provider default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// API base URL; provider default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key (environment takes priority)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-attempt timeout for a classification call
    #[serde(default = "default_vision_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt, retryable failures only
    #[serde(default = "default_vision_max_retries")]
    pub max_retries: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider: VisionProvider::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: default_vision_timeout_secs(),
            max_retries: default_vision_max_retries(),
        }
    }
}

/// Blob storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_retries: default_storage_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_vision_timeout_secs() -> u64 {
    30
}

fn default_vision_max_retries() -> u32 {
    2
}

fn default_storage_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

/// Load TOML bootstrap configuration
///
/// A missing file yields defaults with a warning. A file that exists but
/// cannot be parsed is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default location of a module's TOML file: `<config dir>/pantry/<module>.toml`
pub fn default_config_path(module_name: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pantry")
        .join(format!("{}.toml", module_name))
}

/// Resolve the data folder
///
/// Priority: CLI argument, then `PANTRY_DATA_FOLDER`, then TOML, then the
/// OS-dependent default.
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    get_default_data_folder()
}

/// OS-dependent default data folder
pub fn get_default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pantry"))
        .unwrap_or_else(|| PathBuf::from("./pantry_data"))
}

/// Resolve the vision API key
///
/// Priority: `PANTRY_VISION_API_KEY`, the provider's conventional variable
/// (`OPENAI_API_KEY` / `GOOGLE_API_KEY`), then TOML.
pub fn resolve_vision_api_key(vision: &VisionConfig) -> Result<String> {
    let candidates = [
        ("PANTRY_VISION_API_KEY", std::env::var("PANTRY_VISION_API_KEY").ok()),
        (
            vision.provider.api_key_env(),
            std::env::var(vision.provider.api_key_env()).ok(),
        ),
        ("TOML config", vision.api_key.clone()),
    ];

    for (source, key) in candidates {
        if let Some(key) = key {
            if is_valid_key(&key) {
                info!("Vision API key loaded from {}", source);
                return Ok(key.trim().to_string());
            }
        }
    }

    Err(Error::Config(format!(
        "Vision API key not configured for provider '{}'. Set PANTRY_VISION_API_KEY, {}, or [vision] api_key in the TOML config",
        vision.provider,
        vision.provider.api_key_env()
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
