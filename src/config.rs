use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default library identifier for the running platform
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_PATH: &str = "libexpat.1.dylib";
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_PATH: &str = "libexpat.dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_LIBRARY_PATH: &str = "libexpat.so.1";

pub const ENV_CONFIG_FILE: &str = "EXPAT_SHIM_CONFIG";
pub const ENV_LIBRARY_PATH: &str = "EXPAT_SHIM_LIBRARY_PATH";
pub const ENV_DISABLE: &str = "EXPAT_SHIM_DISABLE";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where and whether to load the native library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShimConfig {
    /// Path or platform-standard name handed to the dynamic loader
    pub library_path: PathBuf,
    /// Skip loading entirely; every shim returns its failure value
    pub disabled: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
            disabled: false,
        }
    }
}

impl ShimConfig {
    /// Configuration for an explicit library path
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: path.into(),
            ..Self::default()
        }
    }

    /// Load configuration with precedence: defaults -> file -> environment
    pub fn load() -> Result<Self> {
        Self::load_with(&SystemEnvProvider)
    }

    /// Same as [`ShimConfig::load`] with a custom environment provider
    pub fn load_with(env: &impl EnvProvider) -> Result<Self> {
        if let Some(path) = env.get(ENV_CONFIG_FILE) {
            return Self::load_with_file(Path::new(&path), env);
        }

        let config = Self::find_config_file()?.unwrap_or_default();
        let config = Self::apply_environment_overrides_with(env, config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load an explicit configuration file; the environment still overrides it
    pub fn load_with_file(path: &Path, env: &impl EnvProvider) -> Result<Self> {
        let config = Self::load_from_file(path)?;
        let config = Self::apply_environment_overrides_with(env, config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<ShimConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find a configuration file in the user config directory
    pub fn find_config_file() -> Result<Option<Self>> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(None);
        };
        let app_config_dir = config_dir.join("expat-shim");

        for name in ["expat-shim.toml", "expat-shim.json"] {
            let path = app_config_dir.join(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Self,
    ) -> Result<Self> {
        if let Some(path) = env.get(ENV_LIBRARY_PATH) {
            config.library_path = PathBuf::from(path);
        }

        if let Some(disabled) = env.get(ENV_DISABLE) {
            config.disabled = parse_bool(&disabled).ok_or_else(|| {
                ConfigError::Environment(format!("Invalid {} value: {}", ENV_DISABLE, disabled))
            })?;
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.library_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Library path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
