//! Application configuration loading and validation.
//!
//! Configuration is read from a TOML file; every section is optional.
//!
//! # Example
//!
//! ```no_run
//! use devcluster::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("devcluster.toml")?;
//!     config.logging.init();
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::timing::TimingConfig;
use crate::application::registry::RegistryDefaults;
use crate::domain::registry::{DEFAULT_LISTEN_ADDRESS, DEFAULT_REGISTRY_IMAGE};
use crate::error::{ConfigError, Result};

/// Defaults for registries that leave fields unset.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    pub default_image: String,
    pub default_listen_address: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_image: DEFAULT_REGISTRY_IMAGE.to_string(),
            default_listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn defaults(&self) -> RegistryDefaults {
        RegistryDefaults {
            image: self.default_image.clone(),
            listen_address: self.default_listen_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubeconfigConfig {
    /// Kubeconfig to manage. Unset means `KUBECONFIG`, then `~/.kube/config`.
    pub path: Option<PathBuf>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub timing: TimingConfig,
    pub registry: RegistryConfig,
    pub kubeconfig: KubeconfigConfig,
}

impl Config {
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// `$XDG_CONFIG_HOME/devcluster/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("devcluster").join("config.toml"))
    }

    /// Load `explicit`, or the default file if it exists, or defaults.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("poll_interval_ms", self.timing.poll_interval_ms),
            ("engine_start_timeout_secs", self.timing.engine_start_timeout_secs),
            ("engine_restart_timeout_secs", self.timing.engine_restart_timeout_secs),
            ("cluster_ready_timeout_secs", self.timing.cluster_ready_timeout_secs),
            ("status_concurrency", self.timing.status_concurrency as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than 0".to_string(),
                }
                .into());
            }
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "format",
                reason: format!("expected pretty or json, got {:?}", self.logging.format),
            }
            .into());
        }
        if self.registry.default_image.is_empty() {
            return Err(ConfigError::MissingField {
                field: "default_image",
            }
            .into());
        }
        Ok(())
    }
}
