//! Configuration System
//!
//! Hierarchical configuration with environment variable overrides and
//! runtime validation. Layered lowest to highest: defaults, the XDG
//! config file, a workspace `canopy.toml`, then `CANOPY_*` environment
//! variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::path::TreePath;
use crate::proxy::{Mount, MountTable};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanopyConfig {
    /// Path to the data model definition (TOML schema tree)
    pub model_path: Option<PathBuf>,

    /// Path to seed data loaded into the store at startup
    pub data_path: Option<PathBuf>,

    /// Datastores the server advertises; only "running" is queryable
    #[serde(default = "default_datastores")]
    pub datastores: Vec<String>,

    /// Remote mount configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_datastores() -> Vec<String> {
    vec!["running".to_string()]
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            data_path: None,
            datastores: default_datastores(),
            proxy: ProxyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Remote forwarding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Per-request timeout for remote branches, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Mounted remote stores
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            mounts: Vec::new(),
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One configured mount: a list-instance path routed to an endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    pub path: String,
    pub endpoint: String,
}

impl MountConfig {
    fn to_mount(&self) -> Result<Mount, ConfigError> {
        let prefix = TreePath::parse(&self.path)
            .map_err(|e| ConfigError::Invalid(format!("Mount path {:?}: {}", self.path, e)))?;
        if prefix.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "Mount path {:?} must name a list instance",
                self.path
            )));
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Mount {:?} has an empty endpoint",
                self.path
            )));
        }
        Ok(Mount {
            prefix,
            endpoint: self.endpoint.clone(),
        })
    }
}

impl CanopyConfig {
    /// Load configuration, layering XDG config, workspace file, and
    /// environment overrides over the defaults.
    pub fn load(workspace_root: &Path) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(xdg) = Self::xdg_config_path() {
            builder = builder.add_source(config::File::from(xdg).required(false));
        }
        let workspace_file = workspace_root.join("canopy.toml");
        builder = builder
            .add_source(config::File::from(workspace_file).required(false))
            .add_source(config::Environment::with_prefix("CANOPY").separator("__"));

        let settings = builder.build()?;
        let loaded: CanopyConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load configuration from a single explicit file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()?;
        let loaded: CanopyConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// The XDG config file location, if a home directory is known.
    pub fn xdg_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "canopy")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.datastores.iter().any(|d| d == "running") {
            return Err(ConfigError::Invalid(
                "Datastore list must include \"running\"".to_string(),
            ));
        }
        for mount in &self.proxy.mounts {
            mount.to_mount()?;
        }
        Ok(())
    }

    /// Build the runtime mount table from the proxy section.
    pub fn mount_table(&self) -> Result<MountTable, ConfigError> {
        let mounts = self
            .proxy
            .mounts
            .iter()
            .map(MountConfig::to_mount)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MountTable::new(mounts))
    }
}
