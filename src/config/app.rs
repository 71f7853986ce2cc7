use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::config::defaults;

/// Runtime configuration of the launcher process itself, separate from the
/// user-facing settings record.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Overrides where the settings record is stored.
    #[serde(default)]
    pub settings_file: Option<PathBuf>,
    pub log_filter: String,
    pub event_capacity: usize,
    pub installer: InstallerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl AppConfig {
    /// Defaults, then `launcher.toml` in the config dir, then `CML_*` env vars.
    pub fn load() -> Result<Self> {
        Self::load_from(&defaults::app_config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .set_default("log_filter", "info")?
            .set_default("event_capacity", defaults::DEFAULT_EVENT_CAPACITY as i64)?
            .set_default("installer.program", defaults::DEFAULT_INSTALLER_PROGRAM)?
            .set_default("installer.args", Vec::<String>::new())?
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("CML").separator("__"))
            .build()
            .with_context(|| format!("failed to load launcher config from {}", path.display()))?;

        config
            .try_deserialize()
            .context("launcher config has an invalid shape")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(defaults::settings_file)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_file: None,
            log_filter: "info".to_string(),
            event_capacity: defaults::DEFAULT_EVENT_CAPACITY,
            installer: InstallerConfig {
                program: defaults::DEFAULT_INSTALLER_PROGRAM.to_string(),
                args: Vec::new(),
            },
        }
    }
}
