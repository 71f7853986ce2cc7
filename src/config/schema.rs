use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults;
use crate::utils::error::SettingsError;

/// The persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub java_path: Option<PathBuf>,
    pub last_java_check_date: Option<DateTime<Utc>>,
    #[serde(alias = "dataDirectory")]
    pub minecraft_path: PathBuf,
    pub selected_user: SelectedUser,
    pub launcher_settings: MemoryLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectedUser {
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLimits {
    #[serde(rename = "minMemoryMB")]
    pub min_memory_mb: u32,
    #[serde(rename = "maxMemoryMB")]
    pub max_memory_mb: u32,
}

/// Partial edit sent by a settings surface. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, alias = "minecraftPath")]
    pub data_directory: Option<PathBuf>,
    #[serde(default, rename = "maxMemoryMB")]
    pub max_memory_mb: Option<u32>,
}

/// What a settings surface gets back from `get settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub data_directory: PathBuf,
    #[serde(rename = "maxMemoryMB")]
    pub max_memory_mb: u32,
    #[serde(rename = "systemMemoryMB", default, skip_serializing_if = "Option::is_none")]
    pub system_memory_mb: Option<u64>,
}

impl Settings {
    pub fn data_directory(&self) -> &PathBuf {
        &self.minecraft_path
    }

    /// Applies a patch after validating all of it; nothing changes on error.
    pub fn apply(&mut self, patch: &SettingsPatch) -> Result<(), SettingsError> {
        patch.validate(&self.launcher_settings)?;

        if let Some(dir) = &patch.data_directory {
            self.minecraft_path = dir.clone();
        }
        if let Some(max) = patch.max_memory_mb {
            self.launcher_settings.max_memory_mb = max;
        }
        Ok(())
    }
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.data_directory.is_none() && self.max_memory_mb.is_none()
    }

    pub fn validate(&self, current: &MemoryLimits) -> Result<(), SettingsError> {
        if let Some(dir) = &self.data_directory {
            if dir.as_os_str().is_empty() {
                return Err(SettingsError::Invalid(
                    "data directory must not be empty".to_string(),
                ));
            }
        }

        if let Some(max) = self.max_memory_mb {
            if max < defaults::MIN_MAX_MEMORY_MB {
                return Err(SettingsError::Invalid(format!(
                    "maximum memory must be at least {} MB (got {})",
                    defaults::MIN_MAX_MEMORY_MB,
                    max
                )));
            }
            if max < current.min_memory_mb {
                return Err(SettingsError::Invalid(format!(
                    "maximum memory ({} MB) is below the minimum ({} MB)",
                    max, current.min_memory_mb
                )));
            }
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            java_path: None,
            last_java_check_date: None,
            minecraft_path: defaults::default_data_directory(),
            selected_user: SelectedUser::default(),
            launcher_settings: MemoryLimits::default(),
        }
    }
}

impl Default for SelectedUser {
    fn default() -> Self {
        Self {
            username: defaults::DEFAULT_USERNAME.to_string(),
        }
    }
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            min_memory_mb: defaults::DEFAULT_MIN_MEMORY_MB,
            max_memory_mb: defaults::DEFAULT_MAX_MEMORY_MB,
        }
    }
}
