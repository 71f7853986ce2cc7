use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::config::schema::{MemoryLimits, Settings, SettingsPatch};
use crate::utils::error::SettingsError;

/// Durable settings record. Every mutation is written to disk before it
/// becomes visible to readers.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    record: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads the record at `path`, or creates it from `defaults` on first run.
    pub fn open(path: impl Into<PathBuf>, defaults: Settings) -> Result<Self, SettingsError> {
        let path = path.into();

        let record = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| SettingsError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            tracing::info!("Creating settings file at {}", path.display());
            persist(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path,
            record: RwLock::new(record),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Settings {
        self.record.read().clone()
    }

    pub fn java_path(&self) -> Option<PathBuf> {
        self.record.read().java_path.clone()
    }

    pub fn data_directory(&self) -> PathBuf {
        self.record.read().minecraft_path.clone()
    }

    pub fn memory(&self) -> MemoryLimits {
        self.record.read().launcher_settings
    }

    pub fn username(&self) -> String {
        self.record.read().selected_user.username.clone()
    }

    /// Runs `f` on a copy of the record, persists the copy and only then
    /// swaps it in. A failed write leaves the in-memory record untouched.
    pub fn update<F>(&self, f: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings) -> Result<(), SettingsError>,
    {
        let mut guard = self.record.write();
        let mut next = guard.clone();
        f(&mut next)?;

        if next != *guard {
            persist(&self.path, &next)?;
            *guard = next;
        }
        Ok(())
    }

    pub fn record_java(&self, java_path: PathBuf, checked_at: DateTime<Utc>) -> Result<(), SettingsError> {
        self.update(|settings| {
            settings.java_path = Some(java_path);
            settings.last_java_check_date = Some(checked_at);
            Ok(())
        })
    }

    pub fn apply_patch(&self, patch: &SettingsPatch) -> Result<(), SettingsError> {
        self.update(|settings| settings.apply(patch))
    }

    /// Runs a mutation on the blocking pool so the file write never stalls
    /// the async workers.
    pub async fn run_blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T, SettingsError>
    where
        F: FnOnce(&SettingsStore) -> Result<T, SettingsError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|err| SettingsError::Write {
                path: self.path.clone(),
                source: std::io::Error::other(err),
            })?
    }
}

fn persist(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let write_err = |source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let content = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}
