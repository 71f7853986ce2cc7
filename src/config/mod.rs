pub mod app;
pub mod defaults;
pub mod schema;

pub use app::{AppConfig, InstallerConfig};
pub use schema::{MemoryLimits, SelectedUser, Settings, SettingsPatch, SettingsView};
