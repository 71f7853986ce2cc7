use std::path::PathBuf;

pub const DEFAULT_USERNAME: &str = "CRRP_Player";
pub const DEFAULT_MIN_MEMORY_MB: u32 = 1024;
pub const DEFAULT_MAX_MEMORY_MB: u32 = 2048;
/// Lowest `maxMemoryMB` a settings edit may store.
pub const MIN_MAX_MEMORY_MB: u32 = 512;

pub const DEFAULT_INSTALLER_PROGRAM: &str = "mc-installer";
pub const DEFAULT_EVENT_CAPACITY: usize = 2048;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "crrp", "custom-minecraft-launcher")
}

pub fn launcher_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".custom-minecraft-launcher"))
}

pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(launcher_dir)
}

pub fn default_data_directory() -> PathBuf {
    launcher_dir().join("minecraft-data")
}

pub fn settings_file() -> PathBuf {
    launcher_dir().join("settings.json")
}

pub fn app_config_file() -> PathBuf {
    config_dir().join("launcher.toml")
}
