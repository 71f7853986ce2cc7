use std::path::{Path, PathBuf};

/// Creates the data directory (and parents) if it does not exist yet.
pub async fn ensure_data_directory(path: &Path) -> std::io::Result<()> {
    if tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(());
    }
    tracing::info!("Creating data directory {}", path.display());
    tokio::fs::create_dir_all(path).await
}

pub fn version_manifest_path(data_dir: &Path, version: &str) -> PathBuf {
    data_dir
        .join("versions")
        .join(version)
        .join(format!("{}.json", version))
}

/// A version counts as installed once its manifest has been written.
pub fn is_version_installed(data_dir: &Path, version: &str) -> bool {
    if version.is_empty() {
        return false;
    }
    version_manifest_path(data_dir, version).is_file()
}
