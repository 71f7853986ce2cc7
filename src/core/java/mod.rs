use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::settings::SettingsStore;
use crate::types::platform::Platform;

/// Outcome of a Java probe, as sent to UI surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JavaPathResult {
    Success { path: PathBuf },
    Error { message: String },
}

impl JavaPathResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JavaPathResult::Success { .. })
    }
}

/// Platform search for a Java installation. Returns the Java home directory.
#[async_trait]
pub trait JavaSearch: Send + Sync {
    async fn find_java_home(&self) -> Result<PathBuf, String>;
}

pub fn java_executable(home: &Path, platform: Platform) -> PathBuf {
    home.join("bin").join(platform.java_binary())
}

pub struct JavaLocator {
    settings: Arc<SettingsStore>,
    search: Arc<dyn JavaSearch>,
    platform: Platform,
}

impl JavaLocator {
    pub fn new(settings: Arc<SettingsStore>, search: Arc<dyn JavaSearch>) -> Self {
        Self {
            settings,
            search,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// A cached path is trusted as-is and never re-validated. Only a
    /// successful search touches the settings store.
    pub async fn detect(&self) -> JavaPathResult {
        if let Some(path) = self.settings.java_path() {
            tracing::debug!("Using cached Java path {}", path.display());
            return JavaPathResult::Success { path };
        }

        let home = match self.search.find_java_home().await {
            Ok(home) => home,
            Err(err) => {
                tracing::warn!("Java search failed: {}", err);
                return JavaPathResult::Error {
                    message: format!(
                        "Java not found. Error: {} Please install Java (JDK or JRE 8+) or set JAVA_HOME.",
                        err
                    ),
                };
            }
        };

        let executable = java_executable(&home, self.platform);
        let recorded = executable.clone();
        if let Err(err) = self
            .settings
            .run_blocking(move |store| store.record_java(recorded, chrono::Utc::now()))
            .await
        {
            tracing::error!("Failed to store Java path: {}", err);
            return JavaPathResult::Error {
                message: format!("Java found at {} but could not be saved: {}", executable.display(), err),
            };
        }

        tracing::info!("Detected Java at {}", executable.display());
        JavaPathResult::Success { path: executable }
    }
}

/// Looks at `JAVA_HOME`, then `PATH`, then the usual JVM install roots.
#[derive(Debug, Clone)]
pub struct SystemJavaSearch {
    platform: Platform,
}

impl SystemJavaSearch {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
        }
    }

    fn is_java_home(&self, home: &Path) -> bool {
        java_executable(home, self.platform).is_file()
    }

    fn from_env(&self) -> Option<PathBuf> {
        let home = PathBuf::from(std::env::var_os("JAVA_HOME")?);
        self.is_java_home(&home).then_some(home)
    }

    async fn from_path(&self) -> Option<PathBuf> {
        let output = tokio::process::Command::new(self.platform.lookup_command())
            .arg("java")
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let binary = PathBuf::from(stdout.lines().next()?.trim());
        // /usr/bin/java is usually a symlink chain into the real JDK
        let binary = tokio::fs::canonicalize(&binary).await.unwrap_or(binary);
        let home = binary.parent()?.parent()?.to_path_buf();
        self.is_java_home(&home).then_some(home)
    }

    fn from_known_roots(&self) -> Option<PathBuf> {
        let roots: &[&str] = match self.platform {
            Platform::Linux => &["/usr/lib/jvm", "/usr/java", "/opt/java", "/opt"],
            Platform::MacOS => &["/Library/Java/JavaVirtualMachines"],
            Platform::Windows => &[
                "C:\\Program Files\\Java",
                "C:\\Program Files\\Eclipse Adoptium",
                "C:\\Program Files\\Microsoft",
            ],
        };

        for root in roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            let mut candidates: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .flat_map(|p| [p.join("Contents").join("Home"), p])
                .filter(|p| self.is_java_home(p))
                .collect();
            // Newest-looking install first
            candidates.sort();
            if let Some(home) = candidates.pop() {
                return Some(home);
            }
        }
        None
    }
}

impl Default for SystemJavaSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JavaSearch for SystemJavaSearch {
    async fn find_java_home(&self) -> Result<PathBuf, String> {
        if let Some(home) = self.from_env() {
            return Ok(home);
        }
        if let Some(home) = self.from_path().await {
            return Ok(home);
        }
        self.from_known_roots()
            .ok_or_else(|| "no Java installation on JAVA_HOME, PATH or the standard locations.".to_string())
    }
}
