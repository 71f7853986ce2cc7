//! Narrow seam to the external installer/launcher.
//!
//! Version-manifest resolution, downloads and launch-argument synthesis are
//! not done here. The coordinators only see [`GameBackend`].

mod external;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::schema::MemoryLimits;
use crate::core::auth::OfflineIdentity;
use crate::utils::error::BackendError;

pub use external::ExternalBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub version: String,
    pub directory: PathBuf,
    pub java_path: PathBuf,
}

/// One progress callback from the installer: a named task and its counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub path: String,
    pub progress: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressReport {
    Task(TaskProgress),
    Message(String),
}

type Emit = dyn Fn(ProgressReport) + Send + Sync;

/// Relays installer progress in arrival order until the session closes.
///
/// Reports made after [`ProgressSink::close`] are dropped, so nothing can
/// trail the terminal event of a session.
#[derive(Clone)]
pub struct ProgressSink {
    open: Arc<Mutex<bool>>,
    emit: Arc<Emit>,
}

impl ProgressSink {
    pub fn new<F>(emit: F) -> Self
    where
        F: Fn(ProgressReport) + Send + Sync + 'static,
    {
        Self {
            open: Arc::new(Mutex::new(true)),
            emit: Arc::new(emit),
        }
    }

    /// Returns false once the session is closed.
    pub fn report(&self, report: ProgressReport) -> bool {
        let open = self.open.lock();
        if !*open {
            return false;
        }
        (self.emit)(report);
        true
    }

    pub fn task(&self, task: TaskProgress) -> bool {
        self.report(ProgressReport::Task(task))
    }

    pub fn message(&self, message: impl Into<String>) -> bool {
        self.report(ProgressReport::Message(message.into()))
    }

    pub fn close(&self) {
        *self.open.lock() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Auto-join target. Only built when both host and port are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
}

impl ServerTarget {
    pub fn from_parts(host: Option<&str>, port: Option<u16>) -> Option<Self> {
        match (host, port) {
            (Some(host), Some(port)) if !host.trim().is_empty() => Some(Self {
                host: host.trim().to_string(),
                port,
            }),
            _ => None,
        }
    }
}

/// Everything the external launcher needs to assemble a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub version: String,
    pub game_dir: PathBuf,
    pub java_path: PathBuf,
    pub identity: OfflineIdentity,
    pub memory: MemoryLimits,
    pub server: Option<ServerTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchCommand {
    pub executable: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

#[async_trait]
pub trait GameBackend: Send + Sync {
    /// Resolves `request.version` and installs it into `request.directory`,
    /// reporting progress through `progress` as it goes.
    async fn resolve_and_install(
        &self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<(), BackendError>;

    async fn build_launch_command(&self, spec: &LaunchSpec) -> Result<LaunchCommand, BackendError>;
}
