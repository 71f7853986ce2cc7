#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

use custom_minecraft_launcher::backend::{
    GameBackend, InstallRequest, LaunchCommand, LaunchSpec, ProgressSink, TaskProgress,
};
use custom_minecraft_launcher::config::Settings;
use custom_minecraft_launcher::controller::dialog::UnavailablePicker;
use custom_minecraft_launcher::controller::events::{LauncherEvent, Subscription};
use custom_minecraft_launcher::controller::Controller;
use custom_minecraft_launcher::core::java::JavaSearch;
use custom_minecraft_launcher::core::settings::SettingsStore;
use custom_minecraft_launcher::utils::error::BackendError;

/// Installs succeed after reporting one task and one message. With `gated`
/// set, each install waits for `release` first. Launches run
/// `sh -c <launch_script>` unless `launch_error` or `executable` say otherwise.
#[derive(Default)]
pub struct FakeBackend {
    pub gated: bool,
    pub release: Notify,
    pub installs: AtomicUsize,
    pub install_error: Mutex<Option<String>>,
    pub launch_script: Mutex<String>,
    pub launch_error: Mutex<Option<String>>,
    pub executable: Mutex<Option<PathBuf>>,
    pub specs: Mutex<Vec<LaunchSpec>>,
}

impl FakeBackend {
    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    pub fn set_script(&self, script: &str) {
        *self.launch_script.lock() = script.to_string();
    }

    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.specs.lock().last().cloned()
    }
}

#[async_trait]
impl GameBackend for FakeBackend {
    async fn resolve_and_install(
        &self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<(), BackendError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        progress.task(TaskProgress {
            path: format!("versions/{}/{}.jar", request.version, request.version),
            progress: 1,
            total: 2,
            threads: None,
        });
        progress.message(format!("resolved {}", request.version));

        if self.gated {
            self.release.notified().await;
        }

        if let Some(message) = self.install_error.lock().clone() {
            return Err(BackendError::Failed(message));
        }
        Ok(())
    }

    async fn build_launch_command(&self, spec: &LaunchSpec) -> Result<LaunchCommand, BackendError> {
        self.specs.lock().push(spec.clone());
        if let Some(message) = self.launch_error.lock().clone() {
            return Err(BackendError::Failed(message));
        }
        Ok(LaunchCommand {
            executable: self
                .executable
                .lock()
                .clone()
                .unwrap_or_else(|| PathBuf::from("sh")),
            args: vec!["-c".to_string(), self.launch_script.lock().clone()],
            working_directory: None,
        })
    }
}

/// Counts how often the platform search runs.
pub struct CountingSearch {
    pub calls: AtomicUsize,
    pub result: Result<PathBuf, String>,
}

impl CountingSearch {
    pub fn finding(home: impl Into<PathBuf>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Ok(home.into()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Err(message.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JavaSearch for CountingSearch {
    async fn find_java_home(&self) -> Result<PathBuf, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub settings: Arc<SettingsStore>,
    pub backend: Arc<FakeBackend>,
    pub search: Arc<CountingSearch>,
}

impl Harness {
    pub fn new(java_path: Option<&str>, backend: FakeBackend, search: CountingSearch) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let defaults = Settings {
            java_path: java_path.map(PathBuf::from),
            minecraft_path: dir.path().join("minecraft"),
            ..Settings::default()
        };
        let settings = Arc::new(SettingsStore::open(dir.path().join("settings.json"), defaults).unwrap());

        Self {
            dir,
            settings,
            backend: Arc::new(backend),
            search: Arc::new(search),
        }
    }

    pub fn with_java(backend: FakeBackend) -> Self {
        Self::new(Some("/opt/java/bin/java"), backend, CountingSearch::failing("unused"))
    }

    pub fn controller(&self) -> Controller {
        Controller::new(
            self.settings.clone(),
            self.backend.clone(),
            self.search.clone(),
            Arc::new(UnavailablePicker),
            256,
        )
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("minecraft")
    }

    pub fn settings_file(&self) -> &Path {
        self.settings.path()
    }
}

/// Waits up to ten seconds for an event matching `pred`.
pub async fn wait_for<F>(sub: &mut Subscription, mut pred: F) -> LauncherEvent
where
    F: FnMut(&LauncherEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = sub.recv().await.expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Everything already queued on the subscription.
pub fn drain(sub: &mut Subscription) -> Vec<LauncherEvent> {
    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    events
}
