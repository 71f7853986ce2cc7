//! Main process controller: owns the settings store, both coordinators and
//! the event bus, and answers requests coming over the message boundary.

pub mod dialog;
pub mod events;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::backend::{ExternalBackend, GameBackend};
use crate::config::schema::{Settings, SettingsPatch, SettingsView};
use crate::config::AppConfig;
use crate::core::fs;
use crate::core::install::{InstallCoordinator, InstallSession};
use crate::core::java::{JavaLocator, JavaPathResult, JavaSearch, SystemJavaSearch};
use crate::core::launch::{GameProcess, LaunchCoordinator, LaunchOutcome, LaunchRequest};
use crate::core::settings::SettingsStore;
use crate::utils::error::{LauncherError, Result};

use dialog::{DialogOptions, DialogResult, DirectoryPicker};
use events::{
    EventBus, InstallOutcome, LauncherEvent, Rejection, Subscription, Surface, SurfaceEvent,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    DetectJava,
    InstallVersion { version: String },
    LaunchVersion(LaunchRequest),
    IsVersionInstalled { version: String },
    GetSettings,
    SaveSettings(SettingsPatch),
    OpenSettings,
    CloseSettings,
    ChooseDirectory(DialogOptions),
}

impl Request {
    /// Requests that may take a while run off the dispatch loop.
    fn is_long_running(&self) -> bool {
        matches!(
            self,
            Request::DetectJava
                | Request::InstallVersion { .. }
                | Request::LaunchVersion(_)
                | Request::ChooseDirectory(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    Java { result: JavaPathResult },
    Install { outcome: InstallOutcome },
    Launch { outcome: LaunchOutcome },
    Installed { installed: bool },
    Settings { settings: SettingsView },
    Directory { result: DialogResult },
    Ack,
    Error { message: String },
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

/// Rejects version strings that are empty or could escape `versions/`.
pub fn validate_version(version: &str) -> std::result::Result<(), String> {
    if version.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    if version.trim() != version {
        return Err("has surrounding whitespace".to_string());
    }
    if version == "." || version == ".." || version.contains(['/', '\\']) {
        return Err("must be a single path component".to_string());
    }
    Ok(())
}

fn invalid_version(version: &str, reason: String) -> Rejection {
    Rejection::InvalidVersion {
        version: version.to_string(),
        reason,
    }
}

pub struct Controller {
    settings: Arc<SettingsStore>,
    java: JavaLocator,
    install: InstallCoordinator,
    launch: LaunchCoordinator,
    events: EventBus,
    picker: Arc<dyn DirectoryPicker>,
    settings_open: Mutex<bool>,
    system_memory_mb: Option<u64>,
}

impl Controller {
    pub fn new(
        settings: Arc<SettingsStore>,
        backend: Arc<dyn GameBackend>,
        java_search: Arc<dyn JavaSearch>,
        picker: Arc<dyn DirectoryPicker>,
        event_capacity: usize,
    ) -> Self {
        let events = EventBus::new(event_capacity);
        Self {
            java: JavaLocator::new(settings.clone(), java_search),
            install: InstallCoordinator::new(backend.clone(), settings.clone(), events.clone()),
            launch: LaunchCoordinator::new(backend, settings.clone(), events.clone()),
            settings,
            events,
            picker,
            settings_open: Mutex::new(false),
            system_memory_mb: system_memory_mb(),
        }
    }

    /// Wires up the production pieces: settings file, external installer
    /// helper and the system Java search.
    pub fn from_config(config: &AppConfig, picker: Arc<dyn DirectoryPicker>) -> Result<Self> {
        let settings = Arc::new(SettingsStore::open(config.settings_path(), Settings::default())?);
        let backend = Arc::new(ExternalBackend::new(&config.installer));
        Ok(Self::new(
            settings,
            backend,
            Arc::new(SystemJavaSearch::new()),
            picker,
            config.event_capacity,
        ))
    }

    /// Creates the data directory if needed. Failure is logged, not fatal.
    pub async fn bootstrap(&self) {
        let data_dir = self.settings.data_directory();
        if let Err(err) = fs::ensure_data_directory(&data_dir).await {
            tracing::error!(
                "Failed to create Minecraft data directory {}: {}",
                data_dir.display(),
                err
            );
        }
        self.events
            .publish(LauncherEvent::Surface(SurfaceEvent::Opened(Surface::Main)));
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn current_install(&self) -> Option<InstallSession> {
        self.install.current()
    }

    pub fn current_game(&self) -> Option<GameProcess> {
        self.launch.current()
    }

    pub fn is_settings_open(&self) -> bool {
        *self.settings_open.lock()
    }

    pub async fn handle(&self, request: Request) -> Response {
        tracing::debug!("Handling {:?}", request);
        match request {
            Request::DetectJava => {
                let result = self.java.detect().await;
                self.events
                    .publish(LauncherEvent::JavaPathResult(result.clone()));
                Response::Java { result }
            }
            Request::InstallVersion { version } => {
                if let Err(reason) = validate_version(&version) {
                    return Response::Install {
                        outcome: self.install.reject(&version, invalid_version(&version, reason)),
                    };
                }
                tracing::info!("Received install request for version: {}", version);
                Response::Install {
                    outcome: self.install.install(&version).await,
                }
            }
            Request::LaunchVersion(request) => {
                if let Err(reason) = validate_version(&request.version) {
                    let reason = invalid_version(&request.version, reason);
                    return Response::Launch {
                        outcome: self.launch.reject(&request.version, reason),
                    };
                }
                tracing::info!(
                    "Received launch request for version: {}, user: {:?}, server: {:?}:{:?}",
                    request.version,
                    request.username,
                    request.server_host,
                    request.server_port
                );
                Response::Launch {
                    outcome: self.launch.launch(request).await,
                }
            }
            Request::IsVersionInstalled { version } => {
                if let Err(reason) = validate_version(&version) {
                    return Response::error(invalid_version(&version, reason).to_string());
                }
                Response::Installed {
                    installed: fs::is_version_installed(&self.settings.data_directory(), &version),
                }
            }
            Request::GetSettings => Response::Settings {
                settings: self.settings_view(),
            },
            Request::SaveSettings(patch) => self.save_settings(patch).await,
            Request::OpenSettings => {
                self.open_settings();
                Response::Ack
            }
            Request::CloseSettings => {
                self.close_settings();
                Response::Ack
            }
            Request::ChooseDirectory(options) => Response::Directory {
                result: self.picker.choose_directory(options).await,
            },
        }
    }

    fn settings_view(&self) -> SettingsView {
        let settings = self.settings.get();
        SettingsView {
            data_directory: settings.minecraft_path,
            max_memory_mb: settings.launcher_settings.max_memory_mb,
            system_memory_mb: self.system_memory_mb,
        }
    }

    /// Validates the patch and creates a new data directory before anything
    /// is stored.
    async fn save_settings(&self, patch: SettingsPatch) -> Response {
        if patch.is_empty() {
            return Response::Ack;
        }

        if let Err(err) = patch.validate(&self.settings.memory()) {
            tracing::warn!("Settings not saved: {}", err);
            return Response::error(err.to_string());
        }

        if let Some(dir) = &patch.data_directory {
            if let Err(err) = fs::ensure_data_directory(dir).await {
                tracing::warn!("Data directory {} is not usable: {}", dir.display(), err);
                return Response::error(format!(
                    "Data directory {} is not usable: {}",
                    dir.display(),
                    err
                ));
            }
        }

        if let Err(err) = self
            .settings
            .run_blocking(move |store| store.apply_patch(&patch))
            .await
        {
            tracing::warn!("Settings not saved: {}", err);
            return Response::error(err.to_string());
        }
        tracing::info!("Settings saved: {:?}", self.settings.get());
        Response::Ack
    }

    /// Opening twice focuses the existing settings surface.
    fn open_settings(&self) {
        let mut open = self.settings_open.lock();
        let event = if *open {
            SurfaceEvent::Focused(Surface::Settings)
        } else {
            *open = true;
            SurfaceEvent::Opened(Surface::Settings)
        };
        drop(open);
        self.events.publish(LauncherEvent::Surface(event));
    }

    fn close_settings(&self) {
        let was_open = std::mem::replace(&mut *self.settings_open.lock(), false);
        if was_open {
            self.events
                .publish(LauncherEvent::Surface(SurfaceEvent::Closed(Surface::Settings)));
        }
    }

    /// Moves the controller onto its own task and returns a cloneable handle.
    pub fn spawn(self) -> ControllerHandle {
        let controller = Arc::new(self);
        let events = controller.events.clone();
        let (tx, mut rx) = mpsc::channel::<Envelope>(64);

        tokio::spawn(async move {
            while let Some(Envelope { request, reply }) = rx.recv().await {
                if request.is_long_running() {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        let _ = reply.send(controller.handle(request).await);
                    });
                } else {
                    let _ = reply.send(controller.handle(request).await);
                }
            }
            tracing::debug!("Controller loop finished");
        });

        ControllerHandle { tx, events }
    }
}

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Surface-side end of the message boundary.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Envelope>,
    events: EventBus,
}

impl ControllerHandle {
    /// Sends a request and waits for its response.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| LauncherError::ControllerClosed)?;
        rx.await.map_err(|_| LauncherError::ControllerClosed)
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}

fn system_memory_mb() -> Option<u64> {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let total = sys.total_memory() / 1024 / 1024;
    (total > 0).then_some(total)
}
