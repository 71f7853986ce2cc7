use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GameBackend, InstallRequest, ProgressReport, ProgressSink};
use crate::controller::events::{EventBus, InstallEvent, InstallOutcome, LauncherEvent, Rejection};
use crate::core::fs;
use crate::core::settings::SettingsStore;

/// The one install allowed to run at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSession {
    pub version: String,
    pub directory: PathBuf,
}

/// Clears the session slot however the install ends.
struct SessionGuard {
    slot: Arc<Mutex<Option<InstallSession>>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

pub struct InstallCoordinator {
    backend: Arc<dyn GameBackend>,
    settings: Arc<SettingsStore>,
    events: EventBus,
    active: Arc<Mutex<Option<InstallSession>>>,
}

impl InstallCoordinator {
    pub fn new(backend: Arc<dyn GameBackend>, settings: Arc<SettingsStore>, events: EventBus) -> Self {
        Self {
            backend,
            settings,
            events,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn current(&self) -> Option<InstallSession> {
        self.active.lock().clone()
    }

    fn update(&self, version: &str, message: impl Into<String>, is_error: bool) {
        self.events
            .publish(LauncherEvent::MinecraftInstallProgress(InstallEvent::Update {
                version: version.to_string(),
                message: message.into(),
                is_error,
            }));
    }

    fn finish(&self, version: &str, outcome: InstallOutcome) -> InstallOutcome {
        self.events
            .publish(LauncherEvent::MinecraftInstallProgress(InstallEvent::Finished {
                version: version.to_string(),
                outcome: outcome.clone(),
            }));
        outcome
    }

    pub(crate) fn reject(&self, version: &str, reason: Rejection) -> InstallOutcome {
        tracing::warn!("Install of {} rejected: {}", version, reason);
        self.update(version, reason.to_string(), true);
        self.finish(version, InstallOutcome::Rejected { reason })
    }

    /// Installs `version` into the configured data directory.
    ///
    /// Emits progress and update events, then exactly one `Finished`.
    pub async fn install(&self, version: &str) -> InstallOutcome {
        let Some(java_path) = self.settings.java_path() else {
            return self.reject(version, Rejection::JavaNotConfigured);
        };
        let directory = self.settings.data_directory();
        if directory.as_os_str().is_empty() {
            return self.reject(version, Rejection::DataDirectoryNotConfigured);
        }

        let guard = {
            let mut slot = self.active.lock();
            if let Some(running) = slot.as_ref() {
                let reason = Rejection::InstallInProgress {
                    version: running.version.clone(),
                };
                drop(slot);
                return self.reject(version, reason);
            }
            *slot = Some(InstallSession {
                version: version.to_string(),
                directory: directory.clone(),
            });
            SessionGuard {
                slot: self.active.clone(),
            }
        };

        let outcome = self.run_session(version, directory, java_path).await;
        // The slot is free before anyone hears about the terminal event.
        drop(guard);
        self.finish(version, outcome)
    }

    async fn run_session(&self, version: &str, directory: PathBuf, java_path: PathBuf) -> InstallOutcome {
        if let Err(err) = fs::ensure_data_directory(&directory).await {
            let reason = Rejection::DataDirectoryUnavailable {
                path: directory.display().to_string(),
                reason: err.to_string(),
            };
            tracing::warn!("Install of {} rejected: {}", version, reason);
            self.update(version, reason.to_string(), true);
            return InstallOutcome::Rejected { reason };
        }

        tracing::info!("Installing Minecraft {} into {}", version, directory.display());
        self.update(
            version,
            format!(
                "Starting download for Minecraft {} to {}...",
                version,
                directory.display()
            ),
            false,
        );

        let sink = {
            let events = self.events.clone();
            let version = version.to_string();
            ProgressSink::new(move |report| {
                let event = match report {
                    ProgressReport::Task(task) => InstallEvent::Progress {
                        version: version.clone(),
                        task,
                    },
                    ProgressReport::Message(message) => InstallEvent::Update {
                        version: version.clone(),
                        message,
                        is_error: false,
                    },
                };
                events.publish(LauncherEvent::MinecraftInstallProgress(event));
            })
        };

        let request = InstallRequest {
            version: version.to_string(),
            directory: directory.clone(),
            java_path,
        };
        let result = self.backend.resolve_and_install(&request, sink.clone()).await;
        sink.close();

        match result {
            Ok(()) => {
                tracing::info!("Minecraft {} installed", version);
                self.update(
                    version,
                    format!(
                        "Minecraft {} installed successfully to {}.",
                        version,
                        directory.display()
                    ),
                    false,
                );
                InstallOutcome::Installed
            }
            Err(err) => {
                tracing::error!("Install of {} failed: {}", version, err);
                let message = err.to_string();
                self.update(
                    version,
                    format!("Error preparing Minecraft client {}: {}", version, message),
                    true,
                );
                InstallOutcome::Failed { message }
            }
        }
    }
}
