use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Command;

use crate::backend::{GameBackend, LaunchCommand, LaunchSpec, ServerTarget};
use crate::controller::events::{
    EventBus, GameCloseEvent, GameEvent, InstallEvent, LauncherEvent, Rejection,
};
use crate::core::auth::OfflineIdentity;
use crate::core::fs;
use crate::core::settings::SettingsStore;
use crate::utils::lines::LossyLines;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub version: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "serverIp")]
    pub server_host: Option<String>,
    #[serde(default)]
    pub server_port: Option<u16>,
}

impl LaunchRequest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LaunchOutcome {
    Started { pid: u32 },
    Rejected { reason: Rejection },
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Launching,
    Running,
}

/// The single tracked game process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProcess {
    pub version: String,
    pub pid: Option<u32>,
    pub state: GameState,
}

type Slot = Arc<Mutex<Option<GameProcess>>>;

pub struct LaunchCoordinator {
    backend: Arc<dyn GameBackend>,
    settings: Arc<SettingsStore>,
    events: EventBus,
    game: Slot,
}

impl LaunchCoordinator {
    pub fn new(backend: Arc<dyn GameBackend>, settings: Arc<SettingsStore>, events: EventBus) -> Self {
        Self {
            backend,
            settings,
            events,
            game: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.game.lock().is_some()
    }

    pub fn current(&self) -> Option<GameProcess> {
        self.game.lock().clone()
    }

    fn update(&self, version: &str, message: String, is_error: bool) {
        self.events
            .publish(LauncherEvent::MinecraftInstallProgress(InstallEvent::Update {
                version: version.to_string(),
                message,
                is_error,
            }));
    }

    pub(crate) fn reject(&self, version: &str, reason: Rejection) -> LaunchOutcome {
        tracing::warn!("Launch of {} rejected: {}", version, reason);
        self.events.publish(LauncherEvent::Game(GameEvent::Closed(GameCloseEvent {
            version: version.to_string(),
            code: None,
            error: Some(reason.to_string()),
            rejected: Some(reason.clone()),
        })));
        LaunchOutcome::Rejected { reason }
    }

    /// Clears the handle, then reports the failure.
    fn fail(&self, version: &str, message: String) -> LaunchOutcome {
        tracing::error!("Launch of {} failed: {}", version, message);
        self.game.lock().take();
        self.events.publish(LauncherEvent::Game(GameEvent::Closed(GameCloseEvent {
            version: version.to_string(),
            code: None,
            error: Some(message.clone()),
            rejected: None,
        })));
        self.update(version, format!("Error launching Minecraft: {}", message), true);
        LaunchOutcome::Failed { message }
    }

    pub fn launch_spec(&self, request: &LaunchRequest) -> Result<LaunchSpec, Rejection> {
        let settings = self.settings.get();
        let java_path = settings.java_path.clone().ok_or(Rejection::JavaNotConfigured)?;
        let game_dir = settings.minecraft_path.clone();
        if game_dir.as_os_str().is_empty() {
            return Err(Rejection::DataDirectoryNotConfigured);
        }

        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or(settings.selected_user.username);

        Ok(LaunchSpec {
            version: request.version.clone(),
            game_dir,
            java_path,
            identity: OfflineIdentity::new(username),
            memory: settings.launcher_settings,
            server: ServerTarget::from_parts(request.server_host.as_deref(), request.server_port),
        })
    }

    /// Starts the game. Emits at most one `Started` and exactly one `Closed`.
    pub async fn launch(&self, request: LaunchRequest) -> LaunchOutcome {
        let version = request.version.clone();

        {
            let mut slot = self.game.lock();
            if slot.is_some() {
                drop(slot);
                return self.reject(&version, Rejection::AlreadyRunning { version: version.clone() });
            }
            *slot = Some(GameProcess {
                version: version.clone(),
                pid: None,
                state: GameState::Launching,
            });
        }

        let spec = match self.launch_spec(&request) {
            Ok(spec) => spec,
            Err(reason) => {
                self.game.lock().take();
                return self.reject(&version, reason);
            }
        };

        if let Err(err) = fs::ensure_data_directory(&spec.game_dir).await {
            self.game.lock().take();
            return self.reject(
                &version,
                Rejection::DataDirectoryUnavailable {
                    path: spec.game_dir.display().to_string(),
                    reason: err.to_string(),
                },
            );
        }

        let command = match self.backend.build_launch_command(&spec).await {
            Ok(command) => command,
            Err(err) => return self.fail(&version, err.to_string()),
        };

        self.update(&version, format!("Launching Minecraft {}...", version), false);
        tracing::info!(
            "Launching Minecraft {} as {} ({})",
            version,
            spec.identity.username,
            spec.identity.uuid
        );

        let mut child = match detached_command(&command, &spec).spawn() {
            Ok(child) => child,
            Err(err) => return self.fail(&version, format!("Failed to start game process: {}", err)),
        };

        let pid = child.id().unwrap_or_default();
        if let Some(game) = self.game.lock().as_mut() {
            game.pid = Some(pid);
            game.state = GameState::Running;
        }

        tracing::info!("Minecraft {} started with PID {}", version, pid);
        self.events.publish(LauncherEvent::Game(GameEvent::Started {
            version: version.clone(),
            pid,
        }));
        self.update(
            &version,
            format!("Minecraft {} is running (PID: {}).", version, pid),
            false,
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, version.clone(), false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, version.clone(), true));
        }

        let slot = self.game.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let (code, error) = match child.wait().await {
                Ok(status) => {
                    tracing::info!("Minecraft {} (PID {}) exited with {}", version, pid, status);
                    (status.code(), abnormal_exit(&status))
                }
                Err(err) => {
                    tracing::error!("Error waiting for Minecraft {} (PID {}): {}", version, pid, err);
                    (None, Some(err.to_string()))
                }
            };

            slot.lock().take();
            events.publish(LauncherEvent::Game(GameEvent::Closed(GameCloseEvent {
                version,
                code,
                error,
                rejected: None,
            })));
        });

        LaunchOutcome::Started { pid }
    }
}

fn detached_command(command: &LaunchCommand, spec: &LaunchSpec) -> Command {
    let mut cmd = Command::new(&command.executable);
    cmd.args(&command.args)
        .current_dir(command.working_directory.as_ref().unwrap_or(&spec.game_dir))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

    // Own process group / console so the game outlives the launcher.
    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    cmd
}

/// Game output goes to the log only. Reads until EOF so the child never
/// writes into a closed pipe.
async fn pump_lines<R>(reader: R, version: String, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = LossyLines::new(BufReader::new(reader));
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => {
                tracing::warn!(target: "game", "[MC STDERR - {}]: {}", version, line);
            }
            Ok(Some(line)) => {
                tracing::info!(target: "game", "[MC STDOUT - {}]: {}", version, line);
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(target: "game", "Output of Minecraft {} unreadable: {}", version, err);
                break;
            }
        }
    }
}

#[cfg(unix)]
fn abnormal_exit(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status
        .signal()
        .map(|signal| format!("Game process terminated by signal {}", signal))
}

#[cfg(not(unix))]
fn abnormal_exit(_status: &ExitStatus) -> Option<String> {
    None
}
