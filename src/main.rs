use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use custom_minecraft_launcher::config::{defaults, AppConfig, SettingsPatch};
use custom_minecraft_launcher::controller::dialog::{DialogOptions, DirectoryPicker, UnavailablePicker};
use custom_minecraft_launcher::controller::events::{
    GameEvent, InstallEvent, InstallOutcome, LauncherEvent,
};
use custom_minecraft_launcher::controller::{Controller, ControllerHandle, Request, Response};
use custom_minecraft_launcher::core::launch::{LaunchOutcome, LaunchRequest};
use custom_minecraft_launcher::ipc;
use custom_minecraft_launcher::utils::logging::init_logging;

#[derive(Parser)]
#[command(name = "custom-launcher", version, about = "Offline Minecraft launcher")]
struct Cli {
    /// Launcher config file (defaults to launcher.toml in the config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect Java and remember its path
    Java,
    /// Download and install a game version
    Install { version: String },
    /// Start an installed game version
    Launch {
        version: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        server_host: Option<String>,
        #[arg(long)]
        server_port: Option<u16>,
        /// Return once the game has started instead of waiting for it to exit
        #[arg(long)]
        detach: bool,
    },
    /// Check whether a version is installed
    Installed { version: String },
    /// Show or change launcher settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Pick a directory
    ChooseDir {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        multiple: bool,
    },
    /// Speak JSON lines on stdin/stdout for an external front-end
    Serve,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        max_memory: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(defaults::app_config_file);
    let config = AppConfig::load_from(&config_path)?;
    init_logging(&config.log_filter);
    tracing::debug!("Loaded launcher config from {}", config_path.display());

    let picker: Arc<dyn DirectoryPicker> = if matches!(cli.command, Commands::Serve) {
        Arc::new(UnavailablePicker)
    } else {
        default_picker()
    };

    let controller = Controller::from_config(&config, picker)
        .context("failed to initialize launcher")?;
    tracing::info!("Settings file: {}", controller.settings().path().display());
    controller.bootstrap().await;
    let handle = controller.spawn();

    match cli.command {
        Commands::Serve => ipc::serve_stdio(handle).await?,
        Commands::Java => match handle.request(Request::DetectJava).await? {
            Response::Java { result } => print_json(&result)?,
            other => unexpected(other)?,
        },
        Commands::Install { version } => install(&handle, version).await?,
        Commands::Launch {
            version,
            username,
            server_host,
            server_port,
            detach,
        } => {
            let request = LaunchRequest {
                version,
                username,
                server_host,
                server_port,
            };
            launch(&handle, request, detach).await?;
        }
        Commands::Installed { version } => {
            match handle
                .request(Request::IsVersionInstalled { version: version.clone() })
                .await?
            {
                Response::Installed { installed } => {
                    println!("{} installed: {}", version, installed);
                }
                other => unexpected(other)?,
            }
        }
        Commands::Settings { action } => settings(&handle, action).await?,
        Commands::ChooseDir { title, multiple } => {
            let options = DialogOptions {
                title,
                default_path: None,
                multiple,
            };
            match handle.request(Request::ChooseDirectory(options)).await? {
                Response::Directory { result } => print_json(&result)?,
                other => unexpected(other)?,
            }
        }
    }

    Ok(())
}

#[cfg(feature = "native-dialogs")]
fn default_picker() -> Arc<dyn DirectoryPicker> {
    Arc::new(custom_minecraft_launcher::controller::dialog::NativePicker)
}

#[cfg(not(feature = "native-dialogs"))]
fn default_picker() -> Arc<dyn DirectoryPicker> {
    Arc::new(custom_minecraft_launcher::controller::dialog::TerminalPicker)
}

async fn install(handle: &ControllerHandle, version: String) -> Result<()> {
    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LauncherEvent::MinecraftInstallProgress(InstallEvent::Update {
                    message,
                    is_error,
                    ..
                }) => {
                    if is_error {
                        eprintln!("{}", message);
                    } else {
                        println!("{}", message);
                    }
                }
                LauncherEvent::MinecraftInstallProgress(InstallEvent::Progress { task, .. }) => {
                    println!("  {} {}/{}", task.path, task.progress, task.total);
                }
                LauncherEvent::MinecraftInstallProgress(InstallEvent::Finished { .. }) => break,
                _ => {}
            }
        }
    });

    let response = handle.request(Request::InstallVersion { version }).await?;
    match response {
        Response::Install { outcome } => {
            // Finished is published before the reply, so the printer ends on its own.
            let _ = printer.await;
            print_json(&outcome)?;
            if outcome != InstallOutcome::Installed {
                bail!("install did not complete");
            }
            Ok(())
        }
        other => {
            printer.abort();
            unexpected(other)
        }
    }
}

async fn launch(handle: &ControllerHandle, request: LaunchRequest, detach: bool) -> Result<()> {
    let mut events = handle.subscribe();
    let version = request.version.clone();

    let outcome = match handle.request(Request::LaunchVersion(request)).await? {
        Response::Launch { outcome } => outcome,
        other => return unexpected(other),
    };
    print_json(&outcome)?;

    match outcome {
        LaunchOutcome::Started { pid } if !detach => {
            println!("Waiting for Minecraft {} (PID {}) to exit...", version, pid);
            while let Some(event) = events.recv().await {
                if let LauncherEvent::Game(GameEvent::Closed(close)) = event {
                    print_json(&close)?;
                    break;
                }
            }
            Ok(())
        }
        LaunchOutcome::Started { .. } => Ok(()),
        LaunchOutcome::Rejected { reason } => bail!("{}", reason),
        LaunchOutcome::Failed { message } => bail!("{}", message),
    }
}

async fn settings(handle: &ControllerHandle, action: SettingsAction) -> Result<()> {
    if let SettingsAction::Set {
        data_dir,
        max_memory,
    } = action
    {
        let patch = SettingsPatch {
            data_directory: data_dir,
            max_memory_mb: max_memory,
        };
        match handle.request(Request::SaveSettings(patch)).await? {
            Response::Ack => {}
            Response::Error { message } => bail!("{}", message),
            other => return unexpected(other),
        }
    }

    match handle.request(Request::GetSettings).await? {
        Response::Settings { settings } => print_json(&settings),
        other => unexpected(other),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn unexpected(response: Response) -> Result<()> {
    match response {
        Response::Error { message } => bail!("{}", message),
        other => bail!("unexpected response: {:?}", other),
    }
}
