use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogOptions {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub default_path: Option<PathBuf>,
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogResult {
    pub canceled: bool,
    pub selected_paths: Vec<PathBuf>,
}

impl DialogResult {
    pub fn canceled() -> Self {
        Self {
            canceled: true,
            selected_paths: Vec::new(),
        }
    }

    pub fn selected(paths: Vec<PathBuf>) -> Self {
        if paths.is_empty() {
            return Self::canceled();
        }
        Self {
            canceled: false,
            selected_paths: paths,
        }
    }
}

#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn choose_directory(&self, options: DialogOptions) -> DialogResult;
}

/// Asks on the controlling terminal. An empty answer cancels.
#[derive(Debug, Default, Clone)]
pub struct TerminalPicker;

#[async_trait]
impl DirectoryPicker for TerminalPicker {
    async fn choose_directory(&self, options: DialogOptions) -> DialogResult {
        let title = options.title.as_deref().unwrap_or("Choose a directory");
        let hint = options
            .default_path
            .as_ref()
            .map(|p| format!(" [{}]", p.display()))
            .unwrap_or_default();

        let mut stderr = tokio::io::stderr();
        if stderr
            .write_all(format!("{}{}: ", title, hint).as_bytes())
            .await
            .is_err()
        {
            return DialogResult::canceled();
        }
        let _ = stderr.flush().await;

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if stdin.read_line(&mut line).await.is_err() {
            return DialogResult::canceled();
        }

        let answer = line.trim();
        let paths: Vec<PathBuf> = if answer.is_empty() {
            options.default_path.into_iter().collect()
        } else if options.multiple {
            answer.split(',').map(|p| PathBuf::from(p.trim())).collect()
        } else {
            vec![PathBuf::from(answer)]
        };

        DialogResult::selected(paths.into_iter().filter(|p| p.is_dir()).collect())
    }
}

/// For front-ends that own stdin and have no dialog of their own.
#[derive(Debug, Default, Clone)]
pub struct UnavailablePicker;

#[async_trait]
impl DirectoryPicker for UnavailablePicker {
    async fn choose_directory(&self, _options: DialogOptions) -> DialogResult {
        tracing::warn!("No directory picker available in this front-end");
        DialogResult::canceled()
    }
}

/// System folder dialog.
#[cfg(feature = "native-dialogs")]
#[derive(Debug, Default, Clone)]
pub struct NativePicker;

#[cfg(feature = "native-dialogs")]
#[async_trait]
impl DirectoryPicker for NativePicker {
    async fn choose_directory(&self, options: DialogOptions) -> DialogResult {
        let picked = tokio::task::spawn_blocking(move || {
            let mut dialog = rfd::FileDialog::new();
            if let Some(title) = &options.title {
                dialog = dialog.set_title(title);
            }
            if let Some(dir) = &options.default_path {
                dialog = dialog.set_directory(dir);
            }
            if options.multiple {
                dialog.pick_folders()
            } else {
                dialog.pick_folder().map(|p| vec![p])
            }
        })
        .await;

        match picked {
            Ok(Some(paths)) => DialogResult::selected(paths),
            Ok(None) => DialogResult::canceled(),
            Err(err) => {
                tracing::error!("Folder dialog task failed: {}", err);
                DialogResult::canceled()
            }
        }
    }
}
