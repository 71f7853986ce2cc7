use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::BufReader;
use tokio::process::Command;

use super::{GameBackend, InstallRequest, LaunchCommand, LaunchSpec, ProgressSink, TaskProgress};
use crate::config::InstallerConfig;
use crate::utils::error::BackendError;
use crate::utils::lines::LossyLines;

/// Drives an out-of-process installer helper.
///
/// `install` streams one JSON object per stdout line:
/// `{"type":"progress","path":..,"progress":..,"total":..,"threads":..}`,
/// `{"type":"message","message":..}` or `{"type":"error","message":..}`.
/// A non-zero exit status fails the install.
///
/// `launch-command` prints a single `LaunchCommand` object.
#[derive(Debug, Clone)]
pub struct ExternalBackend {
    program: String,
    base_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum HelperLine {
    Progress(TaskProgress),
    Message { message: String },
    Error { message: String },
}

fn parse_helper_line(line: &str) -> Option<HelperLine> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

impl ExternalBackend {
    pub fn new(config: &InstallerConfig) -> Self {
        Self {
            program: config.program.clone(),
            base_args: config.args.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd.stdin(Stdio::null());
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> BackendError {
        BackendError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl GameBackend for ExternalBackend {
    async fn resolve_and_install(
        &self,
        request: &InstallRequest,
        progress: ProgressSink,
    ) -> Result<(), BackendError> {
        let mut cmd = self.command();
        cmd.arg("install")
            .arg("--version")
            .arg(&request.version)
            .arg("--dir")
            .arg(&request.directory)
            .arg("--java")
            .arg(&request.java_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running installer helper {} for {}", self.program, request.version);
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Protocol("installer stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Protocol("installer stderr was not captured".into()))?;

        let stderr_pump = tokio::spawn(async move {
            let mut lines = LossyLines::new(BufReader::new(stderr));
            let mut last = None;
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "installer", "{}", line);
                if !line.trim().is_empty() {
                    last = Some(line);
                }
            }
            last
        });

        let mut last_error = None;
        let mut lines = LossyLines::new(BufReader::new(stdout));
        while let Some(line) = lines.next_line().await? {
            match parse_helper_line(&line) {
                Some(HelperLine::Progress(task)) => {
                    progress.task(task);
                }
                Some(HelperLine::Message { message }) => {
                    progress.message(message);
                }
                Some(HelperLine::Error { message }) => {
                    tracing::warn!(target: "installer", "{}", message);
                    last_error = Some(message);
                }
                None => tracing::debug!(target: "installer", "{}", line),
            }
        }

        let status = child.wait().await?;
        let last_stderr = stderr_pump.await.ok().flatten();

        if status.success() {
            return Ok(());
        }

        Err(BackendError::Failed(last_error.or(last_stderr).unwrap_or_else(|| {
            format!("installer exited with {}", status)
        })))
    }

    async fn build_launch_command(&self, spec: &LaunchSpec) -> Result<LaunchCommand, BackendError> {
        let mut cmd = self.command();
        cmd.arg("launch-command")
            .arg("--version")
            .arg(&spec.version)
            .arg("--dir")
            .arg(&spec.game_dir)
            .arg("--java")
            .arg(&spec.java_path)
            .arg("--username")
            .arg(&spec.identity.username)
            .arg("--uuid")
            .arg(spec.identity.uuid.to_string())
            .arg("--access-token")
            .arg(spec.identity.access_token())
            .arg("--min-memory")
            .arg(spec.memory.min_memory_mb.to_string())
            .arg("--max-memory")
            .arg(spec.memory.max_memory_mb.to_string());

        if let Some(server) = &spec.server {
            cmd.arg("--server-host")
                .arg(&server.host)
                .arg("--server-port")
                .arg(server.port.to_string());
        }

        let output = cmd.output().await.map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BackendError::Failed(if stderr.is_empty() {
                format!("launch-command exited with {}", output.status)
            } else {
                stderr
            }));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| BackendError::Protocol(format!("invalid launch command: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ProgressReport;

    #[test]
    fn parses_progress_lines() {
        let line = r#"{"type":"progress","path":"install.libraries","progress":3,"total":40,"threads":8}"#;
        assert_eq!(
            parse_helper_line(line),
            Some(HelperLine::Progress(TaskProgress {
                path: "install.libraries".into(),
                progress: 3,
                total: 40,
                threads: Some(8),
            }))
        );
    }

    #[test]
    fn parses_messages_and_errors() {
        assert_eq!(
            parse_helper_line(r#"{"type":"message","message":"Version manifest fetched."}"#),
            Some(HelperLine::Message {
                message: "Version manifest fetched.".into()
            })
        );
        assert_eq!(
            parse_helper_line(r#"  {"type":"error","message":"checksum mismatch"}  "#),
            Some(HelperLine::Error {
                message: "checksum mismatch".into()
            })
        );
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(parse_helper_line("Downloading..."), None);
        assert_eq!(parse_helper_line(r#"{"type":"unknown"}"#), None);
        assert_eq!(parse_helper_line(""), None);
    }

    #[test]
    fn launch_command_shape() {
        let cmd: LaunchCommand = serde_json::from_str(
            r#"{"executable":"/usr/bin/java","args":["-Xmx2048M","net.minecraft.client.main.Main"],"workingDirectory":"/games"}"#,
        )
        .unwrap();
        assert_eq!(cmd.args.len(), 2);
        assert_eq!(cmd.working_directory, Some("/games".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let backend = ExternalBackend::new(&InstallerConfig {
            program: "/nonexistent/mc-installer".into(),
            args: Vec::new(),
        });
        let request = InstallRequest {
            version: "1.18.2".into(),
            directory: "/tmp".into(),
            java_path: "/usr/bin/java".into(),
        };

        let err = backend
            .resolve_and_install(&request, ProgressSink::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn relays_helper_output_through_a_shell_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper.sh");
        std::fs::write(
            &script,
            "echo '{\"type\":\"message\",\"message\":\"start\"}'\n\
             echo '{\"type\":\"progress\",\"path\":\"install\",\"progress\":1,\"total\":2}'\n\
             echo '{\"type\":\"error\",\"message\":\"disk full\"}'\n\
             exit 3\n",
        )
        .unwrap();

        let backend = ExternalBackend::new(&InstallerConfig {
            program: "sh".into(),
            args: vec![script.display().to_string()],
        });
        let request = InstallRequest {
            version: "1.18.2".into(),
            directory: dir.path().to_path_buf(),
            java_path: "/usr/bin/java".into(),
        };

        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let sink = ProgressSink::new(move |r| seen_in.lock().push(r));

        let err = backend.resolve_and_install(&request, sink).await.unwrap_err();
        assert!(matches!(err, BackendError::Failed(ref m) if m == "disk full"));
        assert_eq!(seen.lock().len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_does_not_fail_the_install() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper.sh");
        std::fs::write(
            &script,
            "printf 'Downloading caf\\351\\n'\n\
             printf 'caf\\351 \\377\\n' >&2\n\
             echo '{\"type\":\"progress\",\"path\":\"install\",\"progress\":2,\"total\":2}'\n\
             echo '{\"type\":\"message\",\"message\":\"done\"}'\n\
             exit 0\n",
        )
        .unwrap();

        let backend = ExternalBackend::new(&InstallerConfig {
            program: "sh".into(),
            args: vec![script.display().to_string()],
        });
        let request = InstallRequest {
            version: "1.18.2".into(),
            directory: dir.path().to_path_buf(),
            java_path: "/usr/bin/java".into(),
        };

        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let sink = ProgressSink::new(move |r| seen_in.lock().push(r));

        backend.resolve_and_install(&request, sink).await.unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[1], ProgressReport::Message(m) if m == "done"));
    }
}
