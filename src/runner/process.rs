//! Shell command runner
//!
//! Runs an operation's command line through the platform shell:
//! - Combined stdout/stderr captured to a per-attempt log file
//! - Timeout enforcement (child killed, `ExitStatus::TimedOut`)
//! - Spawn failures mapped to shell conventions (126 / 127)

use crate::errors::{OrchestratorError, Result};
use crate::runner::{CommandRunner, RunRequest};
use crate::types::{ExecutionResult, ExitStatus, LogRef};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runner that executes commands via `sh -c` (`cmd /C` on Windows)
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    /// Directory receiving one log file per attempt
    log_dir: PathBuf,

    /// Shell invoked with `-c` instead of the platform default
    shell: Option<String>,
}

impl ShellCommandRunner {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            shell: None,
        }
    }

    /// Use a specific shell (e.g. "bash")
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn log_path(&self, request: &RunRequest) -> PathBuf {
        let stem: String = request
            .operation
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.log_dir.join(format!(
            "{}_{}_{}.log",
            stem,
            request.attempt,
            Utc::now().timestamp()
        ))
    }

    fn shell_command(&self, command: &str) -> Command {
        if let Some(shell) = &self.shell {
            let mut c = Command::new(shell);
            c.arg("-c");
            c.arg(command);
            return c;
        }

        #[cfg(unix)]
        {
            let mut c = Command::new("sh");
            c.arg("-c");
            c.arg(command);
            c
        }
        #[cfg(windows)]
        {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c.arg(command);
            c
        }
    }

    /// Capture output; an unwritable log leaves the result without one
    async fn write_log(path: &Path, content: &str) -> Option<LogRef> {
        match tokio::fs::write(path, content).await {
            Ok(()) => Some(LogRef::new(path.to_string_lossy())),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write command log");
                None
            }
        }
    }
}

#[cfg(unix)]
fn status_of(status: std::process::ExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => ExitStatus::Code(code),
        (None, Some(signal)) => ExitStatus::Signal(signal),
        (None, None) => ExitStatus::Code(-1),
    }
}

#[cfg(not(unix))]
fn status_of(status: std::process::ExitStatus) -> ExitStatus {
    ExitStatus::Code(status.code().unwrap_or(-1))
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, request: &RunRequest) -> Result<ExecutionResult> {
        let start = Instant::now();

        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            warn!(log_dir = %self.log_dir.display(), error = %e, "failed to create log dir");
        }
        let log_path = self.log_path(request);

        let mut cmd = self.shell_command(&request.command);
        cmd.current_dir(&request.working_dir)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            operation = %request.operation,
            attempt = request.attempt,
            command = %request.command,
            "spawning command"
        );

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let code = match e.kind() {
                    ErrorKind::PermissionDenied => 126,
                    ErrorKind::NotFound => 127,
                    _ => -1,
                };
                let message = format!("Failed to execute command: {}", e);
                let log = Self::write_log(&log_path, &message).await;
                let mut result = ExecutionResult::new(
                    request.operation.clone(),
                    request.attempt,
                    ExitStatus::Code(code),
                    log,
                    start.elapsed(),
                );
                result.detail = Some(message);
                return Ok(result);
            }
        };

        match timeout(request.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let combined_output = if stderr.is_empty() {
                    stdout.into_owned()
                } else {
                    format!("STDOUT:\n{}\n\nSTDERR:\n{}", stdout, stderr)
                };

                let log = Self::write_log(&log_path, &combined_output).await;
                Ok(ExecutionResult::new(
                    request.operation.clone(),
                    request.attempt,
                    status_of(output.status),
                    log,
                    start.elapsed(),
                ))
            }
            Ok(Err(e)) => Err(OrchestratorError::RunnerError(format!(
                "Failed to wait for '{}': {}",
                request.operation, e
            ))),
            Err(_) => {
                // Dropping the wait future killed the child (kill_on_drop)
                let message = format!("Command timed out after {}s", request.timeout.as_secs_f64());
                let log = Self::write_log(&log_path, &message).await;
                let mut result = ExecutionResult::new(
                    request.operation.clone(),
                    request.attempt,
                    ExitStatus::TimedOut,
                    log,
                    start.elapsed(),
                );
                result.detail = Some(message);
                Ok(result)
            }
        }
    }
}
