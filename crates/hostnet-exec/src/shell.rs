//! External command execution.
//!
//! [`CommandRunner`] is the seam between plan logic and the operating
//! system. [`ProcessRunner`] spawns commands directly with argv (no shell),
//! elevating through `sudo` when a command asks for it.
//!
//! # Example
//!
//! ```ignore
//! use hostnet_exec::{CommandRunner, CommandSpec, ProcessRunner};
//!
//! let runner = ProcessRunner::new();
//! let out = runner
//!     .run(&CommandSpec::new("nmcli", ["-t", "connection", "show"]), None)
//!     .await?;
//! ```

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::command::{CommandSpec, Credential};
use crate::error::{ExecError, ExecResult, ExitState};

/// Default elevation program.
pub const SUDO_CMD: &str = "sudo";

/// Executes a single command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `cmd` and returns its full stdout.
    ///
    /// Commands flagged with [`CommandSpec::elevated`] are run with
    /// superuser privileges using `credential`.
    async fn run(&self, cmd: &CommandSpec, credential: Option<&Credential>) -> ExecResult<String>;
}

/// Output of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// How the process terminated.
    pub status: ExitState,
    /// Collected stdout text.
    pub stdout: String,
    /// Collected stderr text.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Returns stdout and stderr joined for error messages.
    ///
    /// nmcli prints some failures on stdout, so a failed command reports both.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Spawns real OS processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    sudo_path: Option<String>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    /// Runner that elevates through [`SUDO_CMD`].
    pub fn new() -> Self {
        Self {
            sudo_path: Some(SUDO_CMD.to_string()),
        }
    }

    /// Runner that elevates through the given program.
    pub fn with_sudo_path(path: impl Into<String>) -> Self {
        Self {
            sudo_path: Some(path.into()),
        }
    }

    /// Runner that rejects every elevated command.
    pub fn without_elevation() -> Self {
        Self { sudo_path: None }
    }

    /// Builds the argv actually spawned for `cmd`.
    ///
    /// With a credential the password is fed to `sudo -S` on stdin; without
    /// one `sudo -n` fails instead of prompting.
    pub fn spawn_argv(&self, cmd: &CommandSpec, with_credential: bool) -> ExecResult<Vec<String>> {
        if !cmd.requires_elevation() {
            return Ok(cmd.argv().to_vec());
        }
        let sudo = self
            .sudo_path
            .as_ref()
            .ok_or_else(|| ExecError::ElevationUnavailable {
                command: cmd.command_line(),
            })?;

        let mut argv = vec![sudo.clone()];
        if with_credential {
            argv.extend(["-S".to_string(), "-p".to_string(), String::new()]);
        } else {
            argv.push("-n".to_string());
        }
        argv.push("--".to_string());
        argv.extend(cmd.argv().iter().cloned());
        Ok(argv)
    }

    /// Runs `cmd` and returns its output regardless of exit status.
    pub async fn output(
        &self,
        cmd: &CommandSpec,
        credential: Option<&Credential>,
    ) -> ExecResult<CommandOutput> {
        let line = cmd.command_line();
        let argv = self.spawn_argv(cmd, credential.is_some())?;
        let password = credential.filter(|_| cmd.requires_elevation());

        debug!(command = %line, elevated = cmd.requires_elevation(), "Exec");

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(if password.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            command: line.clone(),
            source,
        })?;

        if let (Some(password), Some(mut stdin)) = (password, child.stdin.take()) {
            let payload = format!("{}\n", password.expose());
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                debug!(command = %line, error = %e, "Elevation prompt was not read");
            }
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr, status) = tokio::join!(
            collect_stream(stdout, "stdout"),
            collect_stream(stderr, "stderr"),
            child.wait()
        );
        let status = status.map_err(|source| ExecError::Spawn {
            command: line.clone(),
            source,
        })?;

        Ok(CommandOutput {
            status: ExitState::from_status(status),
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec, credential: Option<&Credential>) -> ExecResult<String> {
        let output = self.output(cmd, credential).await?;
        if output.success() {
            trace!(command = %cmd, "Command succeeded");
            Ok(output.stdout)
        } else {
            let diagnostics = output.combined_output().trim().to_string();
            warn!(
                command = %cmd,
                status = %output.status,
                stderr = %diagnostics,
                "Command failed"
            );
            Err(ExecError::CommandFailed {
                command: cmd.command_line(),
                status: output.status,
                stderr: diagnostics,
            })
        }
    }
}

/// Reads a child stream line by line until EOF.
async fn collect_stream<R>(reader: Option<R>, stream: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let chunk = String::from_utf8_lossy(&buf);
                trace!(stream, line = %chunk.trim_end(), "Command output");
                collected.push_str(&chunk);
            }
            Err(e) => {
                warn!(stream, error = %e, "Failed to read command output");
                break;
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_argv_plain() {
        let runner = ProcessRunner::new();
        let cmd = CommandSpec::new("nmcli", ["d"]);
        assert_eq!(runner.spawn_argv(&cmd, true).unwrap(), vec!["nmcli", "d"]);
    }

    #[test]
    fn test_spawn_argv_elevated_with_password() {
        let runner = ProcessRunner::new();
        let cmd = CommandSpec::new("nmcli", ["connection", "up", "c"]).elevated();
        assert_eq!(
            runner.spawn_argv(&cmd, true).unwrap(),
            vec!["sudo", "-S", "-p", "", "--", "nmcli", "connection", "up", "c"]
        );
    }

    #[test]
    fn test_spawn_argv_elevated_without_password() {
        let runner = ProcessRunner::with_sudo_path("/usr/bin/sudo");
        let cmd = CommandSpec::new("reboot", Vec::<String>::new()).elevated();
        assert_eq!(
            runner.spawn_argv(&cmd, false).unwrap(),
            vec!["/usr/bin/sudo", "-n", "--", "reboot"]
        );
    }

    #[test]
    fn test_spawn_argv_elevation_unavailable() {
        let runner = ProcessRunner::without_elevation();
        let cmd = CommandSpec::new("reboot", Vec::<String>::new()).elevated();
        assert!(matches!(
            runner.spawn_argv(&cmd, true),
            Err(ExecError::ElevationUnavailable { .. })
        ));
    }

    #[test]
    fn test_command_output_combined() {
        let output = CommandOutput {
            status: ExitState::Code(0),
            stdout: "stdout".to_string(),
            stderr: "stderr".to_string(),
        };
        assert!(output.success());
        assert_eq!(output.combined_output(), "stdout\nstderr");
    }

    #[tokio::test]
    async fn test_run_echo() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(&CommandSpec::new("echo", ["hello"]), None)
            .await
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_run_failure_reports_exit_code_and_stderr() {
        let runner = ProcessRunner::new();
        let cmd = CommandSpec::new("sh", ["-c", "echo oops >&2; exit 42"]);
        match runner.run(&cmd, None).await {
            Err(ExecError::CommandFailed { status, stderr, .. }) => {
                assert_eq!(status, ExitState::Code(42));
                assert_eq!(stderr, "oops");
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_failure_keeps_stdout_diagnostics() {
        let runner = ProcessRunner::new();
        let cmd = CommandSpec::new(
            "sh",
            ["-c", "echo 'Error: unknown connection'; echo warn >&2; exit 10"],
        );
        match runner.run(&cmd, None).await {
            Err(ExecError::CommandFailed { status, stderr, .. }) => {
                assert_eq!(status, ExitState::Code(10));
                assert_eq!(stderr, "Error: unknown connection\n\nwarn");
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_spawn_failure() {
        let runner = ProcessRunner::new();
        let cmd = CommandSpec::new("/nonexistent/hostnet-test-binary", ["x"]);
        assert!(matches!(
            runner.run(&cmd, None).await,
            Err(ExecError::Spawn { .. })
        ));
    }
}
