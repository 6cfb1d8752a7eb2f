//! Error types for command execution.
//!
//! All errors implement `std::error::Error` via `thiserror`. A failed
//! command always carries the rendered command line and the raw stderr
//! text so that operators can act on the tool's own diagnostics.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::command::CommandSpec;

/// Result type alias for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// How a child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Process exited with the given code.
    Code(i32),
    /// Process was killed by the given signal.
    Signal(i32),
    /// Neither code nor signal was reported.
    Unknown,
}

impl ExitState {
    /// Returns true for a zero exit code.
    pub fn success(&self) -> bool {
        matches!(self, ExitState::Code(0))
    }

    pub(crate) fn from_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitState::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitState::Signal(signal);
            }
        }
        ExitState::Unknown
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "exit code {}", code),
            ExitState::Signal(signal) => write!(f, "killed by signal {}", signal),
            ExitState::Unknown => f.write_str("unknown exit status"),
        }
    }
}

/// Errors raised while executing a single command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be spawned.
    #[error("Failed to execute '{command}': {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The process ran but did not exit successfully.
    #[error("Error in executing\n$ {command}\n({status})\n\n{stderr}")]
    CommandFailed {
        /// The rendered command line.
        command: String,
        /// Exit code or terminating signal.
        status: ExitState,
        /// Raw diagnostic text of the failing command (stdout and stderr).
        stderr: String,
    },

    /// The command requires elevation but no elevation program is configured.
    #[error("Command '{command}' requires elevation but elevation is unavailable")]
    ElevationUnavailable {
        /// The rendered command line.
        command: String,
    },
}

impl ExecError {
    /// Returns the exit state when the process ran to completion.
    pub fn exit_state(&self) -> Option<ExitState> {
        match self {
            ExecError::CommandFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the stderr diagnostics, if the process produced any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// A pipeline aborted on the first failure not covered by its ignore predicate.
#[derive(Debug, Error)]
#[error("Step {step_index} ({step}) failed: {source}")]
pub struct PipelineError {
    /// Zero-based position of the failing step in the plan.
    pub step_index: usize,
    /// The failing command.
    pub step: CommandSpec,
    /// Why the command failed.
    #[source]
    pub source: ExecError,
}
