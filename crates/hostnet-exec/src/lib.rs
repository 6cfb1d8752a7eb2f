//! Command execution infrastructure for host network configuration.
//!
//! - [`command`]: argv-based command specs, plan steps and plans
//! - [`shell`]: the [`CommandRunner`] seam and the process-backed runner
//! - [`pipeline`]: strictly sequential plan execution with tolerated failures
//! - [`error`]: execution and pipeline errors
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hostnet_exec::{ignore_tags, CommandPipeline, CommandSpec, ConfigurationPlan, ProcessRunner};
//!
//! let plan = ConfigurationPlan::new()
//!     .then(CommandSpec::new("nmcli", ["connection", "down", "c"]).elevated().with_tag("down"))
//!     .then(CommandSpec::new("nmcli", ["connection", "up", "c"]).elevated());
//! let pipeline = CommandPipeline::new(Arc::new(ProcessRunner::new()));
//! pipeline.run(&plan, Some(&ignore_tags(&["down"])), Some(&credential)).await?;
//! ```

pub mod command;
pub mod error;
pub mod pipeline;
pub mod shell;

pub use command::{shellquote, CommandSpec, ConfigurationPlan, Credential, PlanStep};
pub use error::{ExecError, ExecResult, ExitState, PipelineError};
pub use pipeline::{ignore_tags, BarrierHook, CommandPipeline, IgnorePredicate};
pub use shell::{CommandOutput, CommandRunner, ProcessRunner, SUDO_CMD};
