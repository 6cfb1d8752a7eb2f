//! Sequential command pipelines.
//!
//! A [`CommandPipeline`] executes a [`ConfigurationPlan`] one step at a
//! time. Step *i+1* is spawned only after step *i* has completed. The first
//! failure not matched by the ignore predicate aborts the remainder of the
//! plan. Completed steps are never undone.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::command::{CommandSpec, ConfigurationPlan, Credential, PlanStep};
use crate::error::PipelineError;
use crate::shell::CommandRunner;

/// Decides whether a failed command is tolerated.
pub type IgnorePredicate = dyn Fn(&CommandSpec) -> bool + Send + Sync;

/// Called when execution reaches a [`PlanStep::Barrier`].
pub type BarrierHook = Arc<dyn Fn() + Send + Sync>;

/// Returns a predicate tolerating failures of commands tagged with any of `tags`.
pub fn ignore_tags<'a>(tags: &'a [&'a str]) -> impl Fn(&CommandSpec) -> bool + Send + Sync + 'a {
    move |cmd| cmd.tag().is_some_and(|tag| tags.contains(&tag))
}

/// Executes plans against a [`CommandRunner`].
#[derive(Clone)]
pub struct CommandPipeline {
    runner: Arc<dyn CommandRunner>,
    barrier: Option<BarrierHook>,
}

impl CommandPipeline {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            barrier: None,
        }
    }

    /// Installs the hook invoked at every barrier step.
    pub fn with_barrier_hook(mut self, hook: BarrierHook) -> Self {
        self.barrier = Some(hook);
        self
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Runs every step of `plan` in order and returns per-step stdout.
    ///
    /// Tolerated failures and barriers contribute an empty string.
    #[instrument(skip_all, fields(steps = plan.len()))]
    pub async fn run(
        &self,
        plan: &ConfigurationPlan,
        ignore: Option<&IgnorePredicate>,
        credential: Option<&Credential>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut outputs = Vec::with_capacity(plan.len());

        for (index, step) in plan.steps().iter().enumerate() {
            let output = match step {
                PlanStep::Barrier => {
                    debug!(step = index, "Barrier reached");
                    if let Some(hook) = &self.barrier {
                        hook();
                    }
                    String::new()
                }
                PlanStep::Run(cmd) => self.run_step(index, cmd, ignore, credential).await?,
                PlanStep::WithFallback { primary, alternate } => {
                    match self.runner.run(primary, credential).await {
                        Ok(out) => out,
                        Err(e) => {
                            info!(
                                step = index,
                                command = %primary,
                                error = %e,
                                "Primary form rejected, retrying with alternate"
                            );
                            self.run_step(index, alternate, ignore, credential).await?
                        }
                    }
                }
            };
            outputs.push(output);
        }

        Ok(outputs)
    }

    async fn run_step(
        &self,
        index: usize,
        cmd: &CommandSpec,
        ignore: Option<&IgnorePredicate>,
        credential: Option<&Credential>,
    ) -> Result<String, PipelineError> {
        match self.runner.run(cmd, credential).await {
            Ok(out) => Ok(out),
            Err(e) if ignore.is_some_and(|tolerated| tolerated(cmd)) => {
                info!(step = index, command = %cmd, error = %e, "Ignoring tolerated failure");
                Ok(String::new())
            }
            Err(source) => Err(PipelineError {
                step_index: index,
                step: cmd.clone(),
                source,
            }),
        }
    }
}
