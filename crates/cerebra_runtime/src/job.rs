//! Per-invocation lifecycle.
//!
//! A job moves strictly forward through
//! `Unvalidated → Validated → Compiled → Executed → Resolved`.
//! Any failure moves it to `Failed` and no further stage may run.

use crate::executor::Executor;
use cerebra_core::{CoreError, CoreResult, Fingerprint};
use cerebra_tool::{resolve, CommandLine, Context, Interface, Invocation, Outputs, ProcessOutput};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Lifecycle stage of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    /// Created, not yet checked
    Unvalidated,
    /// Passed schema validation
    Validated,
    /// Command line compiled
    Compiled,
    /// Process exited successfully
    Executed,
    /// Outputs resolved and verified
    Resolved,
    /// A stage failed
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unvalidated => "unvalidated",
            Self::Validated => "validated",
            Self::Compiled => "compiled",
            Self::Executed => "executed",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One invocation of one interface
pub struct Job {
    interface: Arc<dyn Interface>,
    invocation: Invocation,
    stage: Stage,
    command: Option<CommandLine>,
    process: Option<ProcessOutput>,
    outputs: Option<Outputs>,
}

impl Job {
    /// Create a job
    #[must_use]
    pub fn new(interface: Arc<dyn Interface>, invocation: Invocation) -> Self {
        Self {
            interface,
            invocation,
            stage: Stage::Unvalidated,
            command: None,
            process: None,
            outputs: None,
        }
    }

    /// Current stage
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The invocation
    #[must_use]
    pub const fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Compiled command line, once compiled
    #[must_use]
    pub const fn command(&self) -> Option<&CommandLine> {
        self.command.as_ref()
    }

    /// Captured process output, once executed
    #[must_use]
    pub const fn process(&self) -> Option<&ProcessOutput> {
        self.process.as_ref()
    }

    /// Resolved outputs, once resolved
    #[must_use]
    pub const fn outputs(&self) -> Option<&Outputs> {
        self.outputs.as_ref()
    }

    /// Fingerprint of the invocation
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.invocation.fingerprint()
    }

    fn expect(&self, stage: Stage) -> CoreResult<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(CoreError::InvalidState {
                expected: stage.to_string(),
                found: self.stage.to_string(),
            })
        }
    }

    fn advance<T>(&mut self, result: CoreResult<T>, next: Stage) -> CoreResult<T> {
        match result {
            Ok(value) => {
                tracing::debug!(tool = %self.interface.name(), stage = %next, "job advanced");
                self.stage = next;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(tool = %self.interface.name(), error = %err, "job failed");
                self.stage = Stage::Failed;
                Err(err)
            }
        }
    }

    /// Validate the invocation
    ///
    /// # Errors
    ///
    /// Returns error if out of order or validation fails
    pub fn validate(&mut self, ctx: &Context) -> CoreResult<()> {
        self.expect(Stage::Unvalidated)?;
        let result = self
            .interface
            .validate(&self.invocation, ctx)
            .map_err(CoreError::from);
        self.advance(result, Stage::Validated)
    }

    /// Compile the command line
    ///
    /// # Errors
    ///
    /// Returns error if out of order or compilation fails
    pub fn compile(&mut self, ctx: &Context) -> CoreResult<&CommandLine> {
        self.expect(Stage::Validated)?;
        let result = self.interface.compile(&self.invocation, ctx);
        let line = self.advance(result, Stage::Compiled)?;
        Ok(self.command.insert(line))
    }

    /// Prepare the working directory, run the process, and inspect its
    /// output
    ///
    /// # Errors
    ///
    /// Returns error if out of order or execution fails
    pub fn execute(&mut self, ctx: &Context, executor: &Executor) -> CoreResult<&ProcessOutput> {
        self.expect(Stage::Compiled)?;
        let result = self.spawn(ctx, executor);
        let output = self.advance(result, Stage::Executed)?;
        Ok(self.process.insert(output))
    }

    fn spawn(&self, ctx: &Context, executor: &Executor) -> CoreResult<ProcessOutput> {
        let line = self.command.as_ref().ok_or_else(|| CoreError::InvalidState {
            expected: Stage::Compiled.to_string(),
            found: self.stage.to_string(),
        })?;
        self.interface.prepare(&self.invocation, ctx)?;
        let env = self.interface.environment(ctx)?;
        let output = executor.run(line, ctx, &env)?;
        self.interface.inspect(&output)?;
        Ok(output)
    }

    /// Resolve outputs and verify the expected ones exist
    ///
    /// # Errors
    ///
    /// Returns error if out of order or an expected output is missing
    pub fn resolve(&mut self, ctx: &Context) -> CoreResult<&Outputs> {
        self.expect(Stage::Executed)?;
        let result = self
            .interface
            .resolve(&self.invocation, ctx)
            .and_then(|outputs| resolve::verify(self.interface.schema(), &outputs).map(|()| outputs))
            .map_err(CoreError::from);
        let outputs = self.advance(result, Stage::Resolved)?;
        Ok(self.outputs.insert(outputs))
    }

    /// Run every remaining stage
    ///
    /// # Errors
    ///
    /// Returns the first stage failure
    pub fn run(&mut self, ctx: &Context, executor: &Executor) -> CoreResult<Outputs> {
        tracing::info!(
            tool = %self.interface.name(),
            fingerprint = %self.fingerprint(),
            "running job"
        );
        self.validate(ctx)?;
        self.compile(ctx)?;
        self.execute(ctx, executor)?;
        self.resolve(ctx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebra_core::{ExecutionError, ResolutionError, ValidationError};
    use cerebra_tool::{
        Field, FieldKind, OutputDescriptor, OutputPlan, ToolFamily, ToolSchema,
    };

    struct Touch {
        schema: ToolSchema,
    }

    impl Touch {
        fn new() -> Self {
            Self {
                schema: ToolSchema::new("Touch", "touch", ToolFamily::FreeSurfer)
                    .with_field(
                        Field::new("out_file", FieldKind::file())
                            .argstr("%s")
                            .position(0)
                            .mandatory(),
                    )
                    .with_field(Field::new("expect", FieldKind::file()))
                    .with_output(OutputDescriptor::file("out_file"))
                    .with_output(OutputDescriptor::file("expected")),
            }
        }
    }

    impl Interface for Touch {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        fn output_plan(
            &self,
            inv: &Invocation,
            ctx: &Context,
        ) -> Result<OutputPlan, ResolutionError> {
            let mut plan = OutputPlan::new();
            if let Some(out) = self.schema.value_of("out_file", inv, ctx) {
                plan = plan.fixed("out_file", out.to_string());
            }
            if let Some(expected) = inv.get("expect") {
                plan = plan.fixed("expected", expected.to_string());
            }
            Ok(plan)
        }

        fn inspect(&self, output: &ProcessOutput) -> Result<(), ExecutionError> {
            if output.stdout.contains("boom") {
                return Err(ExecutionError::MissingDependency {
                    tool: "Touch".to_string(),
                    dependency: "boom".to_string(),
                    detail: output.stdout.clone(),
                });
            }
            Ok(())
        }
    }

    fn job(inv: Invocation) -> Job {
        Job::new(Arc::new(Touch::new()), inv)
    }

    #[test]
    fn test_job_runs_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path());
        let mut job = job(Invocation::new("Touch").with("out_file", "made.txt"));

        let outputs = job.run(&ctx, &Executor::new()).unwrap();
        assert_eq!(job.stage(), Stage::Resolved);
        assert_eq!(job.command().unwrap().cmdline(), "touch made.txt");
        assert_eq!(job.process().unwrap().exit_code, Some(0));
        assert_eq!(outputs.file("out_file"), Some(dir.path().join("made.txt").as_path()));
        assert!(dir.path().join("made.txt").exists());
    }

    #[test]
    fn test_job_validation_failure_halts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path());
        let mut job = job(Invocation::new("Touch"));

        let err = job.validate(&ctx).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingMandatory { .. })
        ));
        assert_eq!(job.stage(), Stage::Failed);
        assert!(matches!(job.compile(&ctx), Err(CoreError::InvalidState { .. })));
        assert!(job.command().is_none());
    }

    #[test]
    fn test_job_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path());
        let mut job = job(Invocation::new("Touch").with("out_file", "a.txt"));

        let err = job.execute(&ctx, &Executor::new()).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidState {
                expected: "compiled".to_string(),
                found: "unvalidated".to_string(),
            }
        );
        assert_eq!(job.stage(), Stage::Unvalidated);
    }

    #[test]
    fn test_job_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path());
        let mut job = job(
            Invocation::new("Touch")
                .with("out_file", "a.txt")
                .with("expect", "never.txt"),
        );

        let err = job.run(&ctx, &Executor::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Resolution(ResolutionError::MissingOutput { .. })
        ));
        assert_eq!(job.stage(), Stage::Failed);
        assert!(job.outputs().is_none());
    }

    #[test]
    fn test_job_inspect_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path());
        let mut job = job(Invocation::new("Touch").with("out_file", "a.txt; echo boom"));

        let err = job.run(&ctx, &Executor::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Execution(ExecutionError::MissingDependency { .. })
        ));
        assert_eq!(job.stage(), Stage::Failed);
    }

    #[test]
    fn test_job_fingerprint() {
        let a = job(Invocation::new("Touch").with("out_file", "a.txt"));
        let b = job(Invocation::new("Touch").with("out_file", "a.txt"));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
