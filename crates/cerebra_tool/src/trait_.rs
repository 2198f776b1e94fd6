//! Interface trait

use crate::compile::{self, CommandLine};
use crate::context::Context;
use crate::invocation::Invocation;
use crate::resolve::{self, OutputPlan, Outputs};
use crate::schema::ToolSchema;
use crate::validate::Validator;
use cerebra_core::{CoreResult, ExecutionError, ResolutionError, ValidationError};
use serde::Serialize;

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    /// Command line that ran
    pub command: String,
    /// Exit code, absent when killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code 0
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// A wrapped command-line tool.
///
/// Implementors supply the schema and the output plan; everything else has
/// a generic default driven by the schema.
pub trait Interface: Send + Sync {
    /// Static schema
    fn schema(&self) -> &ToolSchema;

    /// Interface name
    fn name(&self) -> &str {
        &self.schema().name
    }

    /// Validate an invocation
    ///
    /// # Errors
    ///
    /// Returns the first rule the invocation violates
    fn validate(&self, inv: &Invocation, ctx: &Context) -> Result<(), ValidationError> {
        Validator::new(self.schema(), ctx).validate(inv)
    }

    /// Validate, then compile the command line
    ///
    /// # Errors
    ///
    /// Returns a validation or compile error
    fn compile(&self, inv: &Invocation, ctx: &Context) -> CoreResult<CommandLine> {
        self.validate(inv, ctx)?;
        Ok(compile::compile(self.schema(), inv, ctx)?)
    }

    /// Path rules for the outputs this invocation produces
    ///
    /// # Errors
    ///
    /// Returns error if a path cannot be constructed
    fn output_plan(&self, inv: &Invocation, ctx: &Context) -> Result<OutputPlan, ResolutionError>;

    /// Resolve output paths against the working directory
    ///
    /// # Errors
    ///
    /// Returns error if a path rule is malformed
    fn resolve(&self, inv: &Invocation, ctx: &Context) -> Result<Outputs, ResolutionError> {
        let plan = self.output_plan(inv, ctx)?;
        resolve::resolve(self.name(), &plan, &ctx.workdir)
    }

    /// Extra environment variables for the process
    ///
    /// # Errors
    ///
    /// Returns error if a required variable cannot be determined
    fn environment(&self, _ctx: &Context) -> Result<Vec<(String, String)>, ExecutionError> {
        Ok(Vec::new())
    }

    /// Prepare the working directory before running
    ///
    /// # Errors
    ///
    /// Returns error if staging files fails
    fn prepare(&self, _inv: &Invocation, _ctx: &Context) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// Inspect a successful run for failures the exit code does not report
    ///
    /// # Errors
    ///
    /// Returns error if the output reports a failure
    fn inspect(&self, _output: &ProcessOutput) -> Result<(), ExecutionError> {
        Ok(())
    }
}
