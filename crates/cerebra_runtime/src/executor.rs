//! Subprocess executor.
//!
//! Command lines run through a shell because some tools take quoted
//! composite arguments (`--output "[a,b]"`).

use cerebra_core::ExecutionError;
use cerebra_tool::{CommandLine, Context, ProcessOutput};
use std::process::Command;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shell used to run command lines with `-c`
    pub shell: String,
    /// Start from the parent process environment
    pub inherit_env: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            inherit_env: true,
        }
    }
}

/// Runs command lines and captures their output
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor with a configuration
    #[must_use]
    pub const fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Run a command line in the context's working directory and block
    /// until it exits
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned or exits nonzero
    pub fn run(
        &self,
        line: &CommandLine,
        ctx: &Context,
        extra_env: &[(String, String)],
    ) -> Result<ProcessOutput, ExecutionError> {
        let cmdline = line.cmdline();

        let mut command = Command::new(&self.config.shell);
        command.arg("-c").arg(&cmdline).current_dir(&ctx.workdir);
        if !self.config.inherit_env {
            command.env_clear();
        }
        command.envs(&ctx.environ);
        command.envs(extra_env.iter().map(|(k, v)| (k, v)));

        tracing::info!(cmdline = %cmdline, workdir = %ctx.workdir.display(), "starting process");

        let output = command.output().map_err(|e| ExecutionError::Spawn {
            command: cmdline.clone(),
            reason: e.to_string(),
        })?;

        let result = ProcessOutput {
            command: cmdline,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            tracing::warn!(
                cmdline = %result.command,
                exit_code = ?result.exit_code,
                "process exited unsuccessfully"
            );
            return Err(ExecutionError::NonZeroExit {
                command: result.command,
                code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        tracing::info!(cmdline = %result.command, "process finished");
        Ok(result)
    }
}
