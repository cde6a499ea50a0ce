//! Command runner abstraction for external tools.
//!
//! The [`CommandRunner`] trait decouples the pipeline from process spawning.
//! [`SystemRunner`] executes for real; tests use a scripted runner that
//! records invocations and returns predetermined results.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::types::CommandResult;
use crate::io::process::run_bounded;

/// One external process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Invocation {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Execution limits applied to every invocation of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

pub trait CommandRunner {
    /// Run the invocation to completion.
    ///
    /// Non-zero exits, spawn failures, and timeouts are reported through
    /// [`CommandResult::failed`]; `Err` is reserved for failures of the runner
    /// itself.
    fn run(&self, invocation: &Invocation) -> Result<CommandResult>;
}

/// Runner that spawns real processes.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(command = %invocation))]
    fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.workdir)
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = match run_bounded(cmd, invocation.timeout, invocation.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(err = %detail, "command could not be run");
                let mut result = CommandResult::failure(None, detail);
                result.command = invocation.to_string();
                return Ok(result);
            }
        };

        let mut stderr = output.stderr.text();
        if let Some(note) = output.truncation_note() {
            warn!(%note, "command output truncated");
            stderr.push('\n');
            stderr.push_str(&note);
        }
        let result = CommandResult {
            command: invocation.to_string(),
            stdout: output.stdout.text(),
            stderr,
            failed: output.timed_out || !output.status.success(),
            timed_out: output.timed_out,
            exit_code: output.status.code(),
        };
        debug!(
            failed = result.failed,
            exit_code = ?result.exit_code,
            stdout = %result.stdout.trim(),
            "command output"
        );
        Ok(result)
    }
}
