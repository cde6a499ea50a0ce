//! Shared deterministic types for the deploy pipeline.
//!
//! These types define stable contracts between the orchestrator and its
//! collaborators. They must not depend on external state or I/O.

/// Command-line toggles for a single run.
///
/// Built once from the arguments and never mutated afterwards. Combined with
/// [`crate::io::config::DeployConfig`] it fully describes a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// Skip the metadata-generation stage entirely.
    pub skip_meta: bool,
    /// Run metadata generation only, then stop before the divergence check.
    pub meta_only: bool,
    /// Proceed even if the local default branch is behind its upstream.
    pub force: bool,
    /// Prepare the publish branch locally but do not push it.
    pub no_push: bool,
    /// Build through the containerized build command.
    pub use_docker: bool,
    /// Skip the dependency sync stage.
    pub skip_install: bool,
}

/// Outcome of one external process invocation.
///
/// A failure is data, not an error: the orchestrator decides per step whether
/// a failed command matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Command line that produced this result.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub failed: bool,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    /// Successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Failed result with the given stderr and exit code.
    pub fn failure(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            failed: true,
            exit_code,
            ..Self::default()
        }
    }

    /// Short diagnostic suitable for error messages (stderr, else stdout).
    pub fn diagnostic(&self) -> String {
        let mut detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        if self.timed_out {
            if !detail.is_empty() {
                detail.push_str("; ");
            }
            detail.push_str("timed out");
        }
        if detail.is_empty() {
            detail = match self.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
        }
        detail
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The publish branch was rebuilt (and pushed unless `--no-push`).
    Published {
        pushed: bool,
        /// False when the rebuilt tree matched the publish branch and no commit was made.
        site_changed: bool,
    },
    /// `--meta-only` stopped the run after metadata generation.
    MetaOnly {
        /// False when no metadata tool ran (`--skip-meta` or none configured).
        generated: bool,
    },
    /// Local default branch is behind upstream and `--force` was not given.
    /// Nothing after the upstream check was issued.
    Diverged { missing_commits: usize },
}
