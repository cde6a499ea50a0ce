//! Git adapter for the deploy pipeline.
//!
//! Each method issues exactly one `git` command and hands back the
//! [`CommandResult`]. Whether a failure matters is decided by the caller's
//! failure policy, so nothing here turns a non-zero exit into an error.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::core::types::CommandResult;
use crate::io::command::{CommandRunner, Invocation, Limits};

/// Wrapper for executing git commands in a working directory.
pub struct Git<'a> {
    runner: &'a dyn CommandRunner,
    workdir: PathBuf,
    limits: Limits,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn CommandRunner, workdir: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            runner,
            workdir: workdir.into(),
            limits,
        }
    }

    /// `git rev-parse --abbrev-ref HEAD`
    pub fn current_branch(&self) -> Result<CommandResult> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// `git status --porcelain`: tracked changes plus untracked, non-ignored files.
    pub fn status_porcelain(&self) -> Result<CommandResult> {
        self.run(&["status", "--porcelain"])
    }

    /// Absolute path of the shared git directory (handles linked worktrees).
    pub fn common_dir(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--git-common-dir"])?;
        if out.failed {
            return Err(anyhow!("not a git repository: {}", out.diagnostic()));
        }
        let dir = PathBuf::from(out.stdout.trim());
        if dir.is_absolute() {
            return Ok(dir);
        }
        Ok(self.workdir.join(dir))
    }

    /// `git rev-parse --show-toplevel`
    pub fn toplevel(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--show-toplevel"])?;
        if out.failed {
            return Err(anyhow!("not a git repository: {}", out.diagnostic()));
        }
        Ok(PathBuf::from(out.stdout.trim()))
    }

    /// `git fetch <remote>`
    pub fn fetch(&self, remote: &str) -> Result<CommandResult> {
        self.run(&["fetch", remote])
    }

    /// `git log <range> --oneline`
    pub fn log_oneline(&self, range: &str) -> Result<CommandResult> {
        self.run(&["log", range, "--oneline"])
    }

    /// `git branch -D <name>`
    pub fn delete_branch(&self, branch: &str) -> Result<CommandResult> {
        self.run(&["branch", "-D", branch])
    }

    /// `git branch -f <name> <ref>`
    pub fn force_branch(&self, branch: &str, target: &str) -> Result<CommandResult> {
        self.run(&["branch", "-f", branch, target])
    }

    /// `git checkout -b <name>`
    pub fn checkout_new_branch(&self, branch: &str) -> Result<CommandResult> {
        self.run(&["checkout", "-b", branch])
    }

    /// `git checkout <name>`
    pub fn checkout(&self, branch: &str) -> Result<CommandResult> {
        self.run(&["checkout", branch])
    }

    /// `git checkout -f <name>`; used only to recover from an aborted run.
    pub fn force_checkout(&self, branch: &str) -> Result<CommandResult> {
        self.run(&["checkout", "-f", branch])
    }

    /// `git checkout <name> <path>`: copy `path` from another branch into the tree.
    pub fn checkout_path(&self, branch: &str, path: &str) -> Result<CommandResult> {
        self.run(&["checkout", branch, path])
    }

    /// `git add -A <path>`
    pub fn add_all(&self, path: &str) -> Result<CommandResult> {
        self.run(&["add", "-A", path])
    }

    /// `git add -A` (whole tree)
    pub fn add_everything(&self) -> Result<CommandResult> {
        self.run(&["add", "-A"])
    }

    /// `git add -f <path>`: stage ignored output such as the generated site.
    pub fn add_force(&self, path: &str) -> Result<CommandResult> {
        self.run(&["add", "-f", path])
    }

    /// `git diff --cached --name-only`: paths staged for the next commit.
    pub fn staged_paths(&self) -> Result<CommandResult> {
        self.run(&["diff", "--cached", "--name-only"])
    }

    /// `git commit -m <message>`
    pub fn commit(&self, message: &str) -> Result<CommandResult> {
        self.run(&["commit", "-m", message])
    }

    /// `git subtree split -P <dir> -b <branch>`
    pub fn subtree_split(&self, prefix: &str, branch: &str) -> Result<CommandResult> {
        self.run(&["subtree", "split", "-P", prefix, "-b", branch])
    }

    /// `git rm -rf .`
    pub fn remove_tracked(&self) -> Result<CommandResult> {
        self.run(&["rm", "-rf", "."])
    }

    /// `git clean -fxd`: remove untracked and ignored files.
    pub fn clean_untracked(&self) -> Result<CommandResult> {
        self.run(&["clean", "-fxd"])
    }

    /// `git push <remote> <branch>`
    pub fn push(&self, remote: &str, branch: &str) -> Result<CommandResult> {
        self.run(&["push", remote, branch])
    }

    #[instrument(skip_all, fields(args = %args.join(" ")))]
    fn run(&self, args: &[&str]) -> Result<CommandResult> {
        let invocation = Invocation {
            program: "git".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            workdir: self.workdir.clone(),
            timeout: self.limits.timeout,
            output_limit_bytes: self.limits.output_limit_bytes,
        };
        let mut result = self.runner.run(&invocation)?;
        result.command = invocation.to_string();
        debug!(failed = result.failed, "git finished");
        Ok(result)
    }
}
