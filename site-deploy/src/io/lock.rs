//! Advisory lock that keeps two deploys from driving the same repository.
//!
//! The lock file lives in the git directory so `git clean -fxd` on the
//! publish branch cannot delete it mid-run.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

use crate::error::DeployError;

pub const LOCK_FILE_NAME: &str = "deploy.lock";

/// Held for the duration of a run; released on drop.
#[derive(Debug)]
pub struct DeployLock {
    file: File,
}

impl DeployLock {
    /// Take the lock at `<git_dir>/deploy.lock` without waiting.
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        fs::create_dir_all(git_dir)
            .with_context(|| format!("create lock dir {}", git_dir.display()))?;
        let path = git_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        if let Err(err) = file.try_lock_exclusive() {
            return Err(lock_failure(err, path));
        }
        debug!(path = %path.display(), "deploy lock acquired");
        Ok(Self { file })
    }
}

/// Only contention means another deploy is running; anything else is an I/O failure.
fn lock_failure(err: io::Error, path: PathBuf) -> anyhow::Error {
    if err.kind() == fs2::lock_contended_error().kind() {
        return DeployError::Locked { path }.into();
    }
    anyhow::Error::new(err).context(format!("lock {}", path.display()))
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
