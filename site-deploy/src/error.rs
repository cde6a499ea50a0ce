//! Typed failures the CLI classifies into exit codes.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::checkout::Checkout;
use crate::core::policy::{Stage, Step};

#[derive(Debug, Error)]
pub enum DeployError {
    /// A command whose step has an abort policy failed.
    #[error("{stage} stage failed ({step}): `{command}`: {detail}")]
    StageFailed {
        stage: Stage,
        step: Step,
        command: String,
        detail: String,
    },

    #[error("deploy must start on '{expected}' but '{actual}' is checked out")]
    NotOnDefaultBranch { expected: String, actual: String },

    /// Uncommitted or untracked files would be lost to the publish-branch wipe.
    #[error(
        "working tree has uncommitted or untracked changes; commit or stash them first:\n{}",
        entries.join("\n")
    )]
    DirtyWorktree { entries: Vec<String> },

    #[error("illegal checkout: on {from}, expected {to}")]
    IllegalCheckout { from: Checkout, to: Checkout },

    #[error("another deploy is already running (lock held at {})", path.display())]
    Locked { path: PathBuf },
}
