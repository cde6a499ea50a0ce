//! Pipeline taxonomy and the per-step failure policy table.
//!
//! Every external command the orchestrator issues is a [`Step`]. Steps belong
//! to a user-visible [`Stage`] and carry a [`FailurePolicy`] that says whether
//! a failed command is expected (cleanup of things that may not exist) or must
//! stop the run.

use std::fmt;

/// What to do when a step's command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Failure is expected or harmless; log and continue.
    Ignore,
    /// Failure stops the run after recovery.
    Abort,
}

/// User-visible pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Preflight,
    Install,
    Fetch,
    Metadata,
    Divergence,
    Build,
    PrepareStage,
    ExtractArtifact,
    ReplacePublish,
    Push,
    Restore,
}

impl Stage {
    /// Progress line printed when the stage starts.
    pub fn banner(self) -> &'static str {
        match self {
            Stage::Preflight => "Getting ready for deployment...hold on!",
            Stage::Install => "Installing dependencies...",
            Stage::Fetch => "Fetching from origin...",
            Stage::Metadata => "Generating meta data for posts (related posts & videos)...",
            Stage::Divergence => "Checking for upstream changes...",
            Stage::Build => "Building site...",
            Stage::PrepareStage => "Generating deploy artifacts...",
            Stage::ExtractArtifact => "Extracting site artifact...",
            Stage::ReplacePublish => "Replacing publish branch content...",
            Stage::Push => "Deploying...",
            Stage::Restore => "Cleaning up...",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preflight => "preflight",
            Stage::Install => "install",
            Stage::Fetch => "fetch",
            Stage::Metadata => "metadata",
            Stage::Divergence => "divergence",
            Stage::Build => "build",
            Stage::PrepareStage => "prepare-stage",
            Stage::ExtractArtifact => "extract-artifact",
            Stage::ReplacePublish => "replace-publish",
            Stage::Push => "push",
            Stage::Restore => "restore",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external command in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ReadCurrentBranch,
    ReadWorktreeStatus,
    InstallDependencies,
    FetchRemote,
    GenerateMetadata,
    StageMetadata,
    CommitMetadata,
    ReadUpstreamLog,
    BuildSite,
    DeleteStaleStageBranch,
    ResetPublishBranch,
    CreateStageBranch,
    StageArtifact,
    CommitArtifact,
    SplitArtifact,
    CheckoutPublish,
    ClearTrackedFiles,
    CleanUntracked,
    CheckoutArtifact,
    StagePublish,
    CommitPublish,
    PushPublish,
    RestoreDefault,
    DeleteStageBranch,
}

impl Step {
    pub fn stage(self) -> Stage {
        match self {
            Step::ReadCurrentBranch | Step::ReadWorktreeStatus => Stage::Preflight,
            Step::InstallDependencies => Stage::Install,
            Step::FetchRemote => Stage::Fetch,
            Step::GenerateMetadata | Step::StageMetadata | Step::CommitMetadata => Stage::Metadata,
            Step::ReadUpstreamLog => Stage::Divergence,
            Step::BuildSite => Stage::Build,
            Step::DeleteStaleStageBranch
            | Step::ResetPublishBranch
            | Step::CreateStageBranch
            | Step::StageArtifact
            | Step::CommitArtifact => Stage::PrepareStage,
            Step::SplitArtifact => Stage::ExtractArtifact,
            Step::CheckoutPublish
            | Step::ClearTrackedFiles
            | Step::CleanUntracked
            | Step::CheckoutArtifact
            | Step::StagePublish
            | Step::CommitPublish => Stage::ReplacePublish,
            Step::PushPublish => Stage::Push,
            Step::RestoreDefault | Step::DeleteStageBranch => Stage::Restore,
        }
    }

    /// Failure policy for this step.
    ///
    /// Only steps whose target may legitimately be absent are ignored:
    /// scratch branches that were never created, an install tool that is not
    /// available, and a publish tree with nothing tracked.
    pub fn policy(self) -> FailurePolicy {
        match self {
            Step::InstallDependencies
            | Step::DeleteStaleStageBranch
            | Step::ClearTrackedFiles
            | Step::DeleteStageBranch => FailurePolicy::Ignore,
            _ => FailurePolicy::Abort,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::ReadCurrentBranch => "read current branch",
            Step::ReadWorktreeStatus => "read worktree status",
            Step::InstallDependencies => "install dependencies",
            Step::FetchRemote => "fetch remote",
            Step::GenerateMetadata => "generate metadata",
            Step::StageMetadata => "stage metadata",
            Step::CommitMetadata => "commit metadata",
            Step::ReadUpstreamLog => "read upstream log",
            Step::BuildSite => "build site",
            Step::DeleteStaleStageBranch => "delete stale stage branch",
            Step::ResetPublishBranch => "reset publish branch",
            Step::CreateStageBranch => "create stage branch",
            Step::StageArtifact => "stage artifact",
            Step::CommitArtifact => "commit artifact",
            Step::SplitArtifact => "split artifact subtree",
            Step::CheckoutPublish => "checkout publish branch",
            Step::ClearTrackedFiles => "clear tracked files",
            Step::CleanUntracked => "clean untracked files",
            Step::CheckoutArtifact => "checkout artifact content",
            Step::StagePublish => "stage publish content",
            Step::CommitPublish => "commit publish content",
            Step::PushPublish => "push publish branch",
            Step::RestoreDefault => "restore default branch",
            Step::DeleteStageBranch => "delete stage branch",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
