//! Orchestration for a single deploy run.
//!
//! A run rebuilds the generated site and replaces the publish branch content
//! with it, using two scratch branches to carry the artifact:
//!
//! 1. dependency sync, fetch, optional metadata commit on the default branch
//! 2. divergence gate against `<remote>/<default>`
//! 3. build, then commit the artifact directory on stage branch 1
//! 4. `subtree split` the artifact into stage branch 2 (artifact at the root)
//! 5. wipe the publish branch tree, check out stage branch 2's content, commit
//! 6. push, return to the default branch, delete both scratch branches
//!
//! Every command is a [`Step`] with a failure policy. Ignored failures are
//! logged; aborting failures trigger recovery back to the default branch
//! before the error is returned.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::checkout::Checkout;
use crate::core::divergence::{DivergenceDecision, decide};
use crate::core::policy::{FailurePolicy, Stage, Step};
use crate::core::types::{CommandResult, DeployOutcome, RunFlags};
use crate::error::DeployError;
use crate::io::command::{CommandRunner, Invocation};
use crate::io::config::DeployConfig;
use crate::io::git::Git;
use crate::io::tools::Tools;

/// Inputs for one deploy run.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    /// Repository root; every command runs here regardless of the caller's cwd.
    pub root: &'a Path,
    pub flags: RunFlags,
    pub config: &'a DeployConfig,
}

/// Run the deploy pipeline.
///
/// `on_stage` is called once as each stage starts, in pipeline order.
/// Divergence without `--force` is not an error: it returns
/// [`DeployOutcome::Diverged`] with the repository left exactly as found.
#[instrument(skip_all, fields(root = %request.root.display(), flags = ?request.flags))]
pub fn run_deploy<F: FnMut(Stage)>(
    request: &DeployRequest<'_>,
    runner: &dyn CommandRunner,
    on_stage: F,
) -> Result<DeployOutcome> {
    let mut pipeline = Pipeline::new(request, runner, on_stage);
    let result = pipeline.run();
    if result.is_err() {
        pipeline.recover();
    }
    result
}

struct Pipeline<'a, F> {
    config: &'a DeployConfig,
    flags: RunFlags,
    runner: &'a dyn CommandRunner,
    git: Git<'a>,
    tools: Tools<'a>,
    checkout: Checkout,
    // Stage branches may exist and must be removed by recovery.
    scratch_created: bool,
    stage: Option<Stage>,
    on_stage: F,
}

impl<'a, F: FnMut(Stage)> Pipeline<'a, F> {
    fn new(request: &DeployRequest<'a>, runner: &'a dyn CommandRunner, on_stage: F) -> Self {
        let limits = request.config.limits();
        Self {
            config: request.config,
            flags: request.flags,
            runner,
            git: Git::new(runner, request.root, limits),
            tools: Tools::new(&request.config.tools, request.root, limits),
            checkout: Checkout::OnDefault,
            scratch_created: false,
            stage: None,
            on_stage,
        }
    }

    fn run(&mut self) -> Result<DeployOutcome> {
        self.preflight()?;
        self.install()?;
        self.fetch()?;
        let generated = if self.flags.skip_meta {
            debug!("metadata generation skipped");
            false
        } else {
            self.metadata()?
        };
        if self.flags.meta_only {
            if self.flags.skip_meta {
                warn!("--meta-only with --skip-meta: nothing to do");
            }
            info!("meta-only run finished");
            return Ok(DeployOutcome::MetaOnly { generated });
        }
        if let Some(missing_commits) = self.divergence()? {
            return Ok(DeployOutcome::Diverged { missing_commits });
        }
        self.build()?;
        self.prepare_stage()?;
        self.extract_artifact()?;
        let site_changed = self.replace_publish()?;
        let pushed = self.push()?;
        self.restore()?;
        Ok(DeployOutcome::Published {
            pushed,
            site_changed,
        })
    }

    fn preflight(&mut self) -> Result<()> {
        let out = self.git_step(Step::ReadCurrentBranch, |git| git.current_branch())?;
        let actual = out.stdout.trim();
        if actual != self.config.default_branch {
            return Err(DeployError::NotOnDefaultBranch {
                expected: self.config.default_branch.clone(),
                actual: actual.to_string(),
            }
            .into());
        }
        // The publish-branch wipe (`clean -fxd`) and recovery (`checkout -f`)
        // would destroy anything not committed.
        let status = self.git_step(Step::ReadWorktreeStatus, |git| git.status_porcelain())?;
        let entries: Vec<String> = status
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if !entries.is_empty() {
            return Err(DeployError::DirtyWorktree { entries }.into());
        }
        Ok(())
    }

    fn install(&mut self) -> Result<()> {
        if self.flags.skip_install {
            debug!("dependency sync skipped");
            return Ok(());
        }
        let Some(invocation) = self.tools.install() else {
            debug!("no install command configured");
            return Ok(());
        };
        self.tool_step(Step::InstallDependencies, invocation)?;
        Ok(())
    }

    fn fetch(&mut self) -> Result<()> {
        let config = self.config;
        self.git_step(Step::FetchRemote, |git| git.fetch(&config.remote))?;
        Ok(())
    }

    /// Returns false when no metadata tool is configured.
    fn metadata(&mut self) -> Result<bool> {
        let config = self.config;
        let Some(invocation) = self.tools.meta(&config.content_dir) else {
            warn!("no metadata command configured; skipping metadata generation");
            return Ok(false);
        };
        self.tool_step(Step::GenerateMetadata, invocation)?;
        self.git_step(Step::StageMetadata, |git| git.add_all("."))?;
        self.commit_staged(Step::CommitMetadata, &config.meta_commit_message)?;
        Ok(true)
    }

    /// Returns the number of missing commits when the run must halt.
    fn divergence(&mut self) -> Result<Option<usize>> {
        let config = self.config;
        let range = format!("HEAD..{}", config.upstream(&config.default_branch));
        let out = self.git_step(Step::ReadUpstreamLog, |git| git.log_oneline(&range))?;
        match decide(&out.stdout, self.flags.force) {
            DivergenceDecision::UpToDate => Ok(None),
            DivergenceDecision::Forced { missing_commits } => {
                warn!(missing_commits, "behind upstream, continuing because of --force");
                Ok(None)
            }
            DivergenceDecision::Halt { missing_commits } => {
                info!(missing_commits, "behind upstream, halting");
                Ok(Some(missing_commits))
            }
        }
    }

    fn build(&mut self) -> Result<()> {
        let invocation = self
            .tools
            .build(self.flags.use_docker)
            .ok_or_else(|| anyhow!("no build command configured"))?;
        self.tool_step(Step::BuildSite, invocation)?;
        Ok(())
    }

    fn prepare_stage(&mut self) -> Result<()> {
        let config = self.config;
        for branch in [&config.stage_branch_1, &config.stage_branch_2] {
            self.git_step(Step::DeleteStaleStageBranch, |git| git.delete_branch(branch))?;
        }
        let upstream_publish = config.upstream(&config.publish_branch);
        self.git_step(Step::ResetPublishBranch, |git| {
            git.force_branch(&config.publish_branch, &upstream_publish)
        })?;

        let next = self.checkout.transition(Checkout::OnStage1)?;
        self.scratch_created = true;
        self.git_step(Step::CreateStageBranch, |git| {
            git.checkout_new_branch(&config.stage_branch_1)
        })?;
        self.checkout = next;

        self.git_step(Step::StageArtifact, |git| git.add_force(&config.artifact_dir))?;
        self.git_step(Step::CommitArtifact, |git| git.commit(&config.stage_branch_1))?;
        Ok(())
    }

    fn extract_artifact(&mut self) -> Result<()> {
        let config = self.config;
        self.checkout.require(Checkout::OnStage1)?;
        self.git_step(Step::SplitArtifact, |git| {
            git.subtree_split(&config.artifact_dir, &config.stage_branch_2)
        })?;
        Ok(())
    }

    /// Returns false when the rebuilt tree matched and no commit was needed.
    fn replace_publish(&mut self) -> Result<bool> {
        let config = self.config;
        let next = self.checkout.transition(Checkout::OnPublish)?;
        self.git_step(Step::CheckoutPublish, |git| git.checkout(&config.publish_branch))?;
        self.checkout = next;

        // Clear everything so files dropped from the site do not linger.
        self.git_step(Step::ClearTrackedFiles, |git| git.remove_tracked())?;
        self.git_step(Step::CleanUntracked, |git| git.clean_untracked())?;
        self.git_step(Step::CheckoutArtifact, |git| {
            git.checkout_path(&config.stage_branch_2, ".")
        })?;
        self.git_step(Step::StagePublish, |git| git.add_everything())?;

        self.checkout.require(Checkout::OnPublish)?;
        let changed = self.commit_staged(Step::CommitPublish, &config.publish_commit_message)?;
        if !changed {
            info!("publish branch already matches the build");
        }
        Ok(changed)
    }

    fn push(&mut self) -> Result<bool> {
        if self.flags.no_push {
            debug!("push skipped");
            return Ok(false);
        }
        let config = self.config;
        self.checkout.require(Checkout::OnPublish)?;
        self.git_step(Step::PushPublish, |git| {
            git.push(&config.remote, &config.publish_branch)
        })?;
        Ok(true)
    }

    fn restore(&mut self) -> Result<()> {
        let config = self.config;
        let next = self.checkout.transition(Checkout::OnDefault)?;
        self.git_step(Step::RestoreDefault, |git| git.checkout(&config.default_branch))?;
        self.checkout = next;
        for branch in [&config.stage_branch_1, &config.stage_branch_2] {
            self.git_step(Step::DeleteStageBranch, |git| git.delete_branch(branch))?;
        }
        self.scratch_created = false;
        Ok(())
    }

    /// Best-effort return to the default branch after an aborted run.
    ///
    /// Only the pipeline's own checkouts are forced away; a run that failed
    /// while still on the default branch leaves the working tree untouched.
    fn recover(&mut self) {
        let config = self.config;
        if self.checkout != Checkout::OnDefault {
            warn!(from = %self.checkout, "restoring default branch after failure");
            match self.git.force_checkout(&config.default_branch) {
                Ok(out) if !out.failed => self.checkout = Checkout::OnDefault,
                Ok(out) => warn!(detail = %out.diagnostic(), "could not restore default branch"),
                Err(err) => {
                    let detail = format!("{err:#}");
                    warn!(err = %detail, "could not restore default branch");
                }
            }
        }
        if self.scratch_created && self.checkout == Checkout::OnDefault {
            for branch in [&config.stage_branch_1, &config.stage_branch_2] {
                match self.git.delete_branch(branch) {
                    Ok(out) if out.failed => debug!(branch = %branch, "stage branch not present"),
                    Ok(_) => debug!(branch = %branch, "stage branch removed"),
                    Err(err) => {
                        let detail = format!("{err:#}");
                        warn!(branch = %branch, err = %detail, "could not remove stage branch");
                    }
                }
            }
            self.scratch_created = false;
        }
    }

    /// Commit staged changes; returns Ok(false) without committing if nothing is staged.
    fn commit_staged(&mut self, step: Step, message: &str) -> Result<bool> {
        let staged = self.git_step(step, |git| git.staged_paths())?;
        if staged.stdout.trim().is_empty() {
            debug!(%step, "no staged changes, skipping commit");
            return Ok(false);
        }
        self.git_step(step, |git| git.commit(message))?;
        Ok(true)
    }

    fn git_step(
        &mut self,
        step: Step,
        run: impl FnOnce(&Git<'a>) -> Result<CommandResult>,
    ) -> Result<CommandResult> {
        self.enter(step.stage());
        let result = run(&self.git)?;
        self.settle(step, result)
    }

    fn tool_step(&mut self, step: Step, invocation: Invocation) -> Result<CommandResult> {
        self.enter(step.stage());
        let mut result = self.runner.run(&invocation)?;
        result.command = invocation.to_string();
        self.settle(step, result)
    }

    fn enter(&mut self, stage: Stage) {
        if self.stage == Some(stage) {
            return;
        }
        info!(%stage, "stage started");
        self.stage = Some(stage);
        (self.on_stage)(stage);
    }

    fn settle(&self, step: Step, result: CommandResult) -> Result<CommandResult> {
        if !result.failed {
            return Ok(result);
        }
        match step.policy() {
            FailurePolicy::Ignore => {
                warn!(
                    stage = %step.stage(),
                    %step,
                    command = %result.command,
                    detail = %result.diagnostic(),
                    "ignoring failed command"
                );
                Ok(result)
            }
            FailurePolicy::Abort => Err(DeployError::StageFailed {
                stage: step.stage(),
                step,
                command: result.command.clone(),
                detail: result.diagnostic(),
            }
            .into()),
        }
    }
}
