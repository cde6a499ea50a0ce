//! Command-line entry point: argument handling, run setup, and exit codes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{info, warn};

use crate::core::types::{DeployOutcome, RunFlags};
use crate::deploy::{DeployRequest, run_deploy};
use crate::error::DeployError;
use crate::exit_codes;
use crate::io::command::SystemRunner;
use crate::io::config::{CONFIG_FILE_NAME, DeployConfig, load_config};
use crate::io::git::Git;
use crate::io::lock::DeployLock;

#[derive(Debug, Parser)]
#[command(
    name = "site-deploy",
    version,
    about = "Build the site and publish it to the publish branch"
)]
pub struct Cli {
    /// Skip metadata generation for posts.
    #[arg(long)]
    pub skip_meta: bool,
    /// Generate and commit metadata, then stop before building.
    #[arg(long)]
    pub meta_only: bool,
    /// Deploy even if the default branch is behind its upstream.
    #[arg(long)]
    pub force: bool,
    /// Prepare the publish branch locally without pushing it.
    #[arg(long)]
    pub no_push: bool,
    /// Build with the containerized build command.
    #[arg(long)]
    pub use_docker: bool,
    /// Skip installing dependencies.
    #[arg(long)]
    pub skip_install: bool,
    /// Repository root. Defaults to the top level of the current git checkout.
    #[arg(long, env = "DEPLOY_ROOT")]
    pub root: Option<PathBuf>,
    /// Config file. Defaults to `deploy.toml` in the repository root.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn flags(&self) -> RunFlags {
        RunFlags {
            skip_meta: self.skip_meta,
            meta_only: self.meta_only,
            force: self.force,
            no_push: self.no_push,
            use_docker: self.use_docker,
            skip_install: self.skip_install,
        }
    }
}

/// Parse the process arguments, run a deploy, and return the exit code.
pub fn main_exit_code() -> i32 {
    let cli = Cli::parse_from(retain_known_args(std::env::args()));
    match execute(&cli) {
        Ok(outcome) => outcome_exit_code(&outcome),
        Err(err) => {
            eprintln!("{err:#}");
            error_exit_code(&err)
        }
    }
}

/// Drop arguments the CLI does not define so stray flags never fail a deploy.
///
/// The first element (program name) is always kept. Value-taking options keep
/// their value whether given as `--opt=value` or `--opt value`.
pub fn retain_known_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut command = Cli::command();
    command.build();
    let mut flags = HashSet::new();
    let mut valued = HashSet::new();
    for arg in command.get_arguments() {
        let takes_value = arg.get_action().takes_values();
        let names = arg
            .get_long()
            .map(|long| format!("--{long}"))
            .into_iter()
            .chain(arg.get_short().map(|short| format!("-{short}")));
        for name in names {
            if takes_value {
                valued.insert(name);
            } else {
                flags.insert(name);
            }
        }
    }

    let mut args = args.into_iter();
    let mut kept: Vec<String> = args.next().into_iter().collect();
    while let Some(arg) = args.next() {
        let name = arg.split_once('=').map_or(arg.as_str(), |(name, _)| name);
        if flags.contains(name) && name == arg {
            kept.push(arg);
        } else if valued.contains(name) {
            let inline = name != arg;
            kept.push(arg);
            if !inline && let Some(value) = args.next() {
                kept.push(value);
            }
        } else {
            warn!(arg = %arg, "ignoring unrecognized argument");
        }
    }
    kept
}

fn execute(cli: &Cli) -> Result<DeployOutcome> {
    let defaults = DeployConfig::default();
    let root = resolve_root(cli.root.as_deref(), &defaults)?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
    let config = load_config(&config_path)?;
    info!(root = %root.display(), config = %config_path.display(), "starting deploy");

    let runner = SystemRunner;
    let git_dir = Git::new(&runner, &root, config.limits()).common_dir()?;
    let _lock = DeployLock::acquire(&git_dir)?;

    let request = DeployRequest {
        root: &root,
        flags: cli.flags(),
        config: &config,
    };
    let outcome = run_deploy(&request, &runner, |stage| println!("{}", stage.banner()))?;
    println!("{}", final_message(&outcome, &config));
    Ok(outcome)
}

/// Explicit root, else the top level of the checkout containing the cwd.
fn resolve_root(explicit: Option<&Path>, config: &DeployConfig) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return root
            .canonicalize()
            .with_context(|| format!("resolve root {}", root.display()));
    }
    let cwd = std::env::current_dir().context("read current directory")?;
    Git::new(&SystemRunner, cwd, config.limits())
        .toplevel()
        .context("locate repository root (pass --root or set DEPLOY_ROOT)")
}

/// Operator-facing summary printed after the last stage.
pub fn final_message(outcome: &DeployOutcome, config: &DeployConfig) -> String {
    match outcome {
        DeployOutcome::Published {
            pushed: true,
            site_changed,
        } => {
            let mut message = String::new();
            if !site_changed {
                message.push_str("Site unchanged since the last deploy.\n");
            }
            message.push_str(&format!("Everything should be live at {}", config.site_url));
            message
        }
        DeployOutcome::Published { pushed: false, .. } => format!(
            "Skipped push. Verify the '{publish}' branch, then run: git push {remote} {publish}",
            publish = config.publish_branch,
            remote = config.remote,
        ),
        DeployOutcome::MetaOnly { generated: true } => {
            "Meta data is up to date. Skipped build and deploy.".to_string()
        }
        DeployOutcome::MetaOnly { generated: false } => {
            "No meta data generated. Skipped build and deploy.".to_string()
        }
        DeployOutcome::Diverged { missing_commits } => format!(
            "Your current HEAD is behind {upstream} by {missing_commits} commit(s). Use --force to ignore.",
            upstream = config.upstream(&config.default_branch),
        ),
    }
}

pub fn outcome_exit_code(outcome: &DeployOutcome) -> i32 {
    match outcome {
        DeployOutcome::Published { .. } | DeployOutcome::MetaOnly { .. } => exit_codes::OK,
        DeployOutcome::Diverged { .. } => exit_codes::DIVERGED,
    }
}

pub fn error_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DeployError>() {
        Some(DeployError::Locked { .. }) => exit_codes::LOCKED,
        _ => exit_codes::FAILED,
    }
}
