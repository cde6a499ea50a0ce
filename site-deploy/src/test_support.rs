//! Test-only helpers: a scripted command runner and throwaway git repositories.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::CommandResult;
use crate::io::command::{CommandRunner, Invocation};
use crate::io::config::{DeployConfig, ToolsConfig};

/// Command runner that records every invocation and answers from a script.
///
/// Rules match on an argv prefix; the most recently added matching rule wins.
/// Unmatched commands succeed with empty output. By default the current
/// branch is `master` and the index has one staged path, so conditional
/// commits go ahead.
pub struct ScriptedRunner {
    rules: Vec<(Vec<String>, CommandResult)>,
    calls: RefCell<Vec<Invocation>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
        .respond(
            &["git", "rev-parse", "--abbrev-ref", "HEAD"],
            CommandResult::ok("master\n"),
        )
        .respond(
            &["git", "diff", "--cached", "--name-only"],
            CommandResult::ok("index.html\n"),
        )
    }

    /// Answer commands starting with `argv_prefix` with `result`.
    pub fn respond(mut self, argv_prefix: &[&str], result: CommandResult) -> Self {
        let prefix = argv_prefix.iter().map(|s| s.to_string()).collect();
        self.rules.push((prefix, result));
        self
    }

    /// Make commands starting with `argv_prefix` fail with `stderr`.
    pub fn fail(self, argv_prefix: &[&str], stderr: &str) -> Self {
        self.respond(argv_prefix, CommandResult::failure(Some(1), stderr))
    }

    /// Every invocation so far, rendered as command lines.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    /// True if any invocation started with `argv_prefix`.
    pub fn invoked(&self, argv_prefix: &[&str]) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|c| starts_with(&c.argv(), argv_prefix))
    }

    /// Position of the first invocation starting with `argv_prefix`.
    pub fn position(&self, argv_prefix: &[&str]) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|c| starts_with(&c.argv(), argv_prefix))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        self.calls.borrow_mut().push(invocation.clone());
        let argv = invocation.argv();
        let result = self
            .rules
            .iter()
            .rev()
            .find(|(prefix, _)| {
                let prefix: Vec<&str> = prefix.iter().map(String::as_str).collect();
                starts_with(&argv, &prefix)
            })
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::ok(""));
        Ok(result)
    }
}

fn starts_with(argv: &[&str], prefix: &[&str]) -> bool {
    argv.len() >= prefix.len() && argv[..prefix.len()] == *prefix
}

/// Default config with the dependency sync disabled and short tool names.
pub fn scripted_config() -> DeployConfig {
    DeployConfig {
        tools: ToolsConfig {
            install: Vec::new(),
            meta: vec!["jrp".to_string()],
            build: vec!["jekyll".to_string(), "build".to_string()],
            docker_build: vec!["docker-build".to_string()],
        },
        ..DeployConfig::default()
    }
}

/// A temp workspace holding a bare `origin` and a clone-like working repo.
///
/// Layout after [`TestRepo::new`]:
/// - `master`: commit "A" with `README.md` and a `.gitignore` ignoring `_site/`
/// - `gh-pages`: orphan commit "B" containing `old.html`
/// - both pushed to `origin`, `master` checked out
pub struct TestRepo {
    temp: TempDir,
    root: PathBuf,
    origin: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let origin = temp.path().join("origin.git");
        let root = temp.path().join("blog");
        fs::create_dir_all(&origin).context("create origin dir")?;
        fs::create_dir_all(&root).context("create work dir")?;

        git_in(&origin, &["init", "--bare", "--quiet"])?;
        git_in(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"])?;

        git_in(&root, &["init", "--quiet"])?;
        git_in(&root, &["symbolic-ref", "HEAD", "refs/heads/master"])?;
        configure_identity(&root)?;
        fs::write(root.join(".gitignore"), "_site/\n").context("write .gitignore")?;
        fs::write(root.join("README.md"), "blog sources\n").context("write README")?;
        git_in(&root, &["add", "-A"])?;
        git_in(&root, &["commit", "--quiet", "-m", "A"])?;
        let origin_url = origin.display().to_string();
        git_in(&root, &["remote", "add", "origin", &origin_url])?;
        git_in(&root, &["push", "--quiet", "origin", "master"])?;

        git_in(&root, &["checkout", "--quiet", "--orphan", "gh-pages"])?;
        git_in(&root, &["rm", "-rf", "--quiet", "."])?;
        fs::write(root.join("old.html"), "stale\n").context("write old.html")?;
        git_in(&root, &["add", "old.html"])?;
        git_in(&root, &["commit", "--quiet", "-m", "B"])?;
        git_in(&root, &["push", "--quiet", "origin", "gh-pages"])?;
        git_in(&root, &["checkout", "--quiet", "master"])?;

        Ok(Self { temp, root, origin })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Run git in the working repo and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git_in(&self.root, args)
    }

    /// Run git against the bare origin and return trimmed stdout.
    pub fn git_origin(&self, args: &[&str]) -> Result<String> {
        git_in(&self.origin, args)
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let status = Command::new("git")
            .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .current_dir(&self.root)
            .status()
            .context("spawn git show-ref")?;
        Ok(status.success())
    }

    /// Sorted file list of `rev`'s tree.
    pub fn tree_files(&self, rev: &str) -> Result<Vec<String>> {
        let out = self.git(&["ls-tree", "-r", "--name-only", rev])?;
        let mut files: Vec<String> = out.lines().map(|l| l.to_string()).collect();
        files.sort();
        Ok(files)
    }

    /// Contents of `path` at `rev`.
    pub fn show(&self, rev: &str, path: &str) -> Result<String> {
        self.git(&["show", &format!("{rev}:{path}")])
    }

    /// Push a commit to `origin/master` from a second clone, leaving the
    /// working repo behind upstream.
    pub fn push_upstream_commit(&self, file: &str, contents: &str) -> Result<()> {
        let other = self.temp.path().join("other");
        let origin_url = self.origin.display().to_string();
        let other_path = other.display().to_string();
        git_in(
            self.temp.path(),
            &["clone", "--quiet", &origin_url, &other_path],
        )?;
        configure_identity(&other)?;
        fs::write(other.join(file), contents).with_context(|| format!("write {file}"))?;
        git_in(&other, &["add", "-A"])?;
        git_in(&other, &["commit", "--quiet", "-m", "upstream change"])?;
        git_in(&other, &["push", "--quiet", "origin", "master"])?;
        Ok(())
    }

    /// Config whose build writes `index.html` containing `contents` into `_site/`.
    pub fn config_with_site(&self, contents: &str) -> DeployConfig {
        let script = format!("mkdir -p _site && printf '%s' '{contents}' > _site/index.html");
        DeployConfig {
            tools: ToolsConfig {
                install: Vec::new(),
                meta: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "mkdir -p \"$1\" && echo related > \"$1/meta.yml\"".to_string(),
                    "meta".to_string(),
                ],
                build: vec!["sh".to_string(), "-c".to_string(), script],
                docker_build: vec!["sh".to_string(), "-c".to_string(), "exit 1".to_string()],
            },
            ..DeployConfig::default()
        }
    }
}

fn configure_identity(root: &Path) -> Result<()> {
    git_in(root, &["config", "user.email", "test@example.com"])?;
    git_in(root, &["config", "user.name", "test"])?;
    git_in(root, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !out.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
