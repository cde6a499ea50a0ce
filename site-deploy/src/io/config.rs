//! Deploy configuration stored in `deploy.toml` at the repository root.

use std::fs;
use std::path::{Component, Path};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::command::Limits;

pub const CONFIG_FILE_NAME: &str = "deploy.toml";

/// Fixed identifiers and tool commands for a deploy run (TOML).
///
/// Every field is optional in the file; missing fields default to the values
/// the blog has always deployed with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Branch the site sources live on; always checked out after a run.
    pub default_branch: String,
    /// Long-lived branch whose tip is the live site.
    pub publish_branch: String,
    /// Scratch branch carrying the build output as a normal commit.
    pub stage_branch_1: String,
    /// Scratch branch holding the split-out artifact subtree.
    pub stage_branch_2: String,
    /// Directory (relative to root) the build tool writes the site into.
    pub artifact_dir: String,
    /// Directory (relative to root) handed to the metadata tool.
    pub content_dir: String,
    pub remote: String,
    /// Announced after a successful push.
    pub site_url: String,
    pub meta_commit_message: String,
    pub publish_commit_message: String,
    /// Wall-clock limit for any single command.
    pub command_timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
    pub tools: ToolsConfig,
}

/// External tool commands as argv arrays. Empty `install`/`meta` disable the stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub install: Vec<String>,
    pub meta: Vec<String>,
    pub build: Vec<String>,
    pub docker_build: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            install: argv(&["npm", "install"]),
            meta: argv(&["npx", "--no-install", "jrp"]),
            build: argv(&["jekyll", "build"]),
            docker_build: argv(&["sh", "docker-build.sh"]),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".to_string(),
            publish_branch: "gh-pages".to_string(),
            stage_branch_1: "deploy-stage-1".to_string(),
            stage_branch_2: "deploy-stage-2".to_string(),
            artifact_dir: "_site".to_string(),
            content_dir: "_posts".to_string(),
            remote: "origin".to_string(),
            site_url: "http://blog.thoughtram.io".to_string(),
            meta_commit_message: "chore: adds meta data for related posts and videos".to_string(),
            publish_commit_message: "rebuilt site".to_string(),
            command_timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
            tools: ToolsConfig::default(),
        }
    }
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        let branches = [
            ("default_branch", &self.default_branch),
            ("publish_branch", &self.publish_branch),
            ("stage_branch_1", &self.stage_branch_1),
            ("stage_branch_2", &self.stage_branch_2),
        ];
        for (field, value) in branches {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must be non-empty"));
            }
        }
        for (i, (field_a, a)) in branches.iter().enumerate() {
            for (field_b, b) in &branches[i + 1..] {
                if a == b {
                    return Err(anyhow!("{field_a} and {field_b} must differ (both '{a}')"));
                }
            }
        }
        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must be non-empty"));
        }
        validate_relative_dir("artifact_dir", &self.artifact_dir)?;
        validate_relative_dir("content_dir", &self.content_dir)?;
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        validate_command("tools.build", &self.tools.build)?;
        validate_command("tools.docker_build", &self.tools.docker_build)?;
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            timeout: Duration::from_secs(self.command_timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }

    /// Remote-tracking ref for a local branch, e.g. `origin/master`.
    pub fn upstream(&self, branch: &str) -> String {
        format!("{}/{}", self.remote, branch)
    }
}

fn validate_relative_dir(field: &str, value: &str) -> Result<()> {
    let path = Path::new(value);
    if value.trim().is_empty() || value.trim() == "." {
        return Err(anyhow!("{field} must name a subdirectory"));
    }
    if path.is_absolute() {
        return Err(anyhow!("{field} must be relative to the repository root"));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
    {
        return Err(anyhow!("{field} must stay inside the repository ('{value}')"));
    }
    Ok(())
}

fn validate_command(field: &str, command: &[String]) -> Result<()> {
    if command.is_empty() || command[0].trim().is_empty() {
        return Err(anyhow!("{field} must be a non-empty array"));
    }
    Ok(())
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DeployConfig::default()`.
pub fn load_config(path: &Path) -> Result<DeployConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = DeployConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DeployConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, DeployConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "publish_branch = \"pages\"\n\n[tools]\nbuild = [\"make\", \"site\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.publish_branch, "pages");
        assert_eq!(cfg.default_branch, "master");
        assert_eq!(cfg.tools.build, vec!["make", "site"]);
        assert_eq!(cfg.tools.install, vec!["npm", "install"]);
    }

    #[test]
    fn rejects_duplicate_branch_names() {
        let cfg = DeployConfig {
            stage_branch_2: "deploy-stage-1".to_string(),
            ..DeployConfig::default()
        };
        let err = cfg.validate().expect_err("duplicate");
        assert!(err.to_string().contains("stage_branch_1 and stage_branch_2"));
    }

    #[test]
    fn rejects_escaping_artifact_dir() {
        for bad in ["", ".", "../site", "/tmp/site"] {
            let cfg = DeployConfig {
                artifact_dir: bad.to_string(),
                ..DeployConfig::default()
            };
            assert!(cfg.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn rejects_empty_build_command() {
        let mut cfg = DeployConfig::default();
        cfg.tools.build.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_install_and_meta_are_allowed() {
        let mut cfg = DeployConfig::default();
        cfg.tools.install.clear();
        cfg.tools.meta.clear();
        cfg.validate().expect("valid");
    }

    #[test]
    fn invalid_file_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "command_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("command_timeout_secs must be > 0"));
    }

    #[test]
    fn upstream_joins_remote_and_branch() {
        assert_eq!(DeployConfig::default().upstream("gh-pages"), "origin/gh-pages");
    }
}
