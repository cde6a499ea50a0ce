//! Invocations for the external tools the pipeline treats as opaque steps.

use std::path::{Path, PathBuf};

use crate::io::command::{Invocation, Limits};
use crate::io::config::ToolsConfig;

/// Builds tool invocations rooted at the repository.
#[derive(Debug, Clone)]
pub struct Tools<'a> {
    config: &'a ToolsConfig,
    root: PathBuf,
    limits: Limits,
}

impl<'a> Tools<'a> {
    pub fn new(config: &'a ToolsConfig, root: &Path, limits: Limits) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            limits,
        }
    }

    /// Dependency installer, invoked with no extra arguments. `None` when disabled.
    pub fn install(&self) -> Option<Invocation> {
        self.invocation(&self.config.install, Vec::new())
    }

    /// Metadata tool with the content directory (resolved against the root) as
    /// its sole extra argument. `None` when disabled.
    pub fn meta(&self, content_dir: &str) -> Option<Invocation> {
        let dir = self.root.join(content_dir).display().to_string();
        self.invocation(&self.config.meta, vec![dir])
    }

    /// Site build, direct or containerized.
    ///
    /// Config validation guarantees both build commands are non-empty.
    pub fn build(&self, use_docker: bool) -> Option<Invocation> {
        let command = if use_docker {
            &self.config.docker_build
        } else {
            &self.config.build
        };
        self.invocation(command, Vec::new())
    }

    fn invocation(&self, command: &[String], extra: Vec<String>) -> Option<Invocation> {
        let (program, args) = command.split_first()?;
        let mut args = args.to_vec();
        args.extend(extra);
        Some(Invocation {
            program: program.clone(),
            args,
            workdir: self.root.clone(),
            timeout: self.limits.timeout,
            output_limit_bytes: self.limits.output_limit_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limits() -> Limits {
        Limits {
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10,
        }
    }

    #[test]
    fn meta_receives_content_dir_relative_to_root() {
        let config = ToolsConfig::default();
        let tools = Tools::new(&config, Path::new("/srv/blog"), limits());
        let inv = tools.meta("_posts").expect("meta enabled");
        assert_eq!(inv.argv(), vec!["npx", "--no-install", "jrp", "/srv/blog/_posts"]);
        assert_eq!(inv.workdir, PathBuf::from("/srv/blog"));
    }

    #[test]
    fn build_switches_on_docker_flag() {
        let config = ToolsConfig::default();
        let tools = Tools::new(&config, Path::new("/srv/blog"), limits());
        let direct = tools.build(false).expect("build");
        let docker = tools.build(true).expect("docker build");
        assert_eq!(direct.argv(), vec!["jekyll", "build"]);
        assert_eq!(docker.argv(), vec!["sh", "docker-build.sh"]);
    }

    #[test]
    fn empty_install_disables_stage() {
        let config = ToolsConfig {
            install: Vec::new(),
            ..ToolsConfig::default()
        };
        let tools = Tools::new(&config, Path::new("/srv/blog"), limits());
        assert!(tools.install().is_none());
    }
}
