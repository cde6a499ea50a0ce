//! End-to-end deploy runs against real git repositories.
//!
//! Each test builds a throwaway `origin` plus working repo via [`TestRepo`]
//! and drives `run_deploy` with the real process runner. The build tool is a
//! shell one-liner writing `_site/index.html`.

use std::fs;

use site_deploy::core::policy::{Stage, Step};
use site_deploy::core::types::{DeployOutcome, RunFlags};
use site_deploy::deploy::{DeployRequest, run_deploy};
use site_deploy::error::DeployError;
use site_deploy::io::command::SystemRunner;
use site_deploy::io::config::DeployConfig;
use site_deploy::test_support::TestRepo;

fn deploy(repo: &TestRepo, config: &DeployConfig, flags: RunFlags) -> anyhow::Result<DeployOutcome> {
    let request = DeployRequest {
        root: repo.root(),
        flags,
        config,
    };
    run_deploy(&request, &SystemRunner, |_| {})
}

fn local_only() -> RunFlags {
    RunFlags {
        skip_meta: true,
        no_push: true,
        ..RunFlags::default()
    }
}

fn assert_clean_finish(repo: &TestRepo) {
    assert_eq!(repo.current_branch().expect("branch"), "master");
    assert!(!repo.branch_exists("deploy-stage-1").expect("stage 1"));
    assert!(!repo.branch_exists("deploy-stage-2").expect("stage 2"));
}

/// Scenario: master has commit A, gh-pages has commit B with `old.html`.
/// A local-only deploy leaves gh-pages with exactly the rebuilt site on top of B.
#[test]
fn local_deploy_replaces_publish_branch_content() {
    let repo = TestRepo::new().expect("repo");
    let old_publish = repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse");
    let config = repo.config_with_site("v1");

    let outcome = deploy(&repo, &config, local_only()).expect("deploy");

    assert_eq!(
        outcome,
        DeployOutcome::Published {
            pushed: false,
            site_changed: true
        }
    );
    assert_eq!(repo.tree_files("gh-pages").expect("tree"), vec!["index.html"]);
    assert_eq!(repo.show("gh-pages", "index.html").expect("show"), "v1");
    assert_eq!(
        repo.git(&["rev-parse", "gh-pages^"]).expect("parent"),
        old_publish
    );
    assert_eq!(
        repo.git(&["log", "-1", "--format=%s", "gh-pages"]).expect("log"),
        "rebuilt site"
    );
    assert_clean_finish(&repo);
    // Sources on master are untouched by the publish-branch wipe.
    assert_eq!(repo.tree_files("master").expect("tree"), vec![".gitignore", "README.md"]);
    assert!(repo.root().join("README.md").exists());
}

#[test]
fn repeated_runs_publish_identical_content() {
    let repo = TestRepo::new().expect("repo");
    let config = repo.config_with_site("v1");

    deploy(&repo, &config, local_only()).expect("first deploy");
    let first = repo.git(&["rev-parse", "gh-pages^{tree}"]).expect("tree");
    deploy(&repo, &config, local_only()).expect("second deploy");
    let second = repo.git(&["rev-parse", "gh-pages^{tree}"]).expect("tree");

    assert_eq!(first, second);
    assert_clean_finish(&repo);
}

#[test]
fn push_updates_remote_and_skips_empty_republish() {
    let repo = TestRepo::new().expect("repo");
    let config = repo.config_with_site("v2");
    let flags = RunFlags {
        skip_meta: true,
        ..RunFlags::default()
    };

    let first = deploy(&repo, &config, flags).expect("first deploy");
    assert_eq!(
        first,
        DeployOutcome::Published {
            pushed: true,
            site_changed: true
        }
    );
    let pushed = repo
        .git_origin(&["show", "gh-pages:index.html"])
        .expect("origin content");
    assert_eq!(pushed, "v2");
    let remote_tip = repo.git_origin(&["rev-parse", "gh-pages"]).expect("tip");

    let second = deploy(&repo, &config, flags).expect("second deploy");
    assert_eq!(
        second,
        DeployOutcome::Published {
            pushed: true,
            site_changed: false
        }
    );
    assert_eq!(
        repo.git_origin(&["rev-parse", "gh-pages"]).expect("tip"),
        remote_tip
    );
    assert_clean_finish(&repo);
}

#[test]
fn behind_upstream_leaves_repository_untouched() {
    let repo = TestRepo::new().expect("repo");
    repo.push_upstream_commit("NEWS.md", "upstream\n")
        .expect("upstream commit");
    let publish_before = repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse");
    let head_before = repo.git(&["rev-parse", "HEAD"]).expect("rev-parse");
    let config = repo.config_with_site("v1");

    let outcome = deploy(&repo, &config, local_only()).expect("deploy");

    assert_eq!(outcome, DeployOutcome::Diverged { missing_commits: 1 });
    assert_eq!(
        repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse"),
        publish_before
    );
    assert_eq!(repo.git(&["rev-parse", "HEAD"]).expect("rev-parse"), head_before);
    assert!(!repo.root().join("_site").exists(), "build must not run");
    assert_clean_finish(&repo);
}

#[test]
fn force_deploys_despite_upstream_changes() {
    let repo = TestRepo::new().expect("repo");
    repo.push_upstream_commit("NEWS.md", "upstream\n")
        .expect("upstream commit");
    let config = repo.config_with_site("forced");
    let flags = RunFlags {
        force: true,
        ..local_only()
    };

    let outcome = deploy(&repo, &config, flags).expect("deploy");

    assert!(matches!(outcome, DeployOutcome::Published { .. }));
    assert_eq!(repo.show("gh-pages", "index.html").expect("show"), "forced");
}

#[test]
fn meta_only_commits_generated_metadata() {
    let repo = TestRepo::new().expect("repo");
    let config = repo.config_with_site("unused");
    let flags = RunFlags {
        meta_only: true,
        no_push: true,
        ..RunFlags::default()
    };

    let outcome = deploy(&repo, &config, flags).expect("deploy");

    assert_eq!(outcome, DeployOutcome::MetaOnly { generated: true });
    assert_eq!(
        repo.git(&["log", "-1", "--format=%s"]).expect("log"),
        config.meta_commit_message
    );
    assert_eq!(
        repo.show("HEAD", "_posts/meta.yml").expect("show"),
        "related"
    );
    assert!(!repo.root().join("_site").exists(), "build must not run");
}

#[test]
fn build_failure_stops_before_branch_work() {
    let repo = TestRepo::new().expect("repo");
    let publish_before = repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse");
    let mut config = repo.config_with_site("v1");
    config.tools.build = vec!["sh".to_string(), "-c".to_string(), "echo broken >&2; exit 7".to_string()];

    let err = deploy(&repo, &config, local_only()).expect_err("build fails");

    match err.downcast_ref::<DeployError>() {
        Some(DeployError::StageFailed { stage, step, detail, .. }) => {
            assert_eq!(*stage, Stage::Build);
            assert_eq!(*step, Step::BuildSite);
            assert_eq!(detail, "broken");
        }
        other => panic!("expected build failure, got {other:?}"),
    }
    assert_eq!(
        repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse"),
        publish_before
    );
    assert_clean_finish(&repo);
}

#[test]
fn missing_artifact_recovers_to_default_branch() {
    let repo = TestRepo::new().expect("repo");
    let mut config = repo.config_with_site("v1");
    config.tools.build = vec!["true".to_string()];

    let err = deploy(&repo, &config, local_only()).expect_err("nothing to stage");

    match err.downcast_ref::<DeployError>() {
        Some(DeployError::StageFailed { step, .. }) => assert_eq!(*step, Step::StageArtifact),
        other => panic!("expected staging failure, got {other:?}"),
    }
    assert_clean_finish(&repo);
}

#[test]
fn leftover_stage_branches_are_replaced() {
    let repo = TestRepo::new().expect("repo");
    repo.git(&["branch", "deploy-stage-1", "master"]).expect("stale stage 1");
    repo.git(&["branch", "deploy-stage-2", "gh-pages"]).expect("stale stage 2");
    let config = repo.config_with_site("v1");

    let outcome = deploy(&repo, &config, local_only()).expect("deploy");

    assert_eq!(
        outcome,
        DeployOutcome::Published {
            pushed: false,
            site_changed: true
        }
    );
    assert_eq!(repo.tree_files("gh-pages").expect("tree"), vec!["index.html"]);
    assert_clean_finish(&repo);
}

fn assert_dirty_rejection(err: &anyhow::Error, path: &str) {
    match err.downcast_ref::<DeployError>() {
        Some(DeployError::DirtyWorktree { entries }) => {
            assert!(
                entries.iter().any(|entry| entry.ends_with(path)),
                "{path} not in {entries:?}"
            );
        }
        other => panic!("expected dirty worktree, got {other:?}"),
    }
}

#[test]
fn uncommitted_edit_blocks_deploy_and_survives() {
    let repo = TestRepo::new().expect("repo");
    let publish_before = repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse");
    fs::write(repo.root().join("README.md"), "local edit\n").expect("edit README");
    let config = repo.config_with_site("v1");

    let err = deploy(&repo, &config, local_only()).expect_err("dirty worktree");

    assert_dirty_rejection(&err, "README.md");
    assert_eq!(
        fs::read_to_string(repo.root().join("README.md")).expect("read README"),
        "local edit\n"
    );
    assert_eq!(
        repo.git(&["rev-parse", "gh-pages"]).expect("rev-parse"),
        publish_before
    );
    assert!(!repo.root().join("_site").exists(), "build must not run");
    assert_clean_finish(&repo);
}

#[test]
fn untracked_draft_blocks_deploy_and_survives() {
    let repo = TestRepo::new().expect("repo");
    let draft = repo.root().join("draft-post.md");
    fs::write(&draft, "half written\n").expect("write draft");
    let config = repo.config_with_site("v1");

    let err = deploy(&repo, &config, local_only()).expect_err("dirty worktree");

    assert_dirty_rejection(&err, "draft-post.md");
    assert_eq!(fs::read_to_string(&draft).expect("read draft"), "half written\n");
    assert_clean_finish(&repo);
}
