//! Stable exit codes for the `site-deploy` CLI.

/// Site published, publish branch prepared with `--no-push`, or `--meta-only` finished.
pub const OK: i32 = 0;
/// A stage failed, the config was invalid, or any other error.
pub const FAILED: i32 = 1;
/// Local default branch is behind upstream and `--force` was not given.
pub const DIVERGED: i32 = 2;
/// Another deploy holds the repository lock.
pub const LOCKED: i32 = 3;
