//! Build a static site and publish it through a dedicated git branch.
//!
//! A deploy rebuilds the site from the default branch and replaces the
//! content of the publish branch with the generated output, using two
//! disposable stage branches and `git subtree split` to carry the artifact
//! across. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (flags, step taxonomy, failure
//!   policy, checkout state machine, divergence parsing). No I/O.
//! - **[`io`]**: Side-effecting operations (config, process execution, git,
//!   external tools, locking). Isolated behind [`io::command::CommandRunner`]
//!   so the pipeline can be driven by a scripted runner in tests.
//!
//! [`deploy`] orchestrates a run; [`cli`] wires it to the command line.

pub mod cli;
pub mod core;
pub mod deploy;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
