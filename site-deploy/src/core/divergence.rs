//! Upstream divergence detection from `git log <local>..<upstream> --oneline`.

/// Count commits listed by a `--oneline` log (one non-empty line per commit).
pub fn missing_commit_count(log_output: &str) -> usize {
    log_output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

/// Decision for the divergence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceDecision {
    /// Local history contains everything upstream has.
    UpToDate,
    /// Behind upstream but `--force` was given.
    Forced { missing_commits: usize },
    /// Behind upstream; the run must stop without touching anything.
    Halt { missing_commits: usize },
}

pub fn decide(log_output: &str, force: bool) -> DivergenceDecision {
    match missing_commit_count(log_output) {
        0 => DivergenceDecision::UpToDate,
        missing_commits if force => DivergenceDecision::Forced { missing_commits },
        missing_commits => DivergenceDecision::Halt { missing_commits },
    }
}
