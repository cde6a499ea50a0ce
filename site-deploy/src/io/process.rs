//! Child processes with a wall-clock limit and bounded capture.
//!
//! Deploy steps never read from stdin, so children get a null stdin and
//! cannot block on a prompt. Both output pipes are drained on their own
//! threads while the parent waits, which keeps a chatty build from filling a
//! pipe buffer and stalling.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one output stream, plus how many were dropped past the limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Capture,
    pub stderr: Capture,
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Human-readable note about dropped output, if any was dropped.
    pub fn truncation_note(&self) -> Option<String> {
        if self.stdout.dropped == 0 && self.stderr.dropped == 0 {
            return None;
        }
        Some(format!(
            "[output truncated: {} stdout bytes and {} stderr bytes dropped]",
            self.stdout.dropped, self.stderr.dropped
        ))
    }
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// Spawn failures are errors. A non-zero exit or a timeout is reported in the
/// returned [`ProcessOutput`].
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_bounded(mut cmd: Command, timeout: Duration, limit: usize) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = drain(child.stdout.take(), limit)?;
    let stderr = drain(child.stderr.take(), limit)?;

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;
    let output = ProcessOutput {
        status,
        stdout: collect(stdout).context("collect stdout")?,
        stderr: collect(stderr).context("collect stderr")?,
        timed_out,
    };
    debug!(exit_code = ?output.status.code(), timed_out, "process exited");
    Ok(output)
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
    // The child may exit between the timeout and the kill.
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill after timeout failed");
    }
    let status = child.wait().context("reap command after kill")?;
    Ok((status, true))
}

fn drain<R>(stream: Option<R>, limit: usize) -> Result<JoinHandle<Result<Capture>>>
where
    R: Read + Send + 'static,
{
    let stream = stream.ok_or_else(|| anyhow!("output stream was not piped"))?;
    Ok(thread::spawn(move || read_limited(stream, limit)))
}

fn collect(handle: JoinHandle<Result<Capture>>) -> Result<Capture> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<Capture> {
    let mut capture = Capture::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(capture);
        }
        let room = limit.saturating_sub(capture.bytes.len()).min(n);
        capture.bytes.extend_from_slice(&chunk[..room]);
        capture.dropped += n - room;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let out = run_bounded(sh("printf built; printf warn >&2"), Duration::from_secs(10), 100)
            .expect("run");
        assert!(out.status.success());
        assert_eq!(out.stdout.text(), "built");
        assert_eq!(out.stderr.text(), "warn");
        assert_eq!(out.truncation_note(), None);
    }

    #[test]
    fn drops_output_beyond_limit() {
        let out = run_bounded(sh("printf 0123456789"), Duration::from_secs(10), 4).expect("run");
        assert_eq!(out.stdout.bytes, b"0123");
        assert_eq!(out.stdout.dropped, 6);
        assert!(
            out.truncation_note()
                .expect("note")
                .contains("6 stdout bytes")
        );
    }

    #[test]
    fn kills_after_timeout() {
        let out = run_bounded(sh("sleep 5"), Duration::from_millis(200), 100).expect("run");
        assert!(out.timed_out);
        assert!(!out.status.success());
    }

    #[test]
    fn stdin_is_closed() {
        let out = run_bounded(Command::new("cat"), Duration::from_secs(5), 100).expect("run");
        assert!(!out.timed_out);
        assert!(out.stdout.bytes.is_empty());
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_bounded(
            Command::new("definitely-not-a-real-binary-xyz"),
            Duration::from_secs(1),
            100,
        )
        .expect_err("spawn should fail");
        assert!(err.to_string().contains("spawn command"));
    }
}
