//! Spawns and tracks the configured downloader subprocess; captures its
//! stdout/stderr line by line; answers cooperative cancellation by
//! escalating a process-group `SIGTERM` to `SIGKILL` (§4.8).
//!
//! Grounded on the teacher's `execute_download` (the spawn, piped stdio, and
//! `tokio::select!` stdout/stderr read loop) generalized with the
//! process-group signal escalation the reference's `other_examples` FUSE
//! binding shows for POSIX process lifecycle handling.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use log::{debug, info, warn};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

#[derive(Debug)]
pub enum SupervisorError {
    /// The configured binary could not be spawned at all (distinct from a
    /// per-track failure — §4.8, §7's `DownloaderMissing`).
    SpawnFailed(String),
}

#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub success: bool,
    /// Set when `cancel()` was invoked on this run, regardless of the exit
    /// status it produced — §7's `Cancelled` takes priority over a plain
    /// non-zero exit.
    pub cancelled: bool,
    pub destination: Option<String>,
    pub already_downloaded: Option<String>,
    pub stderr_tail: String,
    pub stdout_tail: String,
}

fn dest_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[download\] Destination: (.+)").expect("static dest pattern"))
}

fn already_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[download\] (.+) has already been downloaded").expect("static already pattern")
    })
}

/// Tracks the single in-flight child so cancellation can reach it from
/// outside the task that's awaiting it.
pub struct ProcessSupervisor {
    current_pid: Arc<Mutex<Option<i32>>>,
    cancelled: AtomicBool,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            current_pid: Arc::new(Mutex::new(None)),
            cancelled: AtomicBool::new(false),
        }
    }

    pub async fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutcome, SupervisorError> {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        #[cfg(unix)]
        {
            // A fresh process group lets us signal the whole tree (e.g. an
            // audio-extraction helper the downloader itself spawns).
            cmd.process_group(0);
        }

        info!("spawning downloader: {program} {args:?}");
        let mut child = cmd.spawn().map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;

        self.cancelled.store(false, Ordering::SeqCst);
        let pid = child.id().map(|p| p as i32);
        *self.current_pid.lock().await = pid;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut outcome = ProcessOutcome::default();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let (mut stdout_done, mut stderr_done) = (false, false);

        while !(stdout_done && stderr_done) {
            tokio::select! {
                line = stdout_lines.next_line(), if !stdout_done => {
                    match line {
                        Ok(Some(l)) => {
                            debug!("downloader stdout: {l}");
                            if let Some(caps) = dest_re().captures(&l) {
                                outcome.destination = caps.get(1).map(|m| m.as_str().to_string());
                            }
                            if let Some(caps) = already_re().captures(&l) {
                                outcome.already_downloaded = caps.get(1).map(|m| m.as_str().to_string());
                            }
                            stdout_buf.push(l);
                        }
                        Ok(None) => stdout_done = true,
                        Err(e) => { warn!("error reading downloader stdout: {e}"); stdout_done = true; }
                    }
                }
                line = stderr_lines.next_line(), if !stderr_done => {
                    match line {
                        Ok(Some(l)) => {
                            debug!("downloader stderr: {l}");
                            stderr_buf.push(l);
                        }
                        Ok(None) => stderr_done = true,
                        Err(e) => { warn!("error reading downloader stderr: {e}"); stderr_done = true; }
                    }
                }
            }
        }

        let status = child.wait().await.map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;
        *self.current_pid.lock().await = None;
        outcome.success = status.success();
        outcome.cancelled = self.cancelled.load(Ordering::SeqCst);
        outcome.stdout_tail = stdout_buf.join("\n");
        outcome.stderr_tail = stderr_buf.join("\n");
        Ok(outcome)
    }

    /// §4.8's escalation: SIGTERM the process group, wait ~500ms, SIGKILL if
    /// still alive, falling back to signaling the leader pid directly if
    /// group signaling fails. Marks the in-flight run as cancelled so the
    /// job treats its (non-zero) exit as §7's quiet `Cancelled`, not a
    /// per-track failure.
    pub async fn cancel(&self) {
        let Some(pid) = *self.current_pid.lock().await else {
            return;
        };
        self.cancelled.store(true, Ordering::SeqCst);
        info!("cancelling downloader pid {pid}");
        signal_process(pid, Signal::SIGTERM);
        tokio::time::sleep(Duration::from_millis(500)).await;
        if process_alive(pid) {
            warn!("downloader pid {pid} survived SIGTERM, sending SIGKILL");
            signal_process(pid, Signal::SIGKILL);
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn signal_process(pid: i32, sig: Signal) {
    if killpg(Pid::from_raw(pid), sig).is_err() {
        let _ = nix::sys::signal::kill(Pid::from_raw(pid), sig);
    }
}

#[cfg(not(unix))]
fn signal_process(_pid: i32, _sig: Signal) {}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}
