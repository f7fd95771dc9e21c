use solverdiff_core::RunOutcome;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const DRAIN_GRACE: Duration = Duration::from_secs(1);

pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Shared stop signal. Raising it makes every in-flight `run_solver` kill
/// its child and return promptly.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    /// Kills the solver's whole process group, so wrapper scripts cannot
    /// leave the real solver running, then reaps the direct child.
    fn terminate(&mut self) {
        if !self.reaped {
            kill_process_group(&self.child);
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }
}

// The child leads its own group (see `run_solver`), so its pid is the pgid.
// Only valid while the group still has members.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg only sends a signal; a stale pgid yields ESRCH.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

enum WaitResult {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    Failed(std::io::Error),
}

fn wait_bounded(
    guard: &mut ChildGuard,
    deadline: Instant,
    cancel: &CancelFlag,
) -> WaitResult {
    loop {
        match guard.child.try_wait() {
            Ok(Some(status)) => {
                guard.reaped = true;
                return WaitResult::Exited(status);
            }
            Ok(None) => {}
            Err(e) => return WaitResult::Failed(e),
        }
        if cancel.is_cancelled() {
            return WaitResult::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitResult::TimedOut;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        buf
    })
}

/// Waits for both pipe readers to hit EOF, but not past `deadline`.
fn collect_streams(
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    deadline: Instant,
) -> Option<(Vec<u8>, Vec<u8>)> {
    let pending = |h: &Option<JoinHandle<Vec<u8>>>| h.as_ref().is_some_and(|h| !h.is_finished());
    while pending(&stdout) || pending(&stderr) {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
    let join = |h: Option<JoinHandle<Vec<u8>>>| {
        h.map(|h| h.join().unwrap_or_default()).unwrap_or_default()
    };
    Some((join(stdout), join(stderr)))
}

#[cfg(unix)]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(sig) => format!("terminated by signal {}", sig),
        None => format!("exited without a status code ({})", status),
    }
}

#[cfg(not(unix))]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    format!("exited without a status code ({})", status)
}

fn drain(stdout: Option<JoinHandle<Vec<u8>>>, stderr: Option<JoinHandle<Vec<u8>>>) {
    let _ = collect_streams(stdout, stderr, Instant::now() + DRAIN_GRACE);
}

/// Runs `binary <input>` with a wall-clock bound of `timeout`. Never fails:
/// launch errors, signals, timeouts and cancellation all come back as a
/// `RunOutcome`.
pub fn run_solver(
    binary: &Path,
    input: &Path,
    timeout: Duration,
    cancel: &CancelFlag,
) -> RunOutcome {
    let started = Instant::now();
    let Some(deadline) = started.checked_add(timeout) else {
        return RunOutcome::errored(format!(
            "timeout of {}s is out of range",
            timeout.as_secs()
        ));
    };
    let mut cmd = Command::new(binary);
    cmd.arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let spawned = cmd.spawn();
    let mut guard = match spawned {
        Ok(child) => ChildGuard::new(child),
        Err(e) => {
            return RunOutcome::errored(format!(
                "failed to launch {}: {}",
                binary.display(),
                e
            ))
        }
    };
    let stdout = guard.child.stdout.take().map(spawn_reader);
    let stderr = guard.child.stderr.take().map(spawn_reader);

    match wait_bounded(&mut guard, deadline, cancel) {
        WaitResult::Exited(status) => {
            let elapsed = started.elapsed();
            let Some((out, err)) = collect_streams(stdout, stderr, deadline) else {
                // A descendant still holds the pipes, so the group is alive.
                kill_process_group(&guard.child);
                return RunOutcome::timed_out(timeout);
            };
            match status.code() {
                Some(code) => RunOutcome::finished(
                    code,
                    &String::from_utf8_lossy(&out),
                    &String::from_utf8_lossy(&err),
                    elapsed,
                ),
                None => RunOutcome::errored(describe_abnormal_exit(status)),
            }
        }
        WaitResult::TimedOut => {
            guard.terminate();
            drain(stdout, stderr);
            RunOutcome::timed_out(timeout)
        }
        WaitResult::Cancelled => {
            guard.terminate();
            drain(stdout, stderr);
            RunOutcome::errored(CANCELLED_MESSAGE)
        }
        WaitResult::Failed(e) => {
            guard.terminate();
            drain(stdout, stderr);
            RunOutcome::errored(format!("failed waiting for {}: {}", binary.display(), e))
        }
    }
}
