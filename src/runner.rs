//! Subordinate simulation process runner
//!
//! Builds `<runtime> <classpath-flag> <classpath> <entry-point> <tasks> <workers>`,
//! runs it to completion while draining both pipes, and hands back stdout.
//! A run may be bounded by a deadline and/or a cancellation token; when either
//! fires the subordinate's process group gets SIGTERM, then SIGKILL after the
//! grace period. [`CancellationToken::on_interrupt`] turns Ctrl-C into a
//! cancellation so the subordinate is never left running on its own.

use nix::sys::signal::{killpg, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{HarnessError, Result};

/// Builder for the simulation command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationCommand {
    runtime: String,
    classpath: Option<(String, String)>,
    entry_point: Option<String>,
    task_count: u32,
    worker_count: u32,
}

impl SimulationCommand {
    /// Start a command for the given runtime with the default 50 tasks / 3 workers
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            classpath: None,
            entry_point: None,
            task_count: 50,
            worker_count: 3,
        }
    }

    /// Set the resolution path and the flag that introduces it; an empty
    /// flag passes the path as a bare argument
    pub fn classpath(mut self, flag: impl Into<String>, path: impl Into<String>) -> Self {
        self.classpath = Some((flag.into(), path.into()));
        self
    }

    pub fn entry_point(mut self, entry: impl Into<String>) -> Self {
        self.entry_point = Some(entry.into());
        self
    }

    pub fn task_count(mut self, tasks: u32) -> Self {
        self.task_count = tasks;
        self
    }

    pub fn worker_count(mut self, workers: u32) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Full argument vector, runtime first
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.runtime.clone()];
        if let Some((flag, path)) = &self.classpath {
            if !flag.is_empty() {
                argv.push(flag.clone());
            }
            argv.push(path.clone());
        }
        if let Some(entry) = &self.entry_point {
            argv.push(entry.clone());
        }
        argv.push(self.task_count.to_string());
        argv.push(self.worker_count.to_string());
        argv
    }

    fn to_command(&self) -> Command {
        let argv = self.argv();
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

/// Set by the SIGINT handler
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn record_interrupt(_signal: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Shared flag for cooperative cancellation of a running simulation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    on_interrupt: bool,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is also cancelled when this process receives SIGINT.
    ///
    /// Installs a process-wide SIGINT handler; after this Ctrl-C no longer
    /// kills the harness outright.
    pub fn on_interrupt() -> Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(record_interrupt),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe
        unsafe { sigaction(Signal::SIGINT, &action) }
            .map_err(|errno| HarnessError::Io(std::io::Error::from(errno)))?;
        Ok(Self {
            flag: Arc::default(),
            on_interrupt: true,
        })
    }

    /// Request cancellation; the runner notices at its next poll
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || (self.on_interrupt && INTERRUPTED.load(Ordering::SeqCst))
    }
}

/// Limits applied to one simulation run
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Deadline measured from spawn; `None` blocks until exit
    pub timeout: Option<Duration>,
    /// Time between SIGTERM and SIGKILL
    pub grace_period: Duration,
    /// How often a bounded run checks the child, the deadline and the token
    pub poll_interval: Duration,
    pub cancel: Option<CancellationToken>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            grace_period: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            cancel: None,
        }
    }
}

impl ExecutionOptions {
    fn is_bounded(&self) -> bool {
        self.timeout.is_some() || self.cancel.is_some()
    }
}

/// Captured result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Run the simulation and return its output, or the reason it failed
pub fn run(command: &SimulationCommand, options: &ExecutionOptions) -> Result<RunOutput> {
    let mut cmd = command.to_command();
    // A bounded run owns its process group so termination reaches any
    // grandchildren holding our pipes
    if options.is_bounded() {
        cmd.process_group(0);
    }

    debug!(argv = ?command.argv(), "spawning simulation");
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| HarnessError::Launch {
        program: command.runtime().to_string(),
        source,
    })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let outcome = match wait_for(&mut child, options, start) {
        Ok(outcome) => outcome,
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
    };
    let elapsed = start.elapsed();

    // Pipes close once the process group is gone, so the readers finish
    let stdout = join_reader(stdout_reader)?;
    let stderr = String::from_utf8_lossy(&join_reader(stderr_reader)?).into_owned();

    match outcome {
        WaitOutcome::Exited(status) if status.success() => {
            let stdout = String::from_utf8(stdout).map_err(|_| HarnessError::InvalidOutput)?;
            Ok(RunOutput {
                stdout,
                stderr,
                elapsed,
            })
        }
        WaitOutcome::Exited(status) => Err(HarnessError::NonZeroExit { status, stderr }),
        WaitOutcome::TimedOut => Err(HarnessError::Timeout { after: elapsed }),
        WaitOutcome::Cancelled => Err(HarnessError::Cancelled),
    }
}

/// Run the simulation and return its stdout, reporting any failure to the
/// operator and returning `None` so no summary is produced downstream
pub fn capture_telemetry(command: &SimulationCommand, options: &ExecutionOptions) -> Option<String> {
    info!(argv = ?command.argv(), "running simulation");
    match run(command, options) {
        Ok(output) => {
            info!(elapsed = ?output.elapsed, bytes = output.stdout.len(), "simulation finished");
            if !output.stderr.is_empty() {
                debug!(stderr = %output.stderr.trim_end(), "simulation wrote to stderr");
            }
            Some(output.stdout)
        }
        Err(err) => {
            report_failure(&err);
            None
        }
    }
}

fn report_failure(err: &HarnessError) {
    error!(error = %err, "simulation run failed");
    eprintln!("Error running simulation:");
    match err {
        HarnessError::NonZeroExit { stderr, .. } if !stderr.trim().is_empty() => {
            eprintln!("{}", stderr.trim_end());
        }
        other => eprintln!("{}", other),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_reader(reader: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    match reader {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| HarnessError::Io(std::io::Error::other("pipe reader thread panicked")))?
            .map_err(HarnessError::Io),
    }
}

fn wait_for(child: &mut Child, options: &ExecutionOptions, start: Instant) -> Result<WaitOutcome> {
    if !options.is_bounded() {
        return Ok(WaitOutcome::Exited(child.wait()?));
    }

    // A deadline beyond what Instant can represent never fires
    let deadline = options
        .timeout
        .and_then(|timeout| start.checked_add(timeout));
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(WaitOutcome::Exited(status));
        }
        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            warn!("cancellation requested, terminating simulation");
            terminate(child, options.grace_period)?;
            return Ok(WaitOutcome::Cancelled);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!(timeout = ?options.timeout, "simulation deadline passed, terminating");
            terminate(child, options.grace_period)?;
            return Ok(WaitOutcome::TimedOut);
        }
        thread::sleep(options.poll_interval);
    }
}

/// SIGTERM the child's process group, escalate to SIGKILL after `grace`
fn terminate(child: &mut Child, grace: Duration) -> Result<()> {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(errno) = killpg(pgid, Signal::SIGTERM) {
        debug!(%errno, "SIGTERM to process group failed");
    }

    let deadline = Instant::now().checked_add(grace);
    loop {
        match child.try_wait()? {
            Some(status) => {
                debug!(%status, "simulation exited after SIGTERM");
                // Take down any stragglers left in the group
                let _ = killpg(pgid, Signal::SIGKILL);
                return Ok(());
            }
            None if deadline.map_or(true, |deadline| Instant::now() >= deadline) => break,
            None => thread::sleep(Duration::from_millis(10)),
        }
    }

    warn!("simulation ignored SIGTERM, sending SIGKILL");
    if killpg(pgid, Signal::SIGKILL).is_err() {
        child.kill()?;
    }
    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> SimulationCommand {
        // `sh -c <script> <entry> <tasks> <workers>`: the trailing arguments
        // become $0, $1, $2 inside the script
        SimulationCommand::new("sh")
            .classpath("-c", script)
            .entry_point("sim")
    }

    #[test]
    fn test_argv_order() {
        let cmd = SimulationCommand::new("java")
            .classpath("-cp", "out")
            .entry_point("com.scheduler.Simulation")
            .task_count(10)
            .worker_count(4);
        assert_eq!(
            cmd.argv(),
            vec!["java", "-cp", "out", "com.scheduler.Simulation", "10", "4"]
        );
    }

    #[test]
    fn test_argv_without_flag() {
        let cmd = SimulationCommand::new("./sim").classpath("", "data");
        assert_eq!(cmd.argv(), vec!["./sim", "data", "50", "3"]);
    }

    #[test]
    fn test_run_returns_stdout_verbatim() {
        let cmd = sh("printf 'QueueWaitTime,TotalSimTimeMs\\n5,10\\n'");
        let out = run(&cmd, &ExecutionOptions::default()).unwrap();
        assert_eq!(out.stdout, "QueueWaitTime,TotalSimTimeMs\n5,10\n");
    }

    #[test]
    fn test_run_passes_positional_counts() {
        let cmd = sh("echo \"$1 $2\"").task_count(7).worker_count(2);
        let out = run(&cmd, &ExecutionOptions::default()).unwrap();
        assert_eq!(out.stdout.trim(), "7 2");
    }

    #[test]
    fn test_run_measures_elapsed_time() {
        let cmd = sh("sleep 0.2");
        let out = run(&cmd, &ExecutionOptions::default()).unwrap();
        assert!(out.elapsed >= Duration::from_millis(200));
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn test_non_zero_exit_captures_stderr() {
        let cmd = sh("echo 'class not found' >&2; exit 3");
        let err = run(&cmd, &ExecutionOptions::default()).unwrap_err();
        match err {
            HarnessError::NonZeroExit { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert!(stderr.contains("class not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_runtime_is_launch_error() {
        let cmd = SimulationCommand::new("/nonexistent/runtime-binary");
        let err = run(&cmd, &ExecutionOptions::default()).unwrap_err();
        assert!(matches!(err, HarnessError::Launch { .. }));
        assert!(err.to_string().contains("/nonexistent/runtime-binary"));
    }

    #[test]
    fn test_capture_telemetry_absent_on_failure() {
        let cmd = sh("exit 1");
        assert!(capture_telemetry(&cmd, &ExecutionOptions::default()).is_none());
    }

    #[test]
    fn test_capture_telemetry_present_on_success() {
        let cmd = sh("echo ok");
        assert_eq!(
            capture_telemetry(&cmd, &ExecutionOptions::default()).as_deref(),
            Some("ok\n")
        );
    }

    #[test]
    fn test_timeout_terminates_subordinate() {
        let cmd = sh("sleep 30");
        let options = ExecutionOptions {
            timeout: Some(Duration::from_millis(200)),
            grace_period: Duration::from_millis(200),
            ..ExecutionOptions::default()
        };
        let start = Instant::now();
        let err = run(&cmd, &options).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_sigterm_ignored_escalates_to_sigkill() {
        let cmd = sh("trap '' TERM; while true; do sleep 1; done");
        let options = ExecutionOptions {
            timeout: Some(Duration::from_millis(200)),
            grace_period: Duration::from_millis(200),
            ..ExecutionOptions::default()
        };
        let start = Instant::now();
        let err = run(&cmd, &options).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_cancellation_terminates_subordinate() {
        let token = CancellationToken::new();
        let options = ExecutionOptions {
            cancel: Some(token.clone()),
            ..ExecutionOptions::default()
        };
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            token.cancel();
        });

        let err = run(&sh("sleep 30"), &options).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, HarnessError::Cancelled));
    }

    #[test]
    fn test_bounded_run_that_finishes_in_time() {
        let options = ExecutionOptions {
            timeout: Some(Duration::from_secs(10)),
            ..ExecutionOptions::default()
        };
        let out = run(&sh("echo fast"), &options).unwrap();
        assert_eq!(out.stdout, "fast\n");
    }

    #[test]
    fn test_timeout_past_instant_range_waits_normally() {
        let options = ExecutionOptions {
            timeout: Some(Duration::from_secs_f64(1e19)),
            ..ExecutionOptions::default()
        };
        let out = run(&sh("echo done"), &options).unwrap();
        assert_eq!(out.stdout, "done\n");
    }

    #[test]
    fn test_plain_token_ignores_interrupt_flag() {
        let plain = CancellationToken::new();
        let interruptible = CancellationToken {
            flag: Arc::default(),
            on_interrupt: true,
        };
        assert!(!interruptible.is_cancelled());

        INTERRUPTED.store(true, Ordering::SeqCst);
        let seen = (plain.is_cancelled(), interruptible.is_cancelled());
        INTERRUPTED.store(false, Ordering::SeqCst);
        assert_eq!(seen, (false, true));

        plain.clone().cancel();
        assert!(plain.is_cancelled());
    }

    #[test]
    fn test_large_output_does_not_deadlock() {
        // Well past a typical 64 KiB pipe buffer, on both streams
        let cmd = sh("i=0; while [ $i -lt 20000 ]; do echo 0123456789; echo err >&2; i=$((i+1)); done");
        let out = run(&cmd, &ExecutionOptions::default()).unwrap();
        assert_eq!(out.stdout.lines().count(), 20000);
    }

    #[test]
    fn test_non_utf8_stdout_rejected() {
        let cmd = sh("printf '\\377\\376'");
        let err = run(&cmd, &ExecutionOptions::default()).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidOutput));
    }
}
