//! Running the server in the background.
//!
//! The server is always run by a monitor routine that waits for it to exit
//! and records an unexpected failure in the `error` marker. Where the monitor
//! runs is a strategy: a forked process (unix) or a dedicated thread. Code
//! above [`SpawnChild`] does not know or care which one was used.

use crate::command_line::MongodCommand;
use crate::markers::Markers;
use duct::cmd;
use mongo_test_core::platform::supports_fork;
use mongo_test_core::temp_dir::create_temp_file;
use mongo_test_core::{MongoTestError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnStrategy {
    /// Fork a monitor process
    Process,
    /// Run the monitor on a dedicated thread
    Thread,
}

impl Default for SpawnStrategy {
    fn default() -> Self {
        if supports_fork() {
            SpawnStrategy::Process
        } else {
            SpawnStrategy::Thread
        }
    }
}

impl SpawnStrategy {
    pub fn spawner(self) -> Box<dyn SpawnChild> {
        match self {
            #[cfg(unix)]
            SpawnStrategy::Process => Box::new(ProcessSpawner),
            #[cfg(not(unix))]
            SpawnStrategy::Process => {
                warn!("Process spawning needs fork; using a monitor thread instead");
                Box::new(ThreadSpawner)
            }
            SpawnStrategy::Thread => Box::new(ThreadSpawner),
        }
    }
}

/// Everything the monitor routine needs to run and report on the server.
#[derive(Debug, Clone)]
pub struct MonitorJob {
    pub command: MongodCommand,
    pub markers: Markers,
    pub log_path: PathBuf,
}

/// What happened to the server, as seen by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Exited successfully, or was killed on purpose
    Clean,
    /// Failed on its own; the `error` marker was written
    Failed,
}

pub trait SpawnChild: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Start the monitor for `job` and return without waiting for the server.
    fn spawn(&self, job: MonitorJob) -> Result<ChildHandle>;
}

/// Handle to a running monitor.
#[derive(Debug)]
pub enum ChildHandle {
    #[cfg(unix)]
    Process(nix::unistd::Pid),
    Thread(JoinHandle<MonitorOutcome>),
}

impl ChildHandle {
    /// PID of the monitor, when it runs as its own process.
    pub fn pid(&self) -> Option<u32> {
        match self {
            #[cfg(unix)]
            ChildHandle::Process(pid) => u32::try_from(pid.as_raw()).ok(),
            ChildHandle::Thread(_) => None,
        }
    }

    /// Wait up to `timeout` for the monitor to finish.
    ///
    /// A monitor process still running after the timeout is killed and
    /// reaped. A monitor thread cannot be killed and is left detached.
    pub fn reap(self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        match self {
            #[cfg(unix)]
            ChildHandle::Process(pid) => {
                use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
                loop {
                    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                        Ok(WaitStatus::StillAlive) if Instant::now() < deadline => {
                            thread::sleep(REAP_POLL_INTERVAL);
                        }
                        Ok(WaitStatus::StillAlive) => {
                            // A forked monitor must never outlive its handle
                            debug!("Monitor process {} still running, killing it", pid);
                            let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
                            let status = waitpid(pid, None);
                            debug!("Monitor process {} reaped: {:?}", pid, status);
                            return;
                        }
                        Ok(status) => {
                            debug!("Monitor process {} reaped: {:?}", pid, status);
                            return;
                        }
                        Err(e) => {
                            debug!("Monitor process {} already gone: {}", pid, e);
                            return;
                        }
                    }
                }
            }
            ChildHandle::Thread(handle) => {
                while !handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(REAP_POLL_INTERVAL);
                }
                if handle.is_finished() {
                    match handle.join() {
                        Ok(outcome) => debug!("Monitor thread finished: {:?}", outcome),
                        Err(_) => warn!("Monitor thread panicked"),
                    }
                } else {
                    debug!("Monitor thread still running, detaching");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl SpawnChild for ThreadSpawner {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn spawn(&self, job: MonitorJob) -> Result<ChildHandle> {
        let handle = thread::Builder::new()
            .name("mongod-monitor".to_string())
            .spawn(move || {
                let outcome = run_monitored(&job);
                debug!("mongod exited: {:?}", outcome);
                outcome
            })?;
        Ok(ChildHandle::Thread(handle))
    }
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

#[cfg(unix)]
impl SpawnChild for ProcessSpawner {
    fn name(&self) -> &'static str {
        "process"
    }

    fn spawn(&self, job: MonitorJob) -> Result<ChildHandle> {
        use nix::unistd::{fork, ForkResult};

        // SAFETY: the child only runs the monitor routine (process spawn,
        // wait and file writes) and then exits without returning to the caller.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!("Forked monitor process {}", child);
                Ok(ChildHandle::Process(child))
            }
            Ok(ForkResult::Child) => {
                let code = match run_monitored(&job) {
                    MonitorOutcome::Clean => 0,
                    MonitorOutcome::Failed => 1,
                };
                std::process::exit(code);
            }
            Err(e) => Err(MongoTestError::Command(format!(
                "Failed to fork monitor for '{}': {}",
                job.command, e
            ))),
        }
    }
}

/// Run the server to completion and record unexpected failures.
///
/// Stderr is captured to a temporary file. A non-zero exit while the instance
/// is not marked killed writes the command line, the server log and the
/// captured stderr into the `error` marker and marks the instance killed, so
/// a concurrent readiness poll can give up early.
///
/// This also runs inside a forked child, so it does not log.
pub fn run_monitored(job: &MonitorJob) -> MonitorOutcome {
    let stderr_file = create_temp_file("error", ".log").ok();

    let mut expression = cmd(job.command.program(), job.command.args())
        .stdin_null()
        .stdout_null()
        .unchecked();
    expression = match &stderr_file {
        Some(file) => expression.stderr_path(file.path()),
        None => expression.stderr_null(),
    };

    let failure = match expression.run() {
        Ok(output) if output.status.success() => None,
        Ok(output) => Some(format!("exit status {}", output.status)),
        Err(e) => Some(e.to_string()),
    };

    let Some(failure) = failure else {
        return MonitorOutcome::Clean;
    };
    if job.markers.is_killed() {
        return MonitorOutcome::Clean;
    }

    let log = fs::read(&job.log_path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|_| "No mongo log on disk".to_string());
    let stderr = stderr_file
        .as_ref()
        .and_then(|file| fs::read_to_string(file.path()).ok())
        .unwrap_or_else(|| "No error file on disk".to_string());

    let message = format!(
        "<Mongod> Error executing command: {}\n\
         <Mongod> Exit: {}\n\
         <Mongod> Result is: {}\n\
         <Mongod> Error is: {}\n",
        job.command, failure, log, stderr
    );
    let _ = job.markers.write_error(&message);
    job.markers.set_killed(true);
    MonitorOutcome::Failed
}
