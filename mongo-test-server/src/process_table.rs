//! Process discovery and termination.
//!
//! A server process is identified by its command line carrying both the
//! `--port <port>` argument pair and the working-directory path. Either one
//! alone is not enough: an unrelated server may share the port, and a stale
//! process from an earlier run may share the directory name.

use std::path::Path;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, Signal, System, UpdateKind};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSignature {
    port: String,
    dir: String,
}

impl ProcessSignature {
    pub fn new(port: u32, dir: &Path) -> Self {
        Self {
            port: port.to_string(),
            dir: dir.to_string_lossy().into_owned(),
        }
    }

    pub fn matches(&self, cmd: &[String]) -> bool {
        let has_port = cmd
            .windows(2)
            .any(|pair| pair[0] == "--port" && pair[1] == self.port);
        has_port && cmd.iter().any(|arg| arg.contains(&self.dir))
    }
}

// The default process refresh leaves `cmd` empty; it has to be requested.
fn process_snapshot() -> System {
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessRefreshKind::new().with_cmd(UpdateKind::Always));
    system
}

/// PIDs of live processes whose command line satisfies `predicate`.
///
/// The calling process and zombies are never reported.
pub fn pids_where<F>(predicate: F) -> Vec<u32>
where
    F: Fn(&[String]) -> bool,
{
    let system = process_snapshot();
    let own_pid = sysinfo::get_current_pid().ok();

    let mut pids: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(pid, _)| Some(**pid) != own_pid)
        .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
        .filter(|(_, process)| predicate(process.cmd()))
        .map(|(pid, _)| pid.as_u32())
        .collect();
    pids.sort_unstable();
    pids
}

pub fn find_pids(signature: &ProcessSignature) -> Vec<u32> {
    pids_where(|cmd| signature.matches(cmd))
}

/// Send SIGKILL to each PID. Processes that are already gone are skipped.
///
/// Returns how many signals were delivered.
pub fn kill_pids(pids: &[u32]) -> usize {
    if pids.is_empty() {
        return 0;
    }
    let system = process_snapshot();

    pids.iter()
        .filter(|pid| {
            let delivered = system
                .process(Pid::from_u32(**pid))
                .and_then(|process| process.kill_with(Signal::Kill))
                .unwrap_or(false);
            debug!("SIGKILL to pid {}: {}", pid, delivered);
            delivered
        })
        .count()
}
