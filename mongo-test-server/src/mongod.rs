//! A single locally spawned mongod and its working directory.
//!
//! The marker files in the working directory are the source of truth for the
//! lifecycle; nothing about started/killed/failed is kept in memory. `start`
//! blocks until the server answers or has definitely failed, and `stop` can
//! be called at any time, any number of times.

use crate::client_config::{MongoidOptions, MongoidOverrides, Mongoid3Options};
use crate::command_line::{self, MongodCommand};
use crate::markers::Markers;
use crate::probe::{DriverProbe, TcpProbe};
use crate::process_table::{self, ProcessSignature};
use crate::settings::{ReadinessSettings, ServerSettings};
use crate::spawn::{ChildHandle, MonitorJob, SpawnChild};
use mongo_test_core::{MongoTestError, Result};
use mongo_test_storage::{select_storage, Storage};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

const PROBE_HOST: &str = "localhost";

/// Lines of the server log included in a startup failure.
const LOG_TAIL_LINES: usize = 50;

/// How long `stop` waits for the monitor to notice the kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

const DIAGNOSTIC_PREFIX: &str = "<Mongod>";

#[derive(Debug)]
pub struct Mongod {
    name: String,
    port: u32,
    path: PathBuf,
    instance_id: String,
    oplog_size: u32,
    readiness: ReadinessSettings,
    storage: Box<dyn Storage>,
    spawner: Box<dyn SpawnChild>,
    probe: Box<dyn DriverProbe>,
    child: Mutex<Option<ChildHandle>>,
    configured: bool,
}

impl Mongod {
    pub fn new(settings: ServerSettings) -> Self {
        let name = settings.resolve_name();
        let instance_id = generate_instance_id();
        let storage = select_storage(&name, &instance_id, settings.use_ram_disk);
        debug!(
            "Configured mongod '{}' on port {} in {} ({})",
            name,
            settings.port,
            storage.path().display(),
            storage.kind()
        );

        Self {
            path: settings.resolve_executable(),
            port: settings.port,
            oplog_size: settings.oplog_size,
            readiness: settings.readiness,
            spawner: settings.spawn.spawner(),
            probe: Box::new(TcpProbe::default()),
            child: Mutex::new(None),
            configured: true,
            storage,
            instance_id,
            name,
        }
    }

    /// Replace the readiness probe, e.g. with a real driver connection.
    pub fn with_probe(mut self, probe: Box<dyn DriverProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    /// Change the port. Takes effect on the next `start`.
    pub fn set_port(&mut self, port: u32) {
        self.port = port;
    }

    pub fn executable_path(&self) -> &Path {
        &self.path
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn uses_ram_disk(&self) -> bool {
        self.storage.kind() == "ram_disk"
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn working_directory(&self) -> &Path {
        self.storage.path()
    }

    pub fn log_path(&self) -> PathBuf {
        command_line::log_path(self.working_directory())
    }

    pub fn command(&self) -> MongodCommand {
        MongodCommand::build(
            &self.path,
            self.port,
            self.working_directory(),
            self.oplog_size,
        )
    }

    pub fn command_line(&self) -> String {
        self.command().to_string()
    }

    pub fn markers(&self) -> Markers {
        Markers::new(self.working_directory())
    }

    pub fn started(&self) -> bool {
        self.markers().is_started()
    }

    pub fn killed(&self) -> bool {
        self.markers().is_killed()
    }

    pub fn error(&self) -> bool {
        self.markers().has_error()
    }

    pub fn error_message(&self) -> Option<String> {
        self.markers().error_message()
    }

    fn signature(&self) -> ProcessSignature {
        ProcessSignature::new(self.port, self.working_directory())
    }

    /// PIDs of processes running with this instance's port and directory.
    pub fn pids(&self) -> Vec<u32> {
        process_table::find_pids(&self.signature())
    }

    pub fn running(&self) -> bool {
        !self.pids().is_empty()
    }

    /// Start the server and block until it accepts connections.
    ///
    /// Does nothing when the instance is already started and its process is
    /// alive. Any failure stops the instance before the error is returned.
    pub fn start(&self) -> Result<&Self> {
        if self.started() && self.running() {
            debug!("mongod '{}' already running on port {}", self.name, self.port);
            return Ok(self);
        }

        let span = info_span!("mongod_start", name = %self.name, port = self.port);
        let _enter = span.enter();

        self.reap_child(Duration::ZERO);
        self.prepare()?;

        // Something else owns the port; our server could never bind it
        if self.probe.probe(PROBE_HOST, self.port).is_ok() {
            let reason = format!(
                "port {} is already accepting connections from another process",
                self.port
            );
            return Err(self.fail_start(&reason));
        }

        let job = MonitorJob {
            command: self.command(),
            markers: self.markers(),
            log_path: self.log_path(),
        };
        match self.spawner.spawn(job) {
            Ok(handle) => self.store_child(handle),
            Err(e) => return Err(self.fail_start(&e.to_string())),
        }
        debug!("Spawned '{}' via {}", self.command_line(), self.spawner.name());

        self.wait_until_ready()?;
        info!(
            "mongod '{}' ready on port {} ({})",
            self.name,
            self.port,
            self.working_directory().display()
        );
        Ok(self)
    }

    /// Kill the server and remove its working directory. Never fails.
    pub fn stop(&self) -> &Self {
        let markers = self.markers();
        let pids = self.pids();
        markers.set_killed(true);
        markers.set_started(false);

        let killed = process_table::kill_pids(&pids);
        if !pids.is_empty() {
            info!(
                "Killed {} of {} mongod process(es) for '{}'",
                killed,
                pids.len(),
                self.name
            );
        }

        self.reap_child(REAP_TIMEOUT);
        if let Err(e) = self.storage.delete() {
            warn!("Could not remove {}: {}", self.working_directory().display(), e);
        }
        self
    }

    // Wipe whatever a previous run left behind
    fn prepare(&self) -> Result<()> {
        self.storage.delete()?;
        self.storage.create()?;
        Ok(())
    }

    fn wait_until_ready(&self) -> Result<()> {
        let markers = self.markers();
        let mut retries = self.readiness.retries;

        loop {
            markers.set_started(true);
            let failure = match self.probe.probe(PROBE_HOST, self.port) {
                Ok(()) => match self.confirm_own_server(&markers) {
                    Ok(()) => return Ok(()),
                    Err(reason) => reason,
                },
                Err(e) => e.to_string(),
            };

            if retries > 0 && !markers.is_killed() && !markers.has_error() {
                retries -= 1;
                debug!("mongod not ready ({}), {} retries left", failure, retries);
                thread::sleep(self.readiness.interval());
                continue;
            }

            return Err(self.fail_start(&failure));
        }
    }

    // A successful probe only counts when our own server answered it
    fn confirm_own_server(&self, markers: &Markers) -> std::result::Result<(), String> {
        if markers.has_error() {
            return Err("mongod reported an error while starting".to_string());
        }
        if !self.running() {
            return Err(format!(
                "port {} answered but no mongod for {} is running",
                self.port,
                self.working_directory().display()
            ));
        }
        Ok(())
    }

    fn fail_start(&self, reason: &str) -> MongoTestError {
        self.markers().set_started(false);
        let diagnostic = self.failure_diagnostic(reason);
        warn!("mongod '{}' failed to start: {}", self.name, reason);
        self.stop();
        MongoTestError::startup(diagnostic)
    }

    fn failure_diagnostic(&self, reason: &str) -> String {
        let mut lines = vec![
            format!("{} cmd was: {}", DIAGNOSTIC_PREFIX, self.command_line()),
            format!(
                "{} ERROR: Failed to connect to mongo database: {}",
                DIAGNOSTIC_PREFIX, reason
            ),
        ];

        let log_path = self.log_path();
        match fs::read(&log_path) {
            Ok(bytes) => {
                let log = String::from_utf8_lossy(&bytes);
                let all: Vec<&str> = log.lines().collect();
                let tail = &all[all.len().saturating_sub(LOG_TAIL_LINES)..];
                lines.extend(tail.iter().map(|l| format!("{} {}", DIAGNOSTIC_PREFIX, l)));
            }
            Err(_) => lines.push(format!("No mongo log on disk at {}", log_path.display())),
        }

        if let Some(error) = self.error_message() {
            lines.extend(error.lines().map(str::to_string));
        }
        lines.join("\n")
    }

    fn store_child(&self, handle: ChildHandle) {
        let mut child = match self.child.lock() {
            Ok(child) => child,
            Err(poisoned) => poisoned.into_inner(),
        };
        *child = Some(handle);
    }

    fn reap_child(&self, timeout: Duration) {
        let handle = match self.child.lock() {
            Ok(mut child) => child.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.reap(timeout);
        }
    }

    /// PID of the forked monitor process, while this handle holds one.
    pub fn monitor_pid(&self) -> Option<u32> {
        match self.child.lock() {
            Ok(child) => child.as_ref().and_then(ChildHandle::pid),
            Err(poisoned) => poisoned.into_inner().as_ref().and_then(ChildHandle::pid),
        }
    }

    fn has_child(&self) -> bool {
        match self.child.lock() {
            Ok(child) => child.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    pub fn mongoid_options(&self, overrides: &MongoidOverrides) -> MongoidOptions {
        MongoidOptions::new(&self.name, self.port).merged(overrides)
    }

    pub fn mongoid3_options(&self, overrides: &MongoidOverrides) -> Mongoid3Options {
        Mongoid3Options::new(&self.name, self.port).merged(overrides)
    }

    pub fn mongoid_yml(&self, overrides: &MongoidOverrides) -> Result<String> {
        self.mongoid_options(overrides).to_yaml()
    }

    pub fn mongoid3_yml(&self, overrides: &MongoidOverrides) -> Result<String> {
        self.mongoid3_options(overrides).to_yaml()
    }
}

impl Drop for Mongod {
    fn drop(&mut self) {
        if self.has_child() {
            self.stop();
        }
    }
}

/// `<unix seconds>_<random 6 digits>`
fn generate_instance_id() -> String {
    format!(
        "{}_{}",
        chrono::Utc::now().timestamp(),
        rand::rng().random_range(100_000..=900_000)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::SpawnStrategy;

    fn settings(name: &str) -> ServerSettings {
        ServerSettings::new()
            .name(name)
            .port(11129)
            .path("/usr/bin/mongod")
            .spawn(SpawnStrategy::Thread)
    }

    #[test]
    fn test_instance_id_format() {
        let id = generate_instance_id();
        let (seconds, suffix) = id.split_once('_').expect("underscore");
        assert!(seconds.parse::<i64>().unwrap() > 0);
        let suffix: u32 = suffix.parse().unwrap();
        assert!((100_000..=900_000).contains(&suffix));
    }

    #[test]
    fn test_working_directory_is_stable() {
        let server = Mongod::new(settings("stable"));
        let dir = server.working_directory().to_path_buf();
        assert!(dir
            .to_string_lossy()
            .ends_with(&format!("stable_mongo_testserver_{}", server.instance_id())));
        assert_eq!(server.working_directory(), dir);
        assert_eq!(server.log_path(), dir.join("mongo_log"));
        assert!(server.is_configured());
        assert!(!server.uses_ram_disk());
    }

    #[test]
    fn test_same_name_gets_distinct_directories() {
        let a = Mongod::new(settings("twin"));
        let b = Mongod::new(settings("twin"));
        assert_ne!(a.instance_id(), b.instance_id());
        assert_ne!(a.working_directory(), b.working_directory());
    }

    #[test]
    fn test_never_started_instance() {
        let server = Mongod::new(settings("idle"));
        assert!(!server.started());
        assert!(server.killed());
        assert!(!server.error());
        assert!(!server.running());
        assert!(server.pids().is_empty());

        server.stop().stop();
        assert!(!server.working_directory().exists());
    }

    #[test]
    fn test_command_line_uses_instance_fields() {
        let mut server = Mongod::new(settings("cmd"));
        server.set_port(11130);
        let line = server.command_line();
        assert!(line.starts_with("/usr/bin/mongod --port 11130 --dbpath "));
        assert!(line.contains(&server.working_directory().to_string_lossy().into_owned()));
        assert!(line.ends_with(&format!("--logpath {}", server.log_path().display())));
    }

    #[test]
    fn test_mongoid_options_from_instance() {
        let server = Mongod::new(settings("foo"));
        let options = server.mongoid_options(&MongoidOverrides::default());
        assert_eq!(options, MongoidOptions::new("foo", 11129));

        let options = server.mongoid_options(&MongoidOverrides::new().use_utc(true));
        assert!(options.use_utc);
        assert_eq!(options.database, "foo_test_db");

        let sessions = server.mongoid3_options(&MongoidOverrides::default());
        assert_eq!(sessions.hosts, vec!["localhost:11129".to_string()]);

        let yml = server.mongoid3_yml(&MongoidOverrides::default()).unwrap();
        assert!(yml.contains("localhost:11129"));
    }

    #[test]
    fn test_failure_diagnostic_without_log() {
        let server = Mongod::new(settings("diag"));
        let diagnostic = server.failure_diagnostic("connection refused");
        let lines: Vec<&str> = diagnostic.lines().collect();
        assert_eq!(lines[0], format!("<Mongod> cmd was: {}", server.command_line()));
        assert_eq!(
            lines[1],
            "<Mongod> ERROR: Failed to connect to mongo database: connection refused"
        );
        assert!(lines[2].starts_with("No mongo log on disk at "));
    }

    #[test]
    fn test_failure_diagnostic_keeps_log_tail() {
        let server = Mongod::new(settings("tail"));
        server.prepare().unwrap();
        let log: String = (0..120).map(|i| format!("log line {}\n", i)).collect();
        fs::write(server.log_path(), log).unwrap();

        let diagnostic = server.failure_diagnostic("timeout");
        assert!(diagnostic.contains("<Mongod> log line 119"));
        assert!(diagnostic.contains("<Mongod> log line 70"));
        assert!(!diagnostic.contains("log line 69\n"));

        server.stop();
        assert!(!server.working_directory().exists());
    }
}
