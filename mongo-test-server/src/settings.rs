//! Settings for a single test server instance.
//!
//! Settings come either from direct values (`ServerSettings::new().port(..)`),
//! from a native YAML file, or from the first host of a Mongoid-style config
//! file. Every field has a default so partial documents are accepted.

use crate::spawn::SpawnStrategy;
use mongo_test_core::command::resolve_executable;
use mongo_test_core::{MongoTestError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Standard mongod port.
pub const DEFAULT_PORT: u32 = 27017;

/// Environment variable consulted when no executable path is configured.
pub const EXECUTABLE_ENV: &str = "MONGO_TEST_SERVER_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Instance name; a random number when unset
    #[serde(default)]
    pub name: Option<String>,

    /// Port for mongod (default: 27017). Out-of-range values are accepted here
    /// and rejected by the server itself.
    #[serde(default = "default_port")]
    pub port: u32,

    /// Path to the mongod binary; looked up on PATH when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Put the data directory on a RAM disk where supported
    #[serde(default)]
    pub use_ram_disk: bool,

    /// Oplog size in MB
    #[serde(default = "default_oplog_size")]
    pub oplog_size: u32,

    #[serde(default)]
    pub readiness: ReadinessSettings,

    #[serde(default)]
    pub spawn: SpawnStrategy,
}

/// Retry budget for the readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSettings {
    /// Retries after the first failed probe
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause between probes in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_port() -> u32 {
    DEFAULT_PORT
}

fn default_oplog_size() -> u32 {
    200
}

fn default_retries() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    500
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl ReadinessSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Worst-case time spent sleeping between probes.
    pub fn budget(&self) -> Duration {
        self.interval() * self.retries
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: None,
            port: default_port(),
            path: None,
            use_ram_disk: false,
            oplog_size: default_oplog_size(),
            readiness: ReadinessSettings::default(),
            spawn: SpawnStrategy::default(),
        }
    }
}

impl ServerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u32) -> Self {
        self.port = port;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn use_ram_disk(mut self, use_ram_disk: bool) -> Self {
        self.use_ram_disk = use_ram_disk;
        self
    }

    pub fn oplog_size(mut self, oplog_size: u32) -> Self {
        self.oplog_size = oplog_size;
        self
    }

    pub fn readiness(mut self, retries: u32, interval: Duration) -> Self {
        self.readiness = ReadinessSettings {
            retries,
            interval_ms: interval.as_millis() as u64,
        };
        self
    }

    pub fn spawn(mut self, spawn: SpawnStrategy) -> Self {
        self.spawn = spawn;
        self
    }

    /// Load settings from a YAML file containing the fields above.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = serde_yaml_ng::from_str(&contents)?;
        Ok(settings)
    }

    /// Extract port and name from a Mongoid config file.
    ///
    /// Reads `<environment>.sessions.default.hosts[0]` (`host:port`), falling
    /// back to the older single-host `<environment>.port` layout.
    pub fn from_mongoid_config(path: &Path, environment: &str, app_name: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let document: Value = serde_yaml_ng::from_str(&contents)?;
        let port = mongoid_port(&document, environment).ok_or_else(|| {
            MongoTestError::Config(format!(
                "No mongo port for environment '{}' in {}",
                environment,
                path.display()
            ))
        })?;
        Ok(Self::new().name(app_name).port(port))
    }

    /// Name to use for the instance, generating a random one when unset.
    pub fn resolve_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| rand::rng().random_range(100_000..=900_000).to_string())
    }

    /// Executable to spawn: explicit path, then `MONGO_TEST_SERVER_PATH`, then PATH lookup.
    pub fn resolve_executable(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        if let Some(path) = std::env::var_os(EXECUTABLE_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        resolve_executable("mongod").unwrap_or_else(|| PathBuf::from("mongod"))
    }
}

fn mongoid_port(document: &Value, environment: &str) -> Option<u32> {
    let env = document.get(environment)?;
    let session_host = env
        .get("sessions")
        .and_then(|s| s.get("default"))
        .and_then(|d| d.get("hosts"))
        .and_then(|h| h.as_sequence())
        .and_then(|hosts| hosts.first())
        .and_then(|host| host.as_str());

    match session_host {
        Some(host) => host.rsplit(':').next()?.trim().parse().ok(),
        None => env.get("port").and_then(|p| p.as_u64()).and_then(|p| u32::try_from(p).ok()),
    }
}
