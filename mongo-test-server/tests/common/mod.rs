//! Shared fixtures for the lifecycle tests.
//!
//! The fake servers are small shell scripts that accept the mongod command
//! line. One keeps running until killed, the other writes a bind failure to
//! the log and exits non-zero. `FakeServerProbe` stands in for a driver: it
//! reports the port as reachable while a serving fake has `--port <port>` on
//! its command line.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use mongo_test_server::process_table::pids_where;
use mongo_test_server::{tracing_init, DriverProbe, Mongod, ServerSettings, SpawnStrategy};
use std::fs;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const SERVING_NAME: &str = "fake-mongod-serving";

const SERVING_SCRIPT: &str = "#!/bin/sh
while true; do
  sleep 1
done
";

const FAILING_SCRIPT: &str = "#!/bin/sh
logpath=/dev/null
while [ $# -gt 0 ]; do
  if [ \"$1\" = \"--logpath\" ]; then logpath=\"$2\"; fi
  shift
done
echo \"listen(): bind() failed errno:98 Address already in use for socket\" >> \"$logpath\"
echo \"fake mongod: exiting with 48\" >&2
exit 48
";

pub struct FakeServers {
    _temp_dir: TempDir,
    pub serving: PathBuf,
    pub failing: PathBuf,
}

impl FakeServers {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let serving = write_script(temp_dir.path(), SERVING_NAME, SERVING_SCRIPT)?;
        let failing = write_script(temp_dir.path(), "fake-mongod-failing", FAILING_SCRIPT)?;
        Ok(Self {
            _temp_dir: temp_dir,
            serving,
            failing,
        })
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

#[derive(Debug, Default)]
pub struct FakeServerProbe;

impl DriverProbe for FakeServerProbe {
    fn probe(&self, _host: &str, port: u32) -> Result<()> {
        let port = port.to_string();
        let pids = pids_where(|cmd| {
            cmd.iter().any(|arg| arg.ends_with(SERVING_NAME))
                && cmd.windows(2).any(|w| w[0] == "--port" && w[1] == port)
        });
        if pids.is_empty() {
            Err(anyhow!("connection refused"))
        } else {
            Ok(())
        }
    }
}

/// Finds a port nothing is listening on
pub fn find_available_port() -> Result<u32> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(u32::from(port))
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, rand_suffix())
}

fn rand_suffix() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos % 1_000_000_000
}

pub fn fake_settings(name: &str, port: u32, program: &Path, spawn: SpawnStrategy) -> ServerSettings {
    ServerSettings::new()
        .name(name)
        .port(port)
        .path(program)
        .spawn(spawn)
        .readiness(20, Duration::from_millis(100))
}

/// A server backed by the fake `serving` script and probe.
pub fn fake_mongod(servers: &FakeServers, name: &str, port: u32, spawn: SpawnStrategy) -> Mongod {
    // Only the first call per test binary installs the subscriber
    let _ = tracing_init::init_for_testing();
    Mongod::new(fake_settings(name, port, &servers.serving, spawn))
        .with_probe(Box::new(FakeServerProbe))
}

/// Wait until `check` holds, for at most `timeout`.
pub fn wait_for(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}
