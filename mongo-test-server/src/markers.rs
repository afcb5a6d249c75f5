//! Sentinel files recording the lifecycle of a server instance.
//!
//! The files live inside the working directory, so anything that can see the
//! directory (including another process after the parent crashed) can tell
//! whether the server was started, killed or failed. A missing working
//! directory reads as "not started" and "killed".

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const STARTED_MARKER: &str = "started";
pub const KILLED_MARKER: &str = "killed";
pub const ERROR_MARKER: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    dir: PathBuf,
}

impl Markers {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_started(&self) -> bool {
        self.dir.is_dir() && self.dir.join(STARTED_MARKER).exists()
    }

    pub fn is_killed(&self) -> bool {
        !self.dir.is_dir() || self.dir.join(KILLED_MARKER).exists()
    }

    pub fn has_error(&self) -> bool {
        self.dir.join(ERROR_MARKER).exists()
    }

    /// Diagnostic text written by the process monitor, if any.
    pub fn error_message(&self) -> Option<String> {
        fs::read(self.dir.join(ERROR_MARKER))
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn set_started(&self, started: bool) {
        self.set_marker(STARTED_MARKER, started);
    }

    pub fn set_killed(&self, killed: bool) {
        self.set_marker(KILLED_MARKER, killed);
    }

    /// Readers polling `has_error` must never see a half-written file.
    pub fn write_error(&self, message: &str) -> io::Result<()> {
        let partial = self.dir.join(format!(".{}.partial", ERROR_MARKER));
        fs::write(&partial, message)?;
        fs::rename(&partial, self.dir.join(ERROR_MARKER))
    }

    // Markers are only touched while the directory exists; the directory
    // may disappear underneath us during teardown, which is not an error.
    fn set_marker(&self, marker: &str, present: bool) {
        if !self.dir.is_dir() {
            return;
        }
        let path = self.dir.join(marker);
        let result = if present {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map(|_| ())
        } else {
            match fs::remove_file(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        };
        if let Err(e) = result {
            debug!("Could not update marker {}: {}", path.display(), e);
        }
    }
}
