//! The mongod invocation.
//!
//! The argument list is a pure function of the instance fields. The process
//! table lookup relies on this: the port and data directory that appear on
//! the command line are what identifies our process later.

use mongo_test_core::command::format_command_line;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the server log inside the working directory.
pub const LOG_FILE_NAME: &str = "mongo_log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongodCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl MongodCommand {
    pub fn build(program: &Path, port: u32, dbpath: &Path, oplog_size: u32) -> Self {
        let args = vec![
            "--port".to_string(),
            port.to_string(),
            "--dbpath".to_string(),
            dbpath.to_string_lossy().into_owned(),
            "--noprealloc".to_string(),
            "--nojournal".to_string(),
            "--noauth".to_string(),
            "--nohttpinterface".to_string(),
            "--nssize".to_string(),
            "1".to_string(),
            "--oplogSize".to_string(),
            oplog_size.to_string(),
            "--smallfiles".to_string(),
            "--logpath".to_string(),
            log_path(dbpath).to_string_lossy().into_owned(),
        ];
        Self {
            program: program.to_path_buf(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for MongodCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            format_command_line(self.program.as_os_str(), &self.args)
        )
    }
}

pub fn log_path(dbpath: &Path) -> PathBuf {
    dbpath.join(LOG_FILE_NAME)
}
