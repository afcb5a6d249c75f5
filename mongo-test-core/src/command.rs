// Standard library
use std::ffi::OsStr;
use std::path::PathBuf;

// Internal imports
use crate::error::{MongoTestError, Result};

// External crates
use duct::cmd;
use tracing::debug;
use which::which;

/// Render a program and its arguments as a single space separated line.
pub fn format_command_line<A: AsRef<OsStr>>(program: &OsStr, args: &[A]) -> String {
    std::iter::once(program.to_string_lossy())
        .chain(args.iter().map(|a| a.as_ref().to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command and return its trimmed stdout. Stderr is discarded.
pub fn read_command<A: AsRef<OsStr>>(program: &str, args: &[A]) -> Result<String> {
    let full_command = format_command_line(OsStr::new(program), args);
    debug!("Running: {}", full_command);

    let output = cmd(program, args)
        .stderr_null()
        .read()
        .map_err(|e| MongoTestError::Command(format!("'{}': {}", full_command, e)))?;
    Ok(output.trim().to_string())
}

/// Run a command for its side effect only, ignoring any failure.
///
/// Returns whether the command exited successfully.
pub fn run_quiet<A: AsRef<OsStr>>(program: &str, args: &[A]) -> bool {
    match cmd(program, args)
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
    {
        Ok(output) => output.status.success(),
        Err(e) => {
            debug!("Could not run {}: {}", program, e);
            false
        }
    }
}

/// Checks if a command-line tool is available in the system's PATH.
pub fn is_tool_installed(tool_name: &str) -> bool {
    which(tool_name).is_ok()
}

/// Resolve a tool name to its full path, like `which <tool>`.
pub fn resolve_executable(tool_name: &str) -> Option<PathBuf> {
    which(tool_name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_command_line() {
        let line = format_command_line(OsStr::new("/usr/bin/mongod"), &["--port", "11129"]);
        assert_eq!(line, "/usr/bin/mongod --port 11129");

        let empty: [&str; 0] = [];
        assert_eq!(format_command_line(OsStr::new("mongod"), &empty), "mongod");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_command_trims_output() {
        let out = read_command("echo", &["  hello  "]).expect("echo should run");
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_command_reports_failure() {
        let err = read_command("false", &[] as &[&str]).unwrap_err();
        assert!(err.to_string().contains("false"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_quiet_never_fails() {
        assert!(run_quiet("true", &[] as &[&str]));
        assert!(!run_quiet("false", &[] as &[&str]));
        assert!(!run_quiet("definitely-not-a-real-tool-xyz", &[] as &[&str]));
    }

    #[test]
    fn test_missing_tool_is_not_installed() {
        assert!(!is_tool_installed("definitely-not-a-real-tool-xyz"));
        assert!(resolve_executable("definitely-not-a-real-tool-xyz").is_none());
    }
}
