use std::env;

/// Operating systems the test server distinguishes between.
///
/// Only two facts depend on the host: whether a fork-based monitor process is
/// available, and whether RAM disks can be attached through `hdiutil`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    MacOS,
    Windows,
    Unsupported,
}

pub fn current_os() -> Os {
    match env::consts::OS {
        "linux" => Os::Linux,
        "macos" => Os::MacOS,
        "windows" => Os::Windows,
        _ => Os::Unsupported,
    }
}

/// Whether the host can fork a monitor process for the server.
pub fn supports_fork() -> bool {
    cfg!(unix)
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let os_str = match self {
            Os::Linux => "linux",
            Os::MacOS => "darwin",
            Os::Windows => "windows",
            Os::Unsupported => "unsupported_os",
        };
        write!(f, "{}", os_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_os_matches_target() {
        let os = current_os();
        #[cfg(target_os = "linux")]
        assert_eq!(os, Os::Linux);
        #[cfg(target_os = "macos")]
        assert_eq!(os, Os::MacOS);
        #[cfg(target_os = "windows")]
        assert_eq!(os, Os::Windows);
        assert_ne!(os.to_string(), "");
    }

    #[test]
    fn test_fork_support_follows_unix() {
        assert_eq!(supports_fork(), cfg!(unix));
    }
}
