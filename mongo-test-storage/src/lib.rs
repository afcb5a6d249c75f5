//! Storage backends for a test server's working directory.
//!
//! A backend owns exactly one directory. [`select_storage`] picks the variant
//! once, when an instance is configured, and the instance keeps it for its
//! whole lifetime so the working directory never moves.

pub mod ram_disk;
pub mod tmp;

pub use ram_disk::RamDiskStorage;
pub use tmp::TmpStorage;

use mongo_test_core::mts_warning;
use mongo_test_core::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Capability contract shared by every working-directory backend.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Short backend name used in log output.
    fn kind(&self) -> &'static str;

    /// Allocate the directory and return its path.
    fn create(&self) -> Result<PathBuf>;

    /// Path of the directory. Stable before `create` and after `delete`.
    fn path(&self) -> &Path;

    /// Release the directory. Succeeds when there is nothing to release.
    fn delete(&self) -> Result<()>;
}

/// Pick the backend for an instance.
///
/// A RAM disk is only used when requested and supported; otherwise a warning
/// is emitted and a plain temp directory is used instead.
pub fn select_storage(name: &str, instance_id: &str, use_ram_disk: bool) -> Box<dyn Storage> {
    if use_ram_disk {
        if RamDiskStorage::supported() {
            info!("Using RAM disk for mongo test server '{}'", name);
            return Box::new(RamDiskStorage::new(name));
        }
        warn!("RAM disk requested for '{}' but not supported on this system", name);
        mts_warning!("can't use a ram disk on this system");
    }
    Box::new(TmpStorage::new(name, instance_id))
}
