use crate::Storage;
use mongo_test_core::command::{is_tool_installed, read_command, run_quiet};
use mongo_test_core::platform::{current_os, Os};
use mongo_test_core::{MongoTestError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// 512-byte sectors, roughly 500MB.
const RAM_DISK_SECTORS: u64 = 1_000_000;

/// Memory-backed HFS+ volume attached through `hdiutil`.
#[derive(Debug)]
pub struct RamDiskStorage {
    volume_name: String,
    path: PathBuf,
    device: Mutex<Option<String>>,
}

impl RamDiskStorage {
    /// Whether the host exposes the disk utility needed for RAM disks.
    pub fn supported() -> bool {
        current_os() == Os::MacOS && is_tool_installed("hdiutil")
    }

    pub fn new(name: &str) -> Self {
        let volume_name = format!("{}-mongo-ram-disk", name);
        let path = PathBuf::from("/Volumes").join(&volume_name);
        Self {
            volume_name,
            path,
            device: Mutex::new(None),
        }
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    /// Device node of the attached disk, if any.
    pub fn device(&self) -> Option<String> {
        self.device.lock().ok().and_then(|d| d.clone())
    }
}

impl Storage for RamDiskStorage {
    fn kind(&self) -> &'static str {
        "ram_disk"
    }

    fn create(&self) -> Result<PathBuf> {
        let mut device = self
            .device
            .lock()
            .map_err(|e| MongoTestError::Storage(format!("RAM disk state poisoned: {}", e)))?;
        if device.is_some() {
            return Ok(self.path.clone());
        }

        let ram_url = format!("ram://{}", RAM_DISK_SECTORS);
        let attached = read_command("hdiutil", &["attach", "-nomount", ram_url.as_str()])?;
        if attached.is_empty() {
            return Err(MongoTestError::Storage(
                "hdiutil attach did not report a device".to_string(),
            ));
        }

        if let Err(e) = read_command(
            "diskutil",
            &["erasevolume", "HFS+", self.volume_name.as_str(), attached.as_str()],
        ) {
            run_quiet("hdiutil", &["detach", attached.as_str()]);
            return Err(e);
        }

        info!("Mounted RAM disk {} at {}", attached, self.path.display());
        *device = Some(attached);
        Ok(self.path.clone())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn delete(&self) -> Result<()> {
        run_quiet("umount", &[self.path.as_os_str()]);
        let device = match self.device.lock() {
            Ok(mut device) => device.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(device) = device {
            run_quiet("hdiutil", &["detach", device.as_str()]);
            debug!("Detached RAM disk {}", device);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_derived_from_name() {
        let storage = RamDiskStorage::new("shop");
        assert_eq!(storage.volume_name(), "shop-mongo-ram-disk");
        assert_eq!(storage.path(), Path::new("/Volumes/shop-mongo-ram-disk"));
        assert!(storage.device().is_none());
    }

    #[test]
    fn test_delete_without_create_is_ok() {
        let storage = RamDiskStorage::new("never-created-ram-disk-test");
        storage.delete().expect("delete should never fail");
        storage.delete().expect("second delete should never fail");
        assert!(storage.device().is_none());
    }
}
