use crate::Storage;
use mongo_test_core::{MongoTestError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Plain directory under the system temp root.
#[derive(Debug, Clone)]
pub struct TmpStorage {
    path: PathBuf,
}

impl TmpStorage {
    /// Directory named `<name>_mongo_testserver_<instance_id>` in the temp root.
    pub fn new(name: &str, instance_id: &str) -> Self {
        Self::in_dir(&std::env::temp_dir(), name, instance_id)
    }

    /// Same naming as [`TmpStorage::new`] under an explicit root.
    pub fn in_dir(root: &Path, name: &str, instance_id: &str) -> Self {
        Self {
            path: root.join(format!("{}_mongo_testserver_{}", name, instance_id)),
        }
    }
}

impl Storage for TmpStorage {
    fn kind(&self) -> &'static str {
        "tmp"
    }

    fn create(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.path).map_err(|e| {
            MongoTestError::Storage(format!(
                "Failed to create directory {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!("Created working directory {}", self.path.display());
        Ok(self.path.clone())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn delete(&self) -> Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!("Removed working directory {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MongoTestError::Storage(format!(
                "Failed to remove directory {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
