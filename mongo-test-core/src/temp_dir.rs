use std::io::Result;
use tempfile::{Builder, NamedTempFile};

/// Creates a secure temporary file.
/// The file is automatically deleted when the `NamedTempFile` object is dropped.
pub fn create_temp_file(prefix: &str, suffix: &str) -> Result<NamedTempFile> {
    Builder::new().prefix(prefix).suffix(suffix).tempfile()
}
