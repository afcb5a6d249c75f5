pub mod command;
pub mod error;
pub mod output_macros;
pub mod platform;
pub mod temp_dir;
pub mod tracing_init;

pub use error::{MongoTestError, Result};
