//! Ephemeral mongod instances for test suites.
//!
//! ```no_run
//! use mongo_test_server::{Mongod, ServerSettings};
//!
//! let server = Mongod::new(ServerSettings::new().name("shop").port(11129));
//! server.start()?;
//! // ... run tests against localhost:11129 ...
//! server.stop();
//! # Ok::<(), mongo_test_server::MongoTestError>(())
//! ```

pub mod client_config;
pub mod command_line;
pub mod markers;
pub mod mongod;
pub mod probe;
pub mod process_table;
pub mod registry;
pub mod settings;
pub mod spawn;

pub use client_config::{MongoidOptions, MongoidOverrides, Mongoid3Options};
pub use mongo_test_core::{tracing_init, MongoTestError, Result};
pub use mongod::Mongod;
pub use probe::{DriverProbe, TcpProbe};
pub use settings::{ReadinessSettings, ServerSettings, DEFAULT_PORT};
pub use spawn::SpawnStrategy;
