//! Process-wide server for suites that want a single shared instance.
//!
//! The first `configure` call creates the instance; later calls return the
//! existing one and ignore their settings. `reset` stops the instance and
//! clears the slot so a new configuration can take effect.

use crate::mongod::Mongod;
use crate::settings::ServerSettings;
use mongo_test_core::{mts_error, MongoTestError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

static SERVER: Mutex<Option<Arc<Mongod>>> = Mutex::new(None);

fn slot() -> MutexGuard<'static, Option<Arc<Mongod>>> {
    match SERVER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Create the shared server, or return it if it already exists.
pub fn configure(settings: ServerSettings) -> Arc<Mongod> {
    configure_with(|| Mongod::new(settings))
}

/// Like [`configure`], building the instance with `build` on first use.
pub fn configure_with<F>(build: F) -> Arc<Mongod>
where
    F: FnOnce() -> Mongod,
{
    let mut slot = slot();
    if let Some(server) = slot.as_ref() {
        debug!(
            "mongo test server '{}' already configured, ignoring new settings",
            server.name()
        );
        return Arc::clone(server);
    }
    let server = Arc::new(build());
    info!(
        "Configured mongo test server '{}' on port {}",
        server.name(),
        server.port()
    );
    *slot = Some(Arc::clone(&server));
    server
}

pub fn server() -> Option<Arc<Mongod>> {
    slot().clone()
}

pub fn is_configured() -> bool {
    slot().is_some()
}

/// Start the shared server.
pub fn start_server() -> Result<Arc<Mongod>> {
    let Some(server) = server() else {
        mts_error!("MongoTestServer not configured properly!");
        return Err(MongoTestError::NotConfigured);
    };
    server.start()?;
    Ok(server)
}

/// Stop the shared server if one is configured.
pub fn stop_server() {
    if let Some(server) = server() {
        server.stop();
    }
}

/// Stop the shared server and forget it.
pub fn reset() {
    let server = slot().take();
    if let Some(server) = server {
        server.stop();
        debug!("mongo test server '{}' reset", server.name());
    }
}
