//! Readiness probes.
//!
//! A probe answers one question: does something accept connections on
//! `host:port` right now? The default [`TcpProbe`] opens and closes a plain
//! TCP connection; a test suite that already links a Mongo driver can plug in
//! its own client instead.

use anyhow::{anyhow, Context, Result};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub trait DriverProbe: Send + Sync + std::fmt::Debug {
    /// Open and close a connection to `host:port`.
    fn probe(&self, host: &str, port: u32) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl DriverProbe for TcpProbe {
    fn probe(&self, host: &str, port: u32) -> Result<()> {
        let port = u16::try_from(port)
            .map_err(|_| anyhow!("port {} is outside the valid TCP range", port))?;
        let addrs = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}:{}", host, port))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    let _ = stream.shutdown(Shutdown::Both);
                    return Ok(());
                }
                Err(e) => last_error = Some(anyhow!("{}: {}", addr, e)),
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("{}:{} did not resolve", host, port)))
    }
}
