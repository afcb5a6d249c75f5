//! Connection descriptors handed to the test suite's Mongo client.
//!
//! Two shapes are produced: the legacy single-host document (`host`/`port`)
//! and the session-list document (`sessions.default.hosts`). Both start from
//! computed defaults and let the caller override individual keys.

use mongo_test_core::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "localhost";

/// Per-key overrides merged over the computed defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoidOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_utc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_activesupport_time_zone: Option<bool>,
}

impl MongoidOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u32) -> Self {
        self.port = Some(port);
        self
    }

    pub fn hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn use_utc(mut self, use_utc: bool) -> Self {
        self.use_utc = Some(use_utc);
        self
    }

    pub fn use_activesupport_time_zone(mut self, enabled: bool) -> Self {
        self.use_activesupport_time_zone = Some(enabled);
        self
    }
}

/// Legacy single-host connection document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoidOptions {
    pub host: String,
    pub port: u32,
    pub database: String,
    pub use_utc: bool,
    pub use_activesupport_time_zone: bool,
}

impl MongoidOptions {
    pub fn new(name: &str, port: u32) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port,
            database: default_database(name),
            use_utc: false,
            use_activesupport_time_zone: true,
        }
    }

    pub fn merged(mut self, overrides: &MongoidOverrides) -> Self {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(database) = &overrides.database {
            self.database = database.clone();
        }
        if let Some(use_utc) = overrides.use_utc {
            self.use_utc = use_utc;
        }
        if let Some(enabled) = overrides.use_activesupport_time_zone {
            self.use_activesupport_time_zone = enabled;
        }
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

/// Session-list connection document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mongoid3Options {
    pub hosts: Vec<String>,
    pub database: String,
    pub use_utc: bool,
    pub use_activesupport_time_zone: bool,
}

#[derive(Debug, Serialize)]
struct SessionsDocument<'a> {
    sessions: DefaultSession<'a>,
}

#[derive(Debug, Serialize)]
struct DefaultSession<'a> {
    default: &'a Mongoid3Options,
}

impl Mongoid3Options {
    pub fn new(name: &str, port: u32) -> Self {
        Self {
            hosts: vec![format!("{}:{}", DEFAULT_HOST, port)],
            database: default_database(name),
            use_utc: false,
            use_activesupport_time_zone: true,
        }
    }

    pub fn merged(mut self, overrides: &MongoidOverrides) -> Self {
        if let Some(hosts) = &overrides.hosts {
            self.hosts = hosts.clone();
        }
        if let Some(database) = &overrides.database {
            self.database = database.clone();
        }
        if let Some(use_utc) = overrides.use_utc {
            self.use_utc = use_utc;
        }
        if let Some(enabled) = overrides.use_activesupport_time_zone {
            self.use_activesupport_time_zone = enabled;
        }
        self
    }

    /// Render as `sessions.default.*`.
    pub fn to_yaml(&self) -> Result<String> {
        let document = SessionsDocument {
            sessions: DefaultSession { default: self },
        };
        Ok(serde_yaml_ng::to_string(&document)?)
    }
}

pub fn default_database(name: &str) -> String {
    format!("{}_test_db", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml_ng::Value;

    #[test]
    fn test_legacy_defaults() {
        let options = MongoidOptions::new("foo", 11129);
        assert_eq!(
            options,
            MongoidOptions {
                host: "localhost".to_string(),
                port: 11129,
                database: "foo_test_db".to_string(),
                use_utc: false,
                use_activesupport_time_zone: true,
            }
        );
    }

    #[test]
    fn test_override_touches_only_given_key() {
        let defaults = MongoidOptions::new("foo", 11129);
        let merged = defaults
            .clone()
            .merged(&MongoidOverrides::new().use_utc(true));
        assert!(merged.use_utc);
        assert_eq!(merged.host, defaults.host);
        assert_eq!(merged.port, defaults.port);
        assert_eq!(merged.database, defaults.database);
        assert_eq!(
            merged.use_activesupport_time_zone,
            defaults.use_activesupport_time_zone
        );
    }

    #[test]
    fn test_session_defaults_and_overrides() {
        let options = Mongoid3Options::new("foo", 11129);
        assert_eq!(options.hosts, vec!["localhost:11129".to_string()]);
        assert_eq!(options.database, "foo_test_db");

        let merged = options.merged(&MongoidOverrides::new().database("other_db"));
        assert_eq!(merged.database, "other_db");
        assert_eq!(merged.hosts, vec!["localhost:11129".to_string()]);
    }

    #[test]
    fn test_legacy_yaml_shape() {
        let yaml = MongoidOptions::new("foo", 11129).to_yaml().unwrap();
        let value: Value = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(value["host"].as_str(), Some("localhost"));
        assert_eq!(value["port"].as_u64(), Some(11129));
        assert_eq!(value["database"].as_str(), Some("foo_test_db"));
        assert_eq!(value["use_utc"].as_bool(), Some(false));
        assert_eq!(value["use_activesupport_time_zone"].as_bool(), Some(true));
    }

    #[test]
    fn test_sessions_yaml_shape() {
        let yaml = Mongoid3Options::new("foo", 11129).to_yaml().unwrap();
        let value: Value = serde_yaml_ng::from_str(&yaml).unwrap();
        let default = &value["sessions"]["default"];
        assert_eq!(default["hosts"][0].as_str(), Some("localhost:11129"));
        assert_eq!(default["database"].as_str(), Some("foo_test_db"));
        assert_eq!(default["use_utc"].as_bool(), Some(false));
    }
}
