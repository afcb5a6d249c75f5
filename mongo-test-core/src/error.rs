use thiserror::Error;

#[derive(Error, Debug)]
pub enum MongoTestError {
    /// An operation was requested before any server was configured.
    #[error("MongoTestServer not configured properly!")]
    NotConfigured,

    /// The server never became reachable. The diagnostic already contains the
    /// command line, the probe failure and the server log tail.
    #[error("{diagnostic}")]
    Startup { diagnostic: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MongoTestError {
    pub fn startup(diagnostic: impl Into<String>) -> Self {
        MongoTestError::Startup {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_startup_failure(&self) -> bool {
        matches!(self, MongoTestError::Startup { .. })
    }
}

impl From<serde_yaml_ng::Error> for MongoTestError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        MongoTestError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MongoTestError>;
