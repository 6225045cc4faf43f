use thiserror::Error;

/// Top-level crate error. Persistence failures are fatal: the process aborts
/// so systemd (or whatever supervises it) restarts it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize or deserialize state: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to persist state file {path}: {source}")]
    Persistence { path: String, source: std::io::Error },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of a reservation-engine operation that did not succeed. Carries
/// the client-facing message and a temporary/permanent retry hint.
#[derive(Debug, Clone)]
pub struct EngineError {
    pub message: String,
    pub temporary: bool,
}

impl EngineError {
    pub fn permanent(message: impl Into<String>) -> Self {
        EngineError { message: message.into(), temporary: false }
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        EngineError { message: message.into(), temporary: true }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
