//! Common error types for passvault.

use thiserror::Error;

/// Top-level error type for passvault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Wrong passphrase, or the container is not a readable vault.
    #[error("Invalid passphrase or file format: {0}")]
    InvalidPasswordOrFormat(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted in the current state.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Conflict detected.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Feature is not available.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Why opening a vault file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailure {
    FileNotFound,
    InvalidPasswordOrFormat,
    Unknown,
}

impl Error {
    /// Classify this error as a load failure kind.
    ///
    /// Callers use this to prompt specifically for a wrong passphrase
    /// instead of reporting a generic I/O problem.
    pub fn load_failure(&self) -> LoadFailure {
        match self {
            Error::NotFound(_) => LoadFailure::FileNotFound,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => LoadFailure::FileNotFound,
            Error::InvalidPasswordOrFormat(_) => LoadFailure::InvalidPasswordOrFormat,
            _ => LoadFailure::Unknown,
        }
    }

    /// Whether this error came from a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The bare message carried by the error, without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Crypto(m)
            | Error::InvalidPasswordOrFormat(m)
            | Error::Storage(m)
            | Error::Serialization(m)
            | Error::InvalidInput(m)
            | Error::NotPermitted(m)
            | Error::NotFound(m)
            | Error::AlreadyExists(m)
            | Error::Conflict(m)
            | Error::Unsupported(m) => m.clone(),
            Error::Io(e) => e.to_string(),
            Error::Cancelled => "Operation cancelled".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
