//! Error types for promsink

use std::fmt;

/// Result type alias for promsink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for promsink
#[derive(Debug)]
pub enum Error {
    /// Snappy block decompression failed
    Decompression(snap::Error),
    /// Payload is not a valid remote-write protobuf message
    Protocol(prost::DecodeError),
    /// A slot on the intake channel carried no sample
    NullSample,
    /// The sink rejected a single sample
    Persist(String),
    /// Transaction commit failed
    Commit(String),
    /// Database driver errors (connect, begin, schema provisioning)
    Database(sqlx::Error),
    /// Configuration errors
    Config(String),
    /// IO errors
    Io(std::io::Error),
    /// Internal error
    Internal(String),
}

impl Error {
    /// Short, stable name of the error kind, used as a metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Decompression(_) => "decompression",
            Error::Protocol(_) => "protocol",
            Error::NullSample => "null_sample",
            Error::Persist(_) => "persist",
            Error::Commit(_) => "commit",
            Error::Database(_) => "database",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Internal(_) => "internal",
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decompression(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Database(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decompression(e) => write!(f, "Decompression error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::NullSample => write!(f, "Sample can't be missing"),
            Error::Persist(msg) => write!(f, "Persist error: {}", msg),
            Error::Commit(msg) => write!(f, "Commit error: {}", msg),
            Error::Database(e) => write!(f, "Database error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<snap::Error> for Error {
    fn from(e: snap::Error) -> Self {
        Error::Decompression(e)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Protocol(e)
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Database(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
