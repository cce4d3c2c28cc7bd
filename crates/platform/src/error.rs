//! Error types for Krait

use std::fmt;

/// Unified error type for all Krait operations
#[derive(Debug)]
pub enum KraitError {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Protocol error
    Protocol(String),

    /// Security error (key exchange, malicious input, etc.)
    Security(String),

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for KraitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KraitError::Io(e) => write!(f, "IO error: {}", e),
            KraitError::Config(msg) => write!(f, "Configuration error: {}", msg),
            KraitError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            KraitError::Security(msg) => write!(f, "Security error: {}", msg),
            KraitError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for KraitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KraitError::Io(e) => Some(e),
            KraitError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KraitError {
    fn from(err: std::io::Error) -> Self {
        KraitError::Io(err)
    }
}

/// Result type for Krait operations
pub type KraitResult<T> = Result<T, KraitError>;
