//! Error types for Winbox protocol operations
//!
//! This module defines a unified error type for the Winbox emulation,
//! covering framing, key exchange and handshake failures.
//!
//! Every error is fatal to the connection that produced it: a
//! desynchronized cipher stream cannot be resynchronized, so there is no
//! recovery path short of a fresh handshake on a new connection.

use std::fmt;

/// Result type for Winbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Winbox protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Frame carried an unexpected handler identifier
    UnexpectedHandler {
        /// Expected handler identifier
        expected: u8,
        /// Handler identifier actually received
        actual: u8,
    },

    /// Client never downgraded to the supported key exchange
    UnsupportedClient(u8),

    /// Payload length differs from the protocol-fixed value
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Payload too large for a single non-chunked frame
    PayloadTooLarge(usize),

    /// Continuation frame received where a single frame was required
    UnexpectedContinuation,

    /// Malformed continuation marker while reassembling chunks
    InvalidContinuation {
        /// First marker byte
        first: u8,
        /// Second marker byte
        second: u8,
    },

    /// A required tag sequence was not found in a decrypted payload
    TagNotFound(&'static str),

    /// A tagged field ran past the end of the payload
    Truncated {
        /// Field being extracted
        field: &'static str,
        /// Bytes required past the tag
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Extracted field was not valid UTF-8
    InvalidUtf8(&'static str),

    /// Key exchange failed (peer public value out of range)
    Exchange(String),

    /// Peer did not respond within the per-step read timeout
    Timeout(&'static str),

    /// I/O error
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedHandler { expected, actual } => {
                write!(
                    f,
                    "Unexpected handler: expected 0x{:02x}, got 0x{:02x}",
                    expected, actual
                )
            }
            Error::UnsupportedClient(handler) => {
                write!(
                    f,
                    "Client did not request a supported key exchange: 0x{:02x}",
                    handler
                )
            }
            Error::InvalidLength { expected, actual } => {
                write!(f, "Invalid length: expected {}, got {}", expected, actual)
            }
            Error::PayloadTooLarge(len) => {
                write!(f, "Payload too large for a single frame: {} bytes", len)
            }
            Error::UnexpectedContinuation => {
                write!(f, "Unexpected continuation frame")
            }
            Error::InvalidContinuation { first, second } => {
                write!(
                    f,
                    "Invalid continuation marker: 0x{:02x} 0x{:02x}",
                    first, second
                )
            }
            Error::TagNotFound(field) => write!(f, "Tag not found: {}", field),
            Error::Truncated {
                field,
                needed,
                available,
            } => {
                write!(
                    f,
                    "Truncated {}: need {} bytes, have {}",
                    field, needed, available
                )
            }
            Error::InvalidUtf8(field) => write!(f, "Field is not valid UTF-8: {}", field),
            Error::Exchange(msg) => write!(f, "Key exchange error: {}", msg),
            Error::Timeout(step) => write!(f, "Timed out waiting for {}", step),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// Convert from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

// Lift into the workspace-unified error at the public API boundary.
impl From<Error> for krait_platform::KraitError {
    fn from(err: Error) -> Self {
        use krait_platform::KraitError;
        match err {
            Error::Exchange(msg) => KraitError::Security(msg),
            Error::Timeout(step) => KraitError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out waiting for {}", step),
            )),
            Error::Io(msg) => KraitError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg)),
            other => KraitError::Protocol(other.to_string()),
        }
    }
}
