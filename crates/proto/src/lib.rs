//! Protocol implementations for the Krait man-in-the-middle toolkit.
//!
//! This crate provides a faithful server-side emulation of the RouterOS
//! Winbox management protocol as spoken by clients before 6.43:
//!
//! - **Winbox** (default) - key exchange, session encryption and the
//!   application handshake (salt, login, package listing, file transfer)
//!
//! # Features
//!
//! - `winbox` (default) - Winbox protocol support
//!
//! # Example
//!
//! ```rust
//! use krait_proto::winbox::Frame;
//!
//! // Build and serialize a wire frame
//! let frame = Frame::new(0x05, b"payload".to_vec());
//! let wire = frame.encode().unwrap();
//!
//! // Parse from wire format
//! let parsed = Frame::decode(&wire).unwrap();
//! assert_eq!(parsed.payload, b"payload");
//! ```
//!
//! # Security
//!
//! The session cipher implemented here reproduces the legacy Winbox stream
//! cipher bit-for-bit, including its weaknesses. It exists to interoperate
//! with real clients for research purposes and must not be used to protect
//! anything.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "winbox")]
pub mod winbox;
