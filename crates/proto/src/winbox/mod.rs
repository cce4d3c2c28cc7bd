//! Winbox (RouterOS management) protocol emulation, server side.
//!
//! Implements the key-exchange, encryption and session-framing layer
//! spoken by Winbox clients before 6.43, faithfully enough that a client
//! cannot tell this emulator from the genuine service.
//!
//! # Architecture
//!
//! The implementation is layered, leaves first:
//!
//! 1. **Cipher** ([`cipher`]) - the modified RC4 engine with carried
//!    mixing state, one instance per stream direction
//! 2. **Key exchange** ([`kex`]) - Diffie-Hellman over the fixed
//!    1984-bit modulus, producing the two directional keys
//! 3. **Framing** ([`frame`]) - length-prefixed frames, the chunked
//!    continuation form, and the encrypted message envelope
//! 4. **Messages** ([`message`]) - tag-scan field extraction and
//!    response synthesis; [`catalog`] builds the package listing and
//!    file-transfer payloads
//! 5. **Session** ([`session`]) - the linear per-connection handshake
//!    state machine
//! 6. **Server** ([`server`]) - TCP listener, one task per connection
//!
//! # Fidelity
//!
//! The cipher's carried cursor and carry byte make every block depend on
//! all prior blocks in its stream; both are preserved exactly, including
//! the asymmetric carry rule between the two directions. Altering either
//! desynchronizes the emulator from a real client after the first
//! message.
//!
//! # Example
//!
//! ```rust,no_run
//! use krait_proto::winbox::MitmServer;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MitmServer::bind("0.0.0.0:8291").await?;
//! server.serve().await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cipher;
pub mod error;
pub mod frame;
pub mod kex;
pub mod message;
pub mod server;
pub mod session;

// Re-export main types
pub use catalog::{Catalog, CatalogEntry, FileDrop};
pub use cipher::{CipherState, Direction, PADDING_LEN, SESSION_KEY_LEN};
pub use error::{Error, Result};
pub use frame::{
    Envelope, Frame, WireFrame, CONTINUATION, HANDLER_DH, HANDLER_ECSRP, HANDLER_FILE,
    MAX_SINGLE_PAYLOAD,
};
pub use kex::{DhExchange, SharedSecretMaterial, PUBLIC_VALUE_LEN};
pub use message::{Credential, LoginRequest};
pub use server::{CredentialCallback, MitmConfig, MitmServer, DEFAULT_PORT};
pub use session::{Session, SessionState, SALT_REQUEST_LEN};
