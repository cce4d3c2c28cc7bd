//! Integration tests for the Winbox MITM server.
//!
//! These tests drive a mirrored client over localhost TCP through the
//! complete protocol flow:
//! - exchange-request downgrade
//! - Diffie-Hellman key exchange
//! - encrypted salt and login rounds
//! - chunk-encoded package listing, listing close and file transfer

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use krait_proto::winbox::{
    catalog, frame, message, Credential, CipherState, Direction, DhExchange, Envelope, Error,
    Frame, MitmConfig, MitmServer, WireFrame, HANDLER_DH, HANDLER_ECSRP, HANDLER_FILE,
    PADDING_LEN, PUBLIC_VALUE_LEN, SALT_REQUEST_LEN,
};

/// Captured credentials shared between the server callback and the test.
type Captured = Arc<Mutex<Option<Credential>>>;

/// Starts a server and returns its address, the session's join handle and
/// the credential capture slot.
async fn start_server(
    config: MitmConfig,
) -> (SocketAddr, JoinHandle<krait_proto::winbox::Result<()>>, Captured) {
    let captured: Captured = Arc::new(Mutex::new(None));
    let slot = captured.clone();

    let mut server = MitmServer::bind_with_config("127.0.0.1:0", config)
        .await
        .unwrap();
    server.set_credential_callback(Arc::new(move |credential| {
        *slot.lock().unwrap() = Some(credential.clone());
    }));
    let addr = server.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let session = server.accept().await.unwrap();
        session.run().await
    });

    (addr, handle, captured)
}

/// Client half of an established session, with mirrored cipher engines.
struct TestClient {
    stream: TcpStream,
    to_server: CipherState,
    from_server: CipherState,
}

impl TestClient {
    /// Connects and completes the key exchange, optionally opening with
    /// an ECSRP request to exercise the downgrade path.
    async fn establish(addr: SocketAddr, downgrade: bool) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();

        if downgrade {
            let probe = Frame::new(HANDLER_ECSRP, vec![1, 2, 3, 4, 5]);
            frame::write_frame(&mut stream, &probe).await.unwrap();
        }

        let exchange = DhExchange::new();
        let request = Frame::new(HANDLER_DH, exchange.public_value().to_vec());
        frame::write_frame(&mut stream, &request).await.unwrap();

        let reply = frame::read_frame(&mut stream).await.unwrap();
        assert_eq!(reply.handler, HANDLER_DH);
        assert_eq!(reply.payload.len(), PUBLIC_VALUE_LEN);

        let material = exchange.compute_shared(&reply.payload).unwrap();

        // The client's sending stream is the server's inbound one, so the
        // directions mirror: same key halves, same carry behavior.
        Self {
            stream,
            to_server: CipherState::new(material.inbound_key(), Direction::Inbound),
            from_server: CipherState::new(material.outbound_key(), Direction::Outbound),
        }
    }

    async fn send_encrypted(&mut self, plaintext: &[u8]) {
        let sealed = self
            .to_server
            .encrypt_block(plaintext, &[0u8; PADDING_LEN]);
        let envelope = Envelope::from_sealed(plaintext.len() as u16, &sealed);
        let frame = Frame::new(HANDLER_DH, envelope.to_payload());
        frame::write_frame(&mut self.stream, &frame).await.unwrap();
    }

    async fn read_encrypted(&mut self) -> Vec<u8> {
        let frame = frame::read_frame(&mut self.stream).await.unwrap();
        assert_eq!(frame.handler, HANDLER_DH);
        let envelope = Envelope::parse(&frame.payload).unwrap();
        let clear = self
            .from_server
            .decrypt_block(&envelope.body, &envelope.padding);
        clear[PADDING_LEN..].to_vec()
    }

    /// Runs the salt round. The request body is opaque to the server; any
    /// body of the right framed size will do.
    async fn salt_round(&mut self) -> Vec<u8> {
        let body = vec![0x5A; SALT_REQUEST_LEN - 2 - PADDING_LEN];
        self.send_encrypted(&body).await;
        self.read_encrypted().await
    }

    /// Runs the login round with the given username and digest, returning
    /// the decrypted acknowledgement.
    async fn login_round(&mut self, username: &str, digest: [u8; 16]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x06, 0x00, 0xff, 0x09, 0x07]);
        body.extend_from_slice(&[0x01, 0x00, 0x00, 0x21]);
        body.push(username.len() as u8);
        body.extend_from_slice(username.as_bytes());
        body.extend_from_slice(&[0x0a, 0x00, 0x00, 0x31, 0x11, 0x00]);
        body.extend_from_slice(&digest);

        self.send_encrypted(&body).await;
        self.read_encrypted().await
    }
}

#[tokio::test]
async fn test_full_handshake_with_downgrade_and_catalog() {
    let mut config = MitmConfig::default();
    config.serve_catalog = true;
    let reference = config.clone();

    let (addr, handle, captured) = start_server(config).await;
    let mut client = TestClient::establish(addr, true).await;

    // Salt round: the fixed zero-length-salt response comes back.
    let salt_response = client.salt_round().await;
    assert_eq!(salt_response, message::SALT_RESPONSE);

    // Login round: always acknowledged, echoing our fields verbatim.
    let digest = [0xAB; 16];
    let ack = client.login_round("mike", digest).await;
    let mut expected_hash = vec![0x0a, 0x00, 0x00, 0x31, 0x11, 0x00];
    expected_hash.extend_from_slice(&digest);
    assert_eq!(
        ack,
        message::login_response(&[0x06, 0x00, 0xff, 0x09, 0x07], &expected_hash)
    );

    // Package listing, chunk-encoded.
    let list_request = Frame::new(HANDLER_FILE, b"list".to_vec());
    frame::write_frame(&mut client.stream, &list_request)
        .await
        .unwrap();
    match frame::read_wire(&mut client.stream).await.unwrap() {
        WireFrame::ChunkedStart { handler } => assert_eq!(handler, HANDLER_FILE),
        other => panic!("expected chunked listing, got {:?}", other),
    }
    let listing = frame::read_chunked_payload(&mut client.stream, catalog::listing_total_len)
        .await
        .unwrap();
    assert_eq!(listing, catalog::listing_payload(&reference.catalog));
    assert!(listing
        .windows(b"lol.txt".len())
        .any(|window| window == b"lol.txt"));

    // Listing close echoes the catalog length.
    frame::write_frame(&mut client.stream, &list_request)
        .await
        .unwrap();
    let close = frame::read_frame(&mut client.stream).await.unwrap();
    assert_eq!(close.handler, HANDLER_FILE);
    assert_eq!(close.payload, catalog::close_payload(&reference.catalog));

    // File transfer for the traversal entry.
    let name = reference.catalog.entries[0].name.clone();
    let file_request = Frame::new(HANDLER_FILE, name.into_bytes());
    frame::write_frame(&mut client.stream, &file_request)
        .await
        .unwrap();
    let transfer = frame::read_frame(&mut client.stream).await.unwrap();
    assert_eq!(transfer.handler, HANDLER_FILE);
    assert_eq!(transfer.payload, reference.file_drop.transfer_payload());

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok(), "server session failed: {:?}", result);

    let credential = captured.lock().unwrap().clone().expect("no credential captured");
    assert_eq!(credential.username, "mike");
    assert_eq!(credential.digest, digest);
}

#[tokio::test]
async fn test_direct_exchange_ends_after_login() {
    // Without the catalog extension the session completes at the login
    // acknowledgement, and a client that skips the ECSRP probe is served
    // just the same.
    let (addr, handle, captured) = start_server(MitmConfig::default()).await;
    let mut client = TestClient::establish(addr, false).await;

    let salt_response = client.salt_round().await;
    assert_eq!(salt_response, message::SALT_RESPONSE);

    let ack = client.login_round("admin", [0x01; 16]).await;
    assert!(!ack.is_empty());

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(
        captured.lock().unwrap().as_ref().unwrap().username,
        "admin"
    );
}

#[tokio::test]
async fn test_downgrade_requires_dh_second() {
    // After an ignored ECSRP request, anything but a DH request is an
    // unsupported client and the connection is torn down.
    let (addr, handle, _) = start_server(MitmConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let probe = Frame::new(HANDLER_ECSRP, vec![1, 2, 3, 4, 5]);
    frame::write_frame(&mut stream, &probe).await.unwrap();
    let bogus = Frame::new(0x03, vec![0xAA]);
    frame::write_frame(&mut stream, &bogus).await.unwrap();

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(result, Err(Error::UnsupportedClient(0x03)));

    // The socket is closed; the next read sees EOF.
    assert!(frame::read_frame(&mut stream).await.is_err());
}

#[tokio::test]
async fn test_unknown_first_handler_aborts() {
    let (addr, handle, _) = start_server(MitmConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let bogus = Frame::new(0x01, vec![0xAA]);
    frame::write_frame(&mut stream, &bogus).await.unwrap();

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(
        result,
        Err(Error::UnexpectedHandler {
            expected: HANDLER_DH,
            actual: 0x01
        })
    );
}

#[tokio::test]
async fn test_wrong_public_value_length_aborts() {
    let (addr, handle, _) = start_server(MitmConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let short = Frame::new(HANDLER_DH, vec![0x42; 10]);
    frame::write_frame(&mut stream, &short).await.unwrap();

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(
        result,
        Err(Error::InvalidLength {
            expected: PUBLIC_VALUE_LEN,
            actual: 10
        })
    );
}

#[tokio::test]
async fn test_malformed_login_aborts() {
    let (addr, handle, captured) = start_server(MitmConfig::default()).await;
    let mut client = TestClient::establish(addr, false).await;
    client.salt_round().await;

    // A login payload with no username tag is a protocol violation.
    client.send_encrypted(b"not a login message").await;

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(result, Err(Error::TagNotFound("username")));
    assert!(captured.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let mut config = MitmConfig::default();
    config.read_timeout = Duration::from_millis(100);

    let (addr, handle, _) = start_server(config).await;
    let _stream = TcpStream::connect(addr).await.unwrap();

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(result, Err(Error::Timeout("key exchange request")));
}
