//! Typed NNTP client façade
//!
//! Thin per-command wrappers over the framed connection: each operation
//! builds its command, runs it through the connection's lock, and maps the
//! status code to a typed record or error.

mod articles;
mod group_ops;
mod listing;
mod posting;

use crate::commands;
use crate::config::ServerConfig;
use crate::connection::NntpConnection;
use crate::error::Result;
use crate::response::NntpResponse;
use tracing::debug;

/// Async NNTP client
///
/// Cloning is cheap and clones share the underlying connection. Commands
/// from concurrent clones are serialised by the connection's command lock.
///
/// # Example
///
/// ```no_run
/// use nntp_stream::{NntpClient, ServerConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ServerConfig::tls("news.example.com").with_credentials("user", "pass");
/// let client = NntpClient::connect(config).await?;
///
/// let info = client.group("alt.binaries.test").await?;
/// println!("group has {} articles ({}-{})", info.count, info.low, info.high);
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Clone)]
pub struct NntpClient {
    conn: NntpConnection,
}

impl std::fmt::Debug for NntpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NntpClient").finish_non_exhaustive()
    }
}

impl NntpClient {
    /// Connect and, when the config carries credentials, authenticate
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let credentials = config.credentials.clone();
        let conn = NntpConnection::connect(config).await?;
        if let Some(creds) = credentials {
            conn.authenticate(&creds.username, &creds.password).await?;
        }
        Ok(Self { conn })
    }

    /// The underlying framed connection
    pub fn connection(&self) -> &NntpConnection {
        &self.conn
    }

    /// Send QUIT and close the connection
    pub async fn quit(&self) -> Result<NntpResponse> {
        let response = self.conn.command(&commands::quit()).await?;
        debug!("server said goodbye: {} {}", response.code, response.message);
        self.conn.close().await;
        Ok(response)
    }

    /// Close the connection without the QUIT exchange
    pub async fn close(&self) {
        self.conn.close().await;
    }

    /// Best-effort synchronous close for drop paths
    pub(crate) fn shutdown(&self) {
        self.conn.shutdown();
    }
}
