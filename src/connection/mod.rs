//! Framed NNTP connection
//!
//! One socket, one command lock. Every command holds the lock from the
//! write through the last read of its response, so commands from concurrent
//! callers never interleave on the wire. A failed socket is rebuilt by a
//! background task that redials, discards the fresh welcome, and replays
//! stored credentials; commands await that task before touching the stream,
//! so a half-open socket is never observable.

mod io;

use crate::commands;
use crate::config::{Credentials, ServerConfig};
use crate::error::{NntpError, Result};
use crate::response::{codes, NntpResponse};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

pub(crate) use io::{ConnIo, RAW_CHUNK_SIZE};

/// TCP receive buffer size for high-bandwidth downloads (4MB)
const RECV_BUFFER_SIZE: usize = 4 * 1024 * 1024;

struct Inner {
    config: ServerConfig,
    welcome: NntpResponse,
    /// The command lock. `None` while no usable socket is installed.
    io: Arc<Mutex<Option<ConnIo>>>,
    /// Pending background reconnect, if any
    reconnect: Mutex<Option<JoinHandle<Result<()>>>>,
    /// Credentials replayed on reconnect; set by a successful AUTHINFO
    /// exchange, cleared only by an explicit close
    credentials: StdMutex<Option<Credentials>>,
}

/// Async NNTP connection with command serialisation and transparent
/// reconnection
///
/// Cloning is cheap and clones share the underlying socket; the connection
/// is safe to share across tasks, but commands are serialised by an
/// internal lock rather than run concurrently.
#[derive(Clone)]
pub struct NntpConnection {
    inner: Arc<Inner>,
}

impl NntpConnection {
    /// Connect to the configured server and read the welcome line
    ///
    /// Accepts welcome codes 200 and 201; anything else closes the socket
    /// and fails with [`NntpError::Protocol`]. Does not authenticate - call
    /// [`authenticate`](Self::authenticate) after connecting.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let (io, welcome) = dial(&config).await?;
        debug!(
            "connected to {}:{} ({} {})",
            config.host, config.port, welcome.code, welcome.message
        );
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                welcome,
                io: Arc::new(Mutex::new(Some(io))),
                reconnect: Mutex::new(None),
                credentials: StdMutex::new(None),
            }),
        })
    }

    /// The welcome line received when this connection was first opened
    pub fn welcome(&self) -> &NntpResponse {
        &self.inner.welcome
    }

    /// Authenticate with AUTHINFO USER/PASS (RFC 4643)
    ///
    /// USER answered with 281 completes immediately; 381 requires a PASS
    /// round. On success the credentials are stored and replayed on every
    /// reconnect until [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::AuthFailed`] when the server rejects either
    /// step with any other code.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        self.ensure_connected().await?;
        let mut guard = self.lock_io().await;
        let result = match guard.as_mut() {
            Some(io) => authinfo_exchange(io, username, password).await,
            None => Err(NntpError::ConnectionClosed),
        };
        if result.is_ok() {
            *self.inner.credentials.lock().unwrap() = Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            });
            debug!("authenticated as {}", username);
        }
        self.finish(guard, result).await
    }

    /// Send a command and read its single-line response
    pub async fn command(&self, cmd: &str) -> Result<NntpResponse> {
        self.ensure_connected().await?;
        let mut guard = self.lock_io().await;
        let result = do_single(guard.as_mut(), cmd).await;
        self.finish(guard, result).await
    }

    /// Send a command and read its response plus, for codes in [100,299],
    /// the dot-terminated multi-line body
    pub async fn command_multi_line(&self, cmd: &str) -> Result<(NntpResponse, Vec<String>)> {
        self.ensure_connected().await?;
        let mut guard = self.lock_io().await;
        let result = do_multi_line(guard.as_mut(), cmd).await;
        self.finish(guard, result).await
    }

    /// Send a command, read its status line, and transfer ownership of the
    /// command lock to the caller
    ///
    /// The returned [`RawLease`] keeps exclusive access to the raw byte
    /// stream; the caller must release it via
    /// [`RawLease::release_clean`] or [`RawLease::fail`]. Dropping the
    /// lease without an explicit release counts as a failure and schedules
    /// a reconnect, which keeps cancellation from leaking a half-read
    /// socket.
    pub(crate) async fn command_raw(&self, cmd: &str) -> Result<(NntpResponse, RawLease)> {
        self.ensure_connected().await?;
        let mut guard = self.lock_io().await;
        match do_single(guard.as_mut(), cmd).await {
            Ok(response) => Ok((
                response,
                RawLease {
                    guard: Some(guard),
                    conn: self.clone(),
                },
            )),
            Err(e) => self.finish(guard, Err(e)).await,
        }
    }

    /// Two-phase POST: send POST, await 340, send the dot-stuffed article,
    /// and return the final status
    pub async fn post(&self, lines: &[String]) -> Result<NntpResponse> {
        self.two_phase(&commands::post(), codes::SEND_ARTICLE, lines)
            .await
    }

    /// Two-phase IHAVE: send IHAVE, await 335, send the dot-stuffed
    /// article, and return the final status
    pub async fn ihave(&self, message_id: &str, lines: &[String]) -> Result<NntpResponse> {
        self.two_phase(
            &commands::ihave(message_id),
            codes::SEND_ARTICLE_TRANSFER,
            lines,
        )
        .await
    }

    async fn two_phase(
        &self,
        cmd: &str,
        continue_code: u16,
        lines: &[String],
    ) -> Result<NntpResponse> {
        self.ensure_connected().await?;
        let mut guard = self.lock_io().await;
        let result = do_two_phase(guard.as_mut(), cmd, continue_code, lines).await;
        self.finish(guard, result).await
    }

    /// Close the connection: abort any pending reconnect, clear stored
    /// credentials, and drop the socket
    pub async fn close(&self) {
        if let Some(handle) = self.inner.reconnect.lock().await.take() {
            handle.abort();
        }
        self.inner.credentials.lock().unwrap().take();
        self.inner.io.lock().await.take();
        debug!(
            "connection to {}:{} closed",
            self.inner.config.host, self.inner.config.port
        );
    }

    /// Best-effort synchronous close for drop paths
    pub(crate) fn shutdown(&self) {
        if let Ok(mut pending) = self.inner.reconnect.try_lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
        self.inner.credentials.lock().unwrap().take();
        if let Ok(mut io) = self.inner.io.try_lock() {
            io.take();
        }
    }

    /// Await a pending reconnect, surfacing its failure
    ///
    /// Must be called before any command touches the stream.
    pub(crate) async fn ensure_connected(&self) -> Result<()> {
        let mut pending = self.inner.reconnect.lock().await;
        if let Some(handle) = pending.take() {
            match handle.await {
                Ok(result) => result,
                Err(_) => Err(NntpError::ConnectionClosed),
            }
        } else {
            Ok(())
        }
    }

    /// Launch a background rebuild of the socket, unless one is already
    /// pending
    ///
    /// Must not be called while holding the command lock.
    pub(crate) async fn schedule_reconnect(&self) {
        let mut pending = self.inner.reconnect.lock().await;
        if pending.is_some() {
            return;
        }
        debug!(
            "scheduling reconnect to {}:{}",
            self.inner.config.host, self.inner.config.port
        );
        let inner = Arc::clone(&self.inner);
        *pending = Some(tokio::spawn(async move { rebuild(inner).await }));
    }

    async fn lock_io(&self) -> OwnedMutexGuard<Option<ConnIo>> {
        Arc::clone(&self.inner.io).lock_owned().await
    }

    /// Release the command lock; on a connection-level failure the socket
    /// is dropped first and a reconnect scheduled
    async fn finish<T>(
        &self,
        mut guard: OwnedMutexGuard<Option<ConnIo>>,
        result: Result<T>,
    ) -> Result<T> {
        if matches!(&result, Err(e) if e.is_connection_error()) {
            guard.take();
            drop(guard);
            self.schedule_reconnect().await;
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn from_io(io: ConnIo, config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                welcome: NntpResponse {
                    code: 200,
                    message: "test".to_string(),
                },
                io: Arc::new(Mutex::new(Some(io))),
                reconnect: Mutex::new(None),
                credentials: StdMutex::new(None),
            }),
        }
    }
}

/// Exclusive ownership of the connection's raw byte stream, transferred
/// out of [`NntpConnection::command_raw`]
///
/// Exactly one release path runs per lease: a clean release keeps the
/// socket, every other exit (explicit failure or drop) discards it and
/// schedules a reconnect.
pub(crate) struct RawLease {
    guard: Option<OwnedMutexGuard<Option<ConnIo>>>,
    conn: NntpConnection,
}

impl RawLease {
    pub(crate) fn io(&mut self) -> Result<&mut ConnIo> {
        self.guard
            .as_mut()
            .and_then(|guard| guard.as_mut())
            .ok_or(NntpError::ConnectionClosed)
    }

    /// Release with the socket positioned after a complete response; no
    /// reconnect is scheduled
    pub(crate) fn release_clean(mut self) {
        self.guard.take();
    }

    /// Drop the socket, release the lock, and rebuild in the background
    pub(crate) async fn fail(mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.take();
            drop(guard);
        }
        self.conn.schedule_reconnect().await;
    }
}

impl Drop for RawLease {
    fn drop(&mut self) {
        let Some(mut guard) = self.guard.take() else {
            return;
        };
        guard.take();
        drop(guard);
        let conn = self.conn.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { conn.schedule_reconnect().await });
        }
    }
}

async fn do_single(io: Option<&mut ConnIo>, cmd: &str) -> Result<NntpResponse> {
    let io = io.ok_or(NntpError::ConnectionClosed)?;
    io.write_line(cmd).await?;
    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    Ok(NntpResponse { code, message })
}

async fn do_multi_line(io: Option<&mut ConnIo>, cmd: &str) -> Result<(NntpResponse, Vec<String>)> {
    let io = io.ok_or(NntpError::ConnectionClosed)?;
    io.write_line(cmd).await?;
    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    let lines = if (100..300).contains(&code) {
        io.read_multi_line_body().await?
    } else {
        Vec::new()
    };
    Ok((NntpResponse { code, message }, lines))
}

async fn do_two_phase(
    io: Option<&mut ConnIo>,
    cmd: &str,
    continue_code: u16,
    lines: &[String],
) -> Result<NntpResponse> {
    let io = io.ok_or(NntpError::ConnectionClosed)?;
    io.write_line(cmd).await?;
    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    if code != continue_code {
        return Err(NntpError::Protocol { code, message });
    }

    for line in lines {
        if line.starts_with('.') {
            io.write_line(&format!(".{line}")).await?;
        } else {
            io.write_line(line).await?;
        }
    }
    io.write_line(".").await?;

    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    Ok(NntpResponse { code, message })
}

async fn authinfo_exchange(io: &mut ConnIo, username: &str, password: &str) -> Result<()> {
    io.write_line(&commands::authinfo_user(username)).await?;
    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    match code {
        codes::AUTH_ACCEPTED => return Ok(()),
        codes::AUTH_CONTINUE => {}
        _ => return Err(NntpError::AuthFailed(message)),
    }

    io.write_line(&commands::authinfo_pass(password)).await?;
    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    if code != codes::AUTH_ACCEPTED {
        return Err(NntpError::AuthFailed(message));
    }
    Ok(())
}

async fn dial(config: &ServerConfig) -> Result<(ConnIo, NntpResponse)> {
    debug!("connecting to {}:{}", config.host, config.port);
    let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;

    // Low latency for the request/response pattern, large receive buffer
    // for high-bandwidth article downloads.
    tcp.set_nodelay(true)?;
    let socket = socket2::SockRef::from(&tcp);
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        warn!(
            "failed to set receive buffer to {} bytes: {}",
            RECV_BUFFER_SIZE, e
        );
    }

    let stream: Box<dyn io::NntpIo> = if config.use_tls {
        Box::new(tls_connect(tcp, &config.host).await?)
    } else {
        Box::new(tcp)
    };

    let mut io = ConnIo::new(stream);
    let line = io.read_line().await?;
    let (code, message) = commands::parse_response_line(&line)?;
    if code != codes::READY_POSTING_ALLOWED && code != codes::READY_NO_POSTING {
        return Err(NntpError::Protocol { code, message });
    }
    Ok((io, NntpResponse { code, message }))
}

async fn tls_connect(
    tcp: TcpStream,
    host: &str,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
    let _ = CryptoProvider::install_default(ring::default_provider());

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| NntpError::Tls(format!("invalid server name: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| NntpError::Tls(format!("TLS handshake failed: {e}")))
}

async fn rebuild(inner: Arc<Inner>) -> Result<()> {
    // Drop whatever is left of the old socket before dialing.
    inner.io.lock().await.take();

    let (mut io, _welcome) = dial(&inner.config).await?;
    let credentials = inner.credentials.lock().unwrap().clone();
    if let Some(creds) = credentials {
        authinfo_exchange(&mut io, &creds.username, &creds.password).await?;
    }

    *inner.io.lock().await = Some(io);
    debug!(
        "reconnect to {}:{} complete",
        inner.config.host, inner.config.port
    );
    Ok(())
}
