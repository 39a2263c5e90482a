//! In-process NNTP stub server for black-box tests
//!
//! Serves fixture groups and articles over a real TCP socket, optionally
//! gated behind AUTHINFO, with scripted fault injection for reconnect
//! tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Default)]
pub struct StubBuilder {
    greeting: Option<String>,
    credentials: Option<(String, String)>,
    groups: HashMap<String, (i64, i64, i64)>,
    articles: HashMap<String, Vec<String>>,
    raw_bodies: HashMap<String, Vec<u8>>,
    fail_stats: usize,
}

impl StubBuilder {
    /// Override the default "200 stub server ready" greeting
    pub fn greeting(mut self, greeting: &str) -> Self {
        self.greeting = Some(greeting.to_string());
        self
    }

    /// Require AUTHINFO USER/PASS before any other command
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Register a group as "name -> (count, low, high)"
    pub fn group(mut self, name: &str, count: i64, low: i64, high: i64) -> Self {
        self.groups.insert(name.to_string(), (count, low, high));
        self
    }

    /// Register an article; lines are dot-stuffed on the wire
    pub fn article(mut self, id: &str, lines: &[&str]) -> Self {
        self.articles
            .insert(id.to_string(), lines.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Register a BODY response as raw bytes written verbatim after the
    /// 222 status line (must include the terminating ".\r\n")
    pub fn raw_body(mut self, id: &str, wire: Vec<u8>) -> Self {
        self.raw_bodies.insert(id.to_string(), wire);
        self
    }

    /// Drop the connection (no response) on the first `n` STAT commands
    pub fn fail_first_stats(mut self, n: usize) -> Self {
        self.fail_stats = n;
        self
    }

    pub async fn spawn(self) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(StubState {
            greeting: self
                .greeting
                .unwrap_or_else(|| "200 stub server ready".to_string()),
            credentials: self.credentials,
            groups: self.groups,
            articles: self.articles,
            raw_bodies: self.raw_bodies,
            connections: AtomicUsize::new(0),
            date_probes: AtomicUsize::new(0),
            fail_stats: AtomicUsize::new(self.fail_stats),
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = handle_client(stream, state).await;
                });
            }
        });

        StubServer { addr, state }
    }
}

pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
}

impl StubServer {
    pub fn builder() -> StubBuilder {
        StubBuilder::default()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections (welcome handshakes) served so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Number of DATE commands answered so far
    pub fn date_probe_count(&self) -> usize {
        self.state.date_probes.load(Ordering::SeqCst)
    }
}

struct StubState {
    greeting: String,
    credentials: Option<(String, String)>,
    groups: HashMap<String, (i64, i64, i64)>,
    articles: HashMap<String, Vec<String>>,
    raw_bodies: HashMap<String, Vec<u8>>,
    connections: AtomicUsize,
    date_probes: AtomicUsize,
    fail_stats: AtomicUsize,
}

async fn handle_client(stream: TcpStream, state: Arc<StubState>) -> std::io::Result<()> {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer
        .write_all(format!("{}\r\n", state.greeting).as_bytes())
        .await?;
    if !state.greeting.starts_with('2') {
        return Ok(());
    }

    let mut authenticated = state.credentials.is_none();
    let mut pending_user: Option<String> = None;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command_line = line.trim_end();
        if command_line.is_empty() {
            continue;
        }

        let mut parts = command_line.split_whitespace();
        let command = parts.next().unwrap_or("").to_uppercase();

        if !authenticated && command != "AUTHINFO" && command != "QUIT" {
            writer.write_all(b"480 authentication required\r\n").await?;
            continue;
        }

        match command.as_str() {
            "QUIT" => {
                writer.write_all(b"205 closing connection\r\n").await?;
                return Ok(());
            }
            "AUTHINFO" => {
                let verb = parts.next().unwrap_or("").to_uppercase();
                let value = parts.next().unwrap_or("");
                let Some((user, pass)) = &state.credentials else {
                    writer.write_all(b"281 no authentication needed\r\n").await?;
                    continue;
                };
                match verb.as_str() {
                    "USER" => {
                        pending_user = Some(value.to_string());
                        writer.write_all(b"381 password required\r\n").await?;
                    }
                    "PASS" => {
                        if pending_user.as_deref() == Some(user.as_str()) && value == pass {
                            authenticated = true;
                            writer.write_all(b"281 authentication accepted\r\n").await?;
                        } else {
                            writer.write_all(b"481 authentication rejected\r\n").await?;
                        }
                    }
                    _ => writer.write_all(b"501 syntax error\r\n").await?,
                }
            }
            "DATE" => {
                state.date_probes.fetch_add(1, Ordering::SeqCst);
                writer.write_all(b"111 20260802120000\r\n").await?;
            }
            "GROUP" => {
                let name = parts.next().unwrap_or("");
                match state.groups.get(name) {
                    Some((count, low, high)) => {
                        writer
                            .write_all(
                                format!("211 {count} {low} {high} {name}\r\n").as_bytes(),
                            )
                            .await?;
                    }
                    None => writer.write_all(b"411 no such newsgroup\r\n").await?,
                }
            }
            "LISTGROUP" => {
                let name = parts.next().unwrap_or("");
                match state.groups.get(name) {
                    Some((count, low, high)) => {
                        writer
                            .write_all(
                                format!("211 {count} {low} {high} {name} list follows\r\n")
                                    .as_bytes(),
                            )
                            .await?;
                        for number in *low..=*high {
                            writer.write_all(format!("{number}\r\n").as_bytes()).await?;
                        }
                        writer.write_all(b".\r\n").await?;
                    }
                    None => writer.write_all(b"411 no such newsgroup\r\n").await?,
                }
            }
            "STAT" => {
                if state
                    .fail_stats
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    // Scripted fault: drop the connection without replying.
                    return Ok(());
                }
                let id = parts.next().unwrap_or("");
                if state.articles.contains_key(id) || state.raw_bodies.contains_key(id) {
                    writer.write_all(format!("223 1 {id}\r\n").as_bytes()).await?;
                } else {
                    writer.write_all(b"430 no such article\r\n").await?;
                }
            }
            "ARTICLE" => {
                let id = parts.next().unwrap_or("");
                match state.articles.get(id) {
                    Some(lines) => {
                        writer
                            .write_all(format!("220 1 {id} article follows\r\n").as_bytes())
                            .await?;
                        write_stuffed(&mut writer, lines).await?;
                    }
                    None => writer.write_all(b"430 no such article\r\n").await?,
                }
            }
            "BODY" => {
                let id = parts.next().unwrap_or("");
                if let Some(wire) = state.raw_bodies.get(id) {
                    writer
                        .write_all(format!("222 1 {id} body follows\r\n").as_bytes())
                        .await?;
                    writer.write_all(wire).await?;
                } else if let Some(lines) = state.articles.get(id) {
                    writer
                        .write_all(format!("222 1 {id} body follows\r\n").as_bytes())
                        .await?;
                    write_stuffed(&mut writer, lines).await?;
                } else {
                    writer.write_all(b"430 no such article\r\n").await?;
                }
            }
            "POST" => {
                writer.write_all(b"340 send article\r\n").await?;
                loop {
                    let mut body_line = String::new();
                    if reader.read_line(&mut body_line).await? == 0 {
                        return Ok(());
                    }
                    if body_line.trim_end() == "." {
                        break;
                    }
                }
                writer.write_all(b"240 article posted\r\n").await?;
            }
            _ => {
                writer.write_all(b"500 command not recognized\r\n").await?;
            }
        }
    }
}

async fn write_stuffed(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    lines: &[String],
) -> std::io::Result<()> {
    for line in lines {
        if line.starts_with('.') {
            writer.write_all(b".").await?;
        }
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
    }
    writer.write_all(b".\r\n").await
}

/// Encode bytes as yEnc data lines (42-offset, critical bytes escaped)
pub fn yenc_encode(data: &[u8], line_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for block in data.chunks(line_len) {
        for (i, &b) in block.iter().enumerate() {
            let enc = b.wrapping_add(42);
            let critical = matches!(enc, 0 | b'\t' | b'\n' | b'\r' | b'=')
                || (i == 0 && matches!(enc, b'.' | b' '));
            if critical {
                out.push(b'=');
                out.push(enc.wrapping_add(64));
            } else {
                out.push(enc);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Build a complete single-part yEnc wire body (without the 222 line,
/// with the article terminator)
pub fn yenc_wire(name: &str, payload: &[u8], crc_override: Option<u32>) -> Vec<u8> {
    let crc = crc_override.unwrap_or_else(|| nntp_stream::yenc::crc32(payload, 0));
    let mut wire = Vec::new();
    wire.extend_from_slice(
        format!("=ybegin line=128 size={} name={}\r\n", payload.len(), name).as_bytes(),
    );
    wire.extend_from_slice(&yenc_encode(payload, 128));
    wire.extend_from_slice(format!("=yend size={} crc32={:08x}\r\n", payload.len(), crc).as_bytes());
    wire.extend_from_slice(b".\r\n");
    wire
}
