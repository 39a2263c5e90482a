//! Streaming yEnc body pipeline
//!
//! Runs after `BODY` answered 222 with the command lock transferred in. A
//! worker task drives the incremental decoder against the raw byte channel
//! and hands decoded chunks to the consumer through a bounded channel, so
//! the consumer's pace is the pipeline's pace.
//!
//! The socket hand-off is all-or-nothing: when the decode runs to the
//! article terminator the lock is released with the socket clean; on any
//! error, cancellation, or consumer abandonment the socket is dropped and
//! rebuilt in the background before the lock is released.

use crate::connection::{RawLease, RAW_CHUNK_SIZE};
use crate::error::{NntpError, Result};
use crate::pool::PooledClient;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::codec::{self, DecoderState, EndMarker};
use super::params;
use super::YencHeaders;

/// Decoded chunks buffered ahead of the consumer
const BODY_CHANNEL_CAPACITY: usize = 8;

/// NNTP article terminator as it appears after a complete line
const TERMINATOR: &[u8; 5] = b"\r\n.\r\n";

/// Stream of decoded body bytes, produced while the article downloads
#[derive(Debug)]
pub struct YencBodyStream {
    rx: mpsc::Receiver<Result<Vec<u8>>>,
}

impl YencBodyStream {
    /// Receive the next decoded chunk
    ///
    /// Returns `None` once the body is complete. A terminal error (CRC
    /// mismatch, connection loss) is yielded as the last item; chunks
    /// already received stay valid.
    pub async fn recv(&mut self) -> Option<Result<Vec<u8>>> {
        self.rx.recv().await
    }

    /// Collect all remaining chunks into one buffer
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

/// A yEnc body fetch: parsed headers plus the byte stream
///
/// Dropping the fetch before the stream completes abandons the decode; the
/// underlying connection rebuilds its socket in the background.
#[derive(Debug)]
pub struct YencFetch {
    /// Parsed `=ybegin`/`=ypart` declaration
    pub headers: YencHeaders,
    /// Decoded body bytes
    pub body: YencBodyStream,
    /// Pool lease held until the fetch is dropped
    pub(crate) _lease: Option<PooledClient>,
}

impl YencFetch {
    pub(crate) fn attach_lease(&mut self, lease: PooledClient) {
        self._lease = Some(lease);
    }
}

/// Parse the preamble and spawn the decode worker
pub(crate) async fn start(mut lease: RawLease) -> Result<YencFetch> {
    let (headers, pending) = match read_preamble(&mut lease).await {
        Ok(preamble) => preamble,
        Err(e) => {
            lease.fail().await;
            return Err(e);
        }
    };
    trace!(
        "yEnc body: name={} size={} part={:?}",
        headers.name,
        headers.size,
        headers.part
    );

    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    tokio::spawn(drive(lease, pending, tx));

    Ok(YencFetch {
        headers,
        body: YencBodyStream { rx },
        _lease: None,
    })
}

/// Parse the preamble only, leaving the body unread
///
/// The socket always rebuilds afterwards because the encoded body bytes
/// were left in flight.
pub(crate) async fn headers_only(mut lease: RawLease) -> Result<YencHeaders> {
    let result = read_preamble(&mut lease).await;
    lease.fail().await;
    result.map(|(headers, _)| headers)
}

/// Read up to the first data line: blank lines, `=ybegin`, optional
/// `=ypart`
///
/// Returns the parsed headers and, when the second line was already data,
/// that line with its CRLF restored as the first chunk for the decoder.
async fn read_preamble(lease: &mut RawLease) -> Result<(YencHeaders, Vec<u8>)> {
    let begin_line = loop {
        let line = lease.io()?.read_line().await?;
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("=ybegin ") {
            break line;
        }
        return Err(NntpError::YencMalformed(format!(
            "expected =ybegin, got: {}",
            line.chars().take(60).collect::<String>()
        )));
    };
    let mut headers = params::parse_ybegin(begin_line.trim_end())?;

    // The next line is read raw: unless it is =ypart it is the first
    // encoded data line, whose bytes may be invalid UTF-8.
    let raw = lease.io()?.read_raw_line().await?;
    let pending = if raw.starts_with(b"=ypart ") {
        let text = String::from_utf8_lossy(&raw);
        let (begin, end) = params::parse_ypart(text.trim_end())?;
        headers.part_begin = Some(begin);
        headers.part_end = Some(end);
        Vec::new()
    } else {
        let mut first = raw;
        first.extend_from_slice(b"\r\n");
        first
    };

    Ok((headers, pending))
}

enum Outcome {
    /// Decode ran to the article terminator; the socket is clean
    Complete,
    /// The consumer dropped the stream before the body finished
    Abandoned,
}

async fn drive(mut lease: RawLease, pending: Vec<u8>, tx: mpsc::Sender<Result<Vec<u8>>>) {
    match decode_body(&mut lease, pending, &tx).await {
        Ok(Outcome::Complete) => {
            trace!("yEnc body complete");
            lease.release_clean();
        }
        Ok(Outcome::Abandoned) => {
            debug!("yEnc body stream abandoned mid-decode");
            lease.fail().await;
        }
        Err(e) => {
            // Schedule the rebuild before surfacing the error, so a caller
            // reacting to it finds the reconnect already pending.
            lease.fail().await;
            let _ = tx.send(Err(e)).await;
        }
    }
}

async fn decode_body(
    lease: &mut RawLease,
    pending: Vec<u8>,
    tx: &mpsc::Sender<Result<Vec<u8>>>,
) -> Result<Outcome> {
    let mut state = DecoderState::default();
    let mut crc: u32 = 0;
    let mut buf = pending;
    if buf.is_empty() {
        buf = read_more(lease, buf).await?;
    }

    loop {
        let step = codec::decode_step(&buf, state);
        state = step.state;

        if !step.data.is_empty() {
            crc = codec::crc32(&step.data, crc);
            if tx.send(Ok(step.data)).await.is_err() {
                return Ok(Outcome::Abandoned);
            }
        }

        match step.end {
            EndMarker::Article => {
                // Terminator arrived without a =yend line; accepted, there
                // is no trailer CRC to check.
                return Ok(Outcome::Complete);
            }
            EndMarker::Control => {
                let remainder = buf.split_off(step.consumed);
                finish_trailer(lease, remainder, crc).await?;
                return Ok(Outcome::Complete);
            }
            EndMarker::None => {
                buf.drain(..step.consumed);
                buf = read_more(lease, buf).await?;
            }
        }
    }
}

async fn read_more(lease: &mut RawLease, mut carry: Vec<u8>) -> Result<Vec<u8>> {
    let mut chunk = vec![0u8; RAW_CHUNK_SIZE];
    let n = lease.io()?.read_chunk(&mut chunk).await?;
    chunk.truncate(n);
    if carry.is_empty() {
        Ok(chunk)
    } else {
        carry.extend_from_slice(&chunk);
        Ok(carry)
    }
}

/// Parse the `=yend` line starting at `remainder`, check the CRC, and
/// drain the socket through the article terminator
async fn finish_trailer(lease: &mut RawLease, remainder: Vec<u8>, crc: u32) -> Result<()> {
    // The chunk boundary may have split the control line.
    let (line, after) = match find_crlf(&remainder) {
        Some(pos) => (remainder[..pos].to_vec(), remainder[pos + 2..].to_vec()),
        None => {
            let mut line = remainder;
            line.extend_from_slice(&lease.io()?.read_raw_line().await?);
            (line, Vec::new())
        }
    };

    let text = String::from_utf8_lossy(&line);
    let text = text.trim_end();
    if !text.starts_with("=yend") {
        return Err(NntpError::YencMalformed(format!(
            "expected =yend, got: {}",
            text.chars().take(60).collect::<String>()
        )));
    }
    let trailer = params::parse_yend(text)?;
    trace!(
        "yEnc trailer: size={} crc32={:?} pcrc32={:?}",
        trailer.size,
        trailer.crc32,
        trailer.pcrc32
    );

    if let Some(expected) = trailer.pcrc32.or(trailer.crc32) {
        if expected != crc {
            return Err(NntpError::CrcMismatch {
                expected,
                actual: crc,
            });
        }
    }

    // The NNTP terminator may lag the trailer. Scan for CRLF '.' CRLF,
    // counting the trailer's own line ending as the leading CRLF.
    let mut matched = 2usize;
    for &byte in &after {
        matched = advance(matched, byte);
        if matched == TERMINATOR.len() {
            return Ok(());
        }
    }
    let mut chunk = vec![0u8; RAW_CHUNK_SIZE];
    loop {
        let n = lease.io()?.read_chunk(&mut chunk).await?;
        for &byte in &chunk[..n] {
            matched = advance(matched, byte);
            if matched == TERMINATOR.len() {
                return Ok(());
            }
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"\r\n")
}

/// KMP step over the article terminator
fn advance(state: usize, byte: u8) -> usize {
    // Border lengths of each matched prefix of "\r\n.\r\n"
    const FALLBACK: [usize; 5] = [0, 0, 0, 0, 1];
    let mut state = state;
    loop {
        if byte == TERMINATOR[state] {
            return state + 1;
        }
        if state == 0 {
            return 0;
        }
        state = FALLBACK[state];
    }
}
