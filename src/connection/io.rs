//! Low-level I/O primitives for the NNTP wire protocol
//!
//! Lines are CRLF-framed on the wire. Status lines and text bodies are read
//! as (lossy) UTF-8; yEnc bodies must be read raw because encoded bytes
//! overlap with invalid UTF-8 sequences. Framing is identical either way.

use crate::error::{NntpError, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

/// BufReader capacity for high-throughput article downloads (256KB)
const BUFREADER_CAPACITY: usize = 256 * 1024;

/// Raw read size feeding the yEnc decoder (128KB)
pub(crate) const RAW_CHUNK_SIZE: usize = 128 * 1024;

/// Marker trait so plain TCP and TLS streams share one construction site
pub(crate) trait NntpIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> NntpIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Buffered stream plus the read primitives of the wire protocol
pub(crate) struct ConnIo {
    stream: BufReader<Box<dyn NntpIo>>,
}

impl ConnIo {
    pub(crate) fn new(stream: Box<dyn NntpIo>) -> Self {
        Self {
            stream: BufReader::with_capacity(BUFREADER_CAPACITY, stream),
        }
    }

    /// Write a command line, appending CRLF, and flush
    pub(crate) async fn write_line(&mut self, line: &str) -> Result<()> {
        trace!("-> {}", line);
        let writer = self.stream.get_mut();
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one CRLF-terminated line as raw bytes, without the terminator
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::ConnectionClosed`] on EOF, including EOF in the
    /// middle of a line.
    pub(crate) async fn read_raw_line(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(512);
        self.stream.read_until(b'\n', &mut buf).await?;

        if !buf.ends_with(b"\n") {
            return Err(NntpError::ConnectionClosed);
        }
        if buf.ends_with(b"\r\n") {
            buf.truncate(buf.len() - 2);
        } else {
            buf.truncate(buf.len() - 1);
        }
        Ok(buf)
    }

    /// Read one CRLF-terminated line as text, without the terminator
    pub(crate) async fn read_line(&mut self) -> Result<String> {
        let buf = self.read_raw_line().await?;
        let line = String::from_utf8_lossy(&buf).into_owned();
        trace!("<- {}", line);
        Ok(line)
    }

    /// Read a multi-line body: lines until one containing only ".", with
    /// dot-unstuffing applied (a leading ".." becomes ".")
    pub(crate) async fn read_multi_line_body(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(64);
        loop {
            let line = self.read_line().await?;
            if line == "." {
                break;
            }
            if line.starts_with("..") {
                lines.push(line[1..].to_string());
            } else {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Read up to `buf.len()` raw bytes
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::ConnectionClosed`] on EOF; the yEnc pipeline must
    /// always observe a terminator before the peer closes.
    pub(crate) async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.stream.read(buf).await?;
        if n == 0 {
            return Err(NntpError::ConnectionClosed);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_from(data: &[u8]) -> ConnIo {
        let cursor = std::io::Cursor::new(data.to_vec());
        ConnIo::new(Box::new(cursor))
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mut io = io_from(b"200 ready\r\nnext\r\n");
        assert_eq!(io.read_line().await.unwrap(), "200 ready");
        assert_eq!(io.read_line().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn read_line_eof_is_connection_closed() {
        let mut io = io_from(b"");
        assert!(matches!(
            io.read_line().await,
            Err(NntpError::ConnectionClosed)
        ));

        // EOF in the middle of a line counts too
        let mut io = io_from(b"200 read");
        assert!(matches!(
            io.read_line().await,
            Err(NntpError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn read_raw_line_preserves_high_bytes() {
        let mut io = io_from(b"\xff\xfe\x80data\r\n");
        assert_eq!(io.read_raw_line().await.unwrap(), b"\xff\xfe\x80data");
    }

    #[tokio::test]
    async fn multi_line_body_unstuffs_and_terminates() {
        let mut io = io_from(b"Subject: T\r\n\r\nLine one\r\n..dot\r\n.\r\n");
        let lines = io.read_multi_line_body().await.unwrap();
        assert_eq!(lines, vec!["Subject: T", "", "Line one", ".dot"]);
    }

    #[tokio::test]
    async fn multi_line_body_eof_before_terminator() {
        let mut io = io_from(b"line\r\n");
        assert!(matches!(
            io.read_multi_line_body().await,
            Err(NntpError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn dot_unstuffing_round_trip() {
        // Any body where lines starting with "." were stuffed on the wire
        // comes back as the original sequence.
        let original = vec![".dot", "..two", "plain", "."];
        let mut wire = Vec::new();
        for line in &original {
            if line.starts_with('.') {
                wire.push(b'.');
            }
            wire.extend_from_slice(line.as_bytes());
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b".\r\n");

        let mut io = io_from(&wire);
        let lines = io.read_multi_line_body().await.unwrap();
        assert_eq!(lines, original);
    }
}
