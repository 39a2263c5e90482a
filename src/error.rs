//! NNTP error types

use thiserror::Error;

/// NNTP protocol, connection, and decoding errors
#[derive(Error, Debug)]
pub enum NntpError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during secure connection
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Malformed response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// NNTP protocol error with response code
    #[error("NNTP error {code}: {message}")]
    Protocol {
        /// NNTP response code (e.g., 411, 412, 502)
        code: u16,
        /// Error message from server
        message: String,
    },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// No article with that number or message-id (430/423)
    #[error("No such article: {0}")]
    ArticleNotFound(String),

    /// Malformed yEnc framing (missing =ybegin, missing mandatory fields)
    #[error("Malformed yEnc data: {0}")]
    YencMalformed(String),

    /// Decoded bytes do not hash to the CRC32 declared in the yEnc trailer
    #[error("CRC32 mismatch: expected {expected:08x}, actual {actual:08x}")]
    CrcMismatch {
        /// CRC32 declared in the trailer
        expected: u32,
        /// CRC32 of the bytes actually decoded
        actual: u32,
    },

    /// The connection pool has been closed
    #[error("Connection pool closed")]
    PoolClosed,
}

impl NntpError {
    /// Whether this error is a connection-level failure.
    ///
    /// Connection-level failures are retriable by the pool on a different
    /// connection; protocol, authentication, and decoding errors are not.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            NntpError::Io(_) | NntpError::Tls(_) | NntpError::ConnectionClosed
        )
    }
}

/// Result type alias using NntpError
pub type Result<T> = std::result::Result<T, NntpError>;
