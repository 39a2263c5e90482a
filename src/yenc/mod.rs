//! Streaming yEnc decoding for Usenet binary bodies
//!
//! yEnc is a binary-to-text encoding scheme designed specifically for
//! Usenet, with only 1-2% overhead compared to 33-40% for Base64. Its
//! control lines (`=ybegin`, `=ypart`, `=yend`) frame the encoded bytes and
//! declare size, name, part range, and CRC.
//!
//! This module decodes incrementally: headers are parsed as soon as the
//! preamble arrives and decoded bytes are handed to the consumer chunk by
//! chunk, so a multi-hundred-megabyte part never has to be buffered whole.
//!
//! Reference: <http://www.yenc.org/yenc-draft.1.3.txt>

pub(crate) mod codec;
pub(crate) mod params;
pub(crate) mod stream;

pub use codec::{crc32, DecodeStep, DecoderState, EndMarker};
pub use stream::{YencBodyStream, YencFetch};

/// yEnc declaration from the `=ybegin` (and optional `=ypart`) lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YencHeaders {
    /// Encoded line length (typically 128, max 997)
    pub line: u16,
    /// Total file size in bytes
    pub size: i64,
    /// Original filename; may contain spaces
    pub name: String,
    /// Part number (multi-part files)
    pub part: Option<u16>,
    /// Total number of parts (multi-part files)
    pub total: Option<u16>,
    /// Byte offset where this part begins, from `=ypart`
    pub part_begin: Option<i64>,
    /// Byte offset where this part ends, from `=ypart`
    pub part_end: Option<i64>,
}

/// yEnc trailer from the `=yend` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YencTrailer {
    /// Size of the decoded data in bytes
    pub size: i64,
    /// CRC32 of the entire decoded file
    pub crc32: Option<u32>,
    /// CRC32 of this part only (multi-part files)
    pub pcrc32: Option<u32>,
    /// Part number (multi-part files)
    pub part: Option<u16>,
}
