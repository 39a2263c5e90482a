//! Incremental yEnc byte decoder
//!
//! yEnc encoding: `encoded = (original + 42) % 256`, with `=` as an escape
//! prefix for critical bytes (`encoded = original + 42 + 64`). CR and LF
//! are framing, not data, and a leading `..` on a line is NNTP
//! dot-stuffing.
//!
//! The decoder is a resumable state machine over arbitrary byte chunks. A
//! call consumes as much of the chunk as can be classified unambiguously
//! and reports why it stopped:
//!
//! - [`EndMarker::Control`] - a `=y` control line starts at
//!   `consumed`; the caller parses it as text.
//! - [`EndMarker::Article`] - the NNTP `.\r\n` terminator was consumed
//!   in-band.
//! - [`EndMarker::None`] - the chunk is exhausted, except possibly for a
//!   trailing prefix that could still become a control line or terminator
//!   (for example a chunk ending right at `\r\n=`). Those bytes are left
//!   unconsumed and must be re-presented together with more data.

use crc32fast::Hasher;

/// Decoder position between chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// At the start of a line; the last byte seen was a LF. Initial state.
    #[default]
    Crlf,
    /// Mid-line, decoding data bytes
    Data,
    /// An escape `=` was consumed; the next byte decodes with the shifted
    /// offset
    Escape,
}

/// Why [`decode_step`] stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMarker {
    /// Chunk exhausted; feed more data
    None,
    /// Stopped at the start of a `=y` control line (left unconsumed)
    Control,
    /// Consumed the NNTP article terminator
    Article,
}

/// Result of one decoding step
#[derive(Debug)]
pub struct DecodeStep {
    /// Decoded bytes
    pub data: Vec<u8>,
    /// How many input bytes were consumed
    pub consumed: usize,
    /// State to resume from
    pub state: DecoderState,
    /// Why decoding stopped
    pub end: EndMarker,
}

/// Decode one chunk of yEnc data, resuming from `state`
pub fn decode_step(chunk: &[u8], state: DecoderState) -> DecodeStep {
    let mut out = Vec::with_capacity(chunk.len());
    let mut state = state;
    let mut i = 0;

    while i < chunk.len() {
        let byte = chunk[i];
        match state {
            DecoderState::Escape => {
                out.push(byte.wrapping_sub(64).wrapping_sub(42));
                state = DecoderState::Data;
                i += 1;
            }
            DecoderState::Data => match byte {
                b'\r' => i += 1,
                b'\n' => {
                    state = DecoderState::Crlf;
                    i += 1;
                }
                b'=' => {
                    state = DecoderState::Escape;
                    i += 1;
                }
                _ => {
                    out.push(byte.wrapping_sub(42));
                    i += 1;
                }
            },
            DecoderState::Crlf => match byte {
                b'\r' | b'\n' => i += 1,
                b'=' => match chunk.get(i + 1) {
                    None => return step(out, i, state, EndMarker::None),
                    Some(b'y') => return step(out, i, state, EndMarker::Control),
                    Some(_) => {
                        state = DecoderState::Escape;
                        i += 1;
                    }
                },
                b'.' => match chunk.get(i + 1) {
                    None => return step(out, i, state, EndMarker::None),
                    Some(b'.') => {
                        // Dot-stuffed line: drop the first dot, the rest is
                        // ordinary data.
                        state = DecoderState::Data;
                        i += 1;
                    }
                    Some(b'\n') => {
                        return step(out, i + 2, DecoderState::Crlf, EndMarker::Article)
                    }
                    Some(b'\r') => match chunk.get(i + 2) {
                        None => return step(out, i, state, EndMarker::None),
                        Some(b'\n') => {
                            return step(out, i + 3, DecoderState::Crlf, EndMarker::Article)
                        }
                        Some(_) => {
                            out.push(byte.wrapping_sub(42));
                            state = DecoderState::Data;
                            i += 1;
                        }
                    },
                    Some(_) => {
                        out.push(byte.wrapping_sub(42));
                        state = DecoderState::Data;
                        i += 1;
                    }
                },
                _ => {
                    out.push(byte.wrapping_sub(42));
                    state = DecoderState::Data;
                    i += 1;
                }
            },
        }
    }

    step(out, chunk.len(), state, EndMarker::None)
}

fn step(data: Vec<u8>, consumed: usize, state: DecoderState, end: EndMarker) -> DecodeStep {
    DecodeStep {
        data,
        consumed,
        state,
        end,
    }
}

/// CRC32 of `data`, resuming from a previous CRC value
///
/// `crc32(b, crc32(a, 0))` equals `crc32(a ++ b, 0)`.
pub fn crc32(data: &[u8], init: u32) -> u32 {
    let mut hasher = Hasher::new_with_initial(init);
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode bytes the way a conforming yEnc encoder would, escaping the
    /// critical set and anything that could collide with framing.
    fn encode(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, &b) in data.iter().enumerate() {
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
        out
    }

    /// Drive decode_step over a chunk sequence the way the pipeline does:
    /// unconsumed tails are prepended to the next chunk.
    fn drive(chunks: &[&[u8]]) -> (Vec<u8>, EndMarker) {
        let mut out = Vec::new();
        let mut state = DecoderState::default();
        let mut carry: Vec<u8> = Vec::new();

        for chunk in chunks {
            carry.extend_from_slice(chunk);
            let step = decode_step(&carry, state);
            out.extend_from_slice(&step.data);
            state = step.state;
            match step.end {
                EndMarker::None => {
                    carry.drain(..step.consumed);
                }
                end => return (out, end),
            }
        }
        (out, EndMarker::None)
    }

    #[test]
    fn test_plain_bytes_decode() {
        let step = decode_step(&encode(b"Hello"), DecoderState::default());
        assert_eq!(step.data, b"Hello");
        assert_eq!(step.end, EndMarker::None);
        assert_eq!(step.state, DecoderState::Data);
    }

    #[test]
    fn test_escape_sequences() {
        // 214 + 42 wraps to NUL, which must be escaped as "=@"
        let step = decode_step(b"=@", DecoderState::default());
        assert_eq!(step.data, vec![214]);

        // Escape split across the chunk boundary resumes via Escape state
        let first = decode_step(b"=", DecoderState::Data);
        assert_eq!(first.consumed, 1);
        assert_eq!(first.state, DecoderState::Escape);
        let second = decode_step(b"@", first.state);
        assert_eq!(second.data, vec![214]);
    }

    #[test]
    fn test_crlf_is_framing_not_data() {
        let mut encoded = encode(b"ab");
        encoded.extend_from_slice(b"\r\n");
        encoded.extend_from_slice(&encode(b"cd"));
        let step = decode_step(&encoded, DecoderState::default());
        assert_eq!(step.data, b"abcd");
    }

    #[test]
    fn test_control_line_stops_decoding() {
        let mut encoded = encode(b"data");
        encoded.extend_from_slice(b"\r\n=yend size=4\r\n");
        let step = decode_step(&encoded, DecoderState::default());
        assert_eq!(step.data, b"data");
        assert_eq!(step.end, EndMarker::Control);
        assert_eq!(&encoded[step.consumed..], b"=yend size=4\r\n");
    }

    #[test]
    fn test_article_terminator_in_band() {
        let mut encoded = encode(b"xy");
        encoded.extend_from_slice(b"\r\n.\r\n");
        let step = decode_step(&encoded, DecoderState::default());
        assert_eq!(step.data, b"xy");
        assert_eq!(step.end, EndMarker::Article);
        assert_eq!(step.consumed, encoded.len());
    }

    #[test]
    fn test_dot_stuffed_line() {
        // A line whose first encoded byte is '.' is stuffed to ".." on the
        // wire; the first dot is framing, the second is data.
        let step = decode_step(b"..X", DecoderState::default());
        assert_eq!(step.data, vec![b'.' - 42, b'X' - 42]);
    }

    #[test]
    fn test_ambiguous_tail_left_unconsumed() {
        // Chunk ends right after "\r\n=": could be an escape or "=y".
        let mut encoded = encode(b"ab");
        encoded.extend_from_slice(b"\r\n=");
        let step = decode_step(&encoded, DecoderState::default());
        assert_eq!(step.data, b"ab");
        assert_eq!(step.end, EndMarker::None);
        assert_eq!(step.consumed, encoded.len() - 1);
        assert_eq!(step.state, DecoderState::Crlf);

        // Chunk ends mid-terminator.
        let step = decode_step(b"ab\r\n.\r", DecoderState::default());
        assert_eq!(step.end, EndMarker::None);
        assert_eq!(step.consumed, 4);
    }

    #[test]
    fn test_every_split_point_decodes_identically() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(300).collect();
        let mut wire = Vec::new();
        for block in payload.chunks(128) {
            wire.extend_from_slice(&encode(block));
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b"=yend size=300\r\n");

        let (reference, end) = drive(&[&wire]);
        assert_eq!(reference, payload);
        assert_eq!(end, EndMarker::Control);

        for split in 1..wire.len() {
            let (decoded, end) = drive(&[&wire[..split], &wire[split..]]);
            assert_eq!(decoded, payload, "split at {split}");
            assert_eq!(end, EndMarker::Control, "split at {split}");
        }
    }

    #[test]
    fn test_crc32_resumes() {
        let data = b"the quick brown fox";
        let whole = crc32(data, 0);
        let resumed = crc32(&data[7..], crc32(&data[..7], 0));
        assert_eq!(whole, resumed);
    }
}
