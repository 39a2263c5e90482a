//! Parsers for the yEnc declaration lines

use crate::error::{NntpError, Result};

use super::{YencHeaders, YencTrailer};

/// Parse a `=ybegin` header line
///
/// Format: `=ybegin line=128 size=123456 [part=1 total=5] name=file with spaces.bin`
///
/// The name may contain spaces and is always the final field, so the
/// payload is split at ` name=` before the remaining tokens are read as
/// key=value pairs. `line` and `size` are mandatory.
pub(crate) fn parse_ybegin(line: &str) -> Result<YencHeaders> {
    let payload = line
        .strip_prefix("=ybegin ")
        .ok_or_else(|| NntpError::YencMalformed(format!("invalid =ybegin line: {line}")))?;

    let (attrs, name) = match payload.find(" name=") {
        Some(idx) => (&payload[..idx], &payload[idx + 6..]),
        None => match payload.strip_prefix("name=") {
            Some(name) => ("", name),
            None => {
                return Err(NntpError::YencMalformed(
                    "missing 'name' in =ybegin".to_string(),
                ))
            }
        },
    };

    let mut line_len = None;
    let mut size = None;
    let mut part = None;
    let mut total = None;
    for (key, value) in key_values(attrs) {
        match key {
            "line" => line_len = value.parse::<u16>().ok(),
            "size" => size = value.parse::<i64>().ok(),
            "part" => part = value.parse::<u16>().ok(),
            "total" => total = value.parse::<u16>().ok(),
            _ => {}
        }
    }

    Ok(YencHeaders {
        line: line_len
            .ok_or_else(|| NntpError::YencMalformed("missing 'line' in =ybegin".to_string()))?,
        size: size
            .ok_or_else(|| NntpError::YencMalformed("missing 'size' in =ybegin".to_string()))?,
        name: name.to_string(),
        part,
        total,
        part_begin: None,
        part_end: None,
    })
}

/// Parse a `=ypart` line into (begin, end) byte offsets
///
/// Format: `=ypart begin=1 end=123456`
pub(crate) fn parse_ypart(line: &str) -> Result<(i64, i64)> {
    let payload = line
        .strip_prefix("=ypart ")
        .ok_or_else(|| NntpError::YencMalformed(format!("invalid =ypart line: {line}")))?;

    let mut begin = None;
    let mut end = None;
    for (key, value) in key_values(payload) {
        match key {
            "begin" => begin = value.parse::<i64>().ok(),
            "end" => end = value.parse::<i64>().ok(),
            _ => {}
        }
    }

    Ok((
        begin.ok_or_else(|| NntpError::YencMalformed("missing 'begin' in =ypart".to_string()))?,
        end.ok_or_else(|| NntpError::YencMalformed("missing 'end' in =ypart".to_string()))?,
    ))
}

/// Parse a `=yend` trailer line
///
/// Format: `=yend size=123456 [crc32=ab12cd34] [pcrc32=0x12345678] [part=1]`
///
/// CRC values are hexadecimal, with an optional `0x` prefix.
pub(crate) fn parse_yend(line: &str) -> Result<YencTrailer> {
    let payload = line
        .strip_prefix("=yend ")
        .ok_or_else(|| NntpError::YencMalformed(format!("invalid =yend line: {line}")))?;

    let mut size = None;
    let mut crc32 = None;
    let mut pcrc32 = None;
    let mut part = None;
    for (key, value) in key_values(payload) {
        match key {
            "size" => size = value.parse::<i64>().ok(),
            "crc32" => crc32 = parse_hex(value),
            "pcrc32" => pcrc32 = parse_hex(value),
            "part" => part = value.parse::<u16>().ok(),
            _ => {}
        }
    }

    Ok(YencTrailer {
        size: size
            .ok_or_else(|| NntpError::YencMalformed("missing 'size' in =yend".to_string()))?,
        crc32,
        pcrc32,
        part,
    })
}

fn key_values(payload: &str) -> impl Iterator<Item = (&str, &str)> {
    payload
        .split_whitespace()
        .filter_map(|token| token.split_once('='))
}

fn parse_hex(value: &str) -> Option<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}
