//! NNTP command builders and response parsers
//!
//! Builders return the command without the trailing CRLF; the connection's
//! line writer appends it.

use crate::error::{NntpError, Result};
use crate::response::{GroupInfo, NntpResponse};

/// Parse an NNTP status line into code and message
///
/// The first three bytes must be ASCII digits; when the line is longer than
/// four characters, the remainder after the single separating space is the
/// message.
pub fn parse_response_line(line: &str) -> Result<(u16, String)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3
        || !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[2].is_ascii_digit()
    {
        return Err(NntpError::InvalidResponse(line.chars().take(100).collect()));
    }

    // Safe to slice since we verified ASCII
    let code = line[0..3]
        .parse::<u16>()
        .map_err(|_| NntpError::InvalidResponse(line.chars().take(100).collect()))?;

    let message = if line.len() > 4 {
        line[4..].to_string()
    } else {
        String::new()
    };

    Ok((code, message))
}

/// Parse the message of a 223-form response ("n message-id ...") into
/// article number and message-id
///
/// Missing tokens default to 0 and the empty string.
pub fn parse_article_response_line(message: &str) -> (i64, String) {
    let mut fields = message.split_whitespace();
    let number = fields
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);
    let message_id = fields.next().unwrap_or("").to_string();
    (number, message_id)
}

/// Parse a GROUP response into [`GroupInfo`]
///
/// Message format: "count low high group-name"
pub fn parse_group_response(response: &NntpResponse) -> Result<GroupInfo> {
    let parts: Vec<&str> = response.message.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(NntpError::InvalidResponse(response.message.clone()));
    }

    let count = parts[0]
        .parse()
        .map_err(|_| NntpError::InvalidResponse(response.message.clone()))?;
    let low = parts[1]
        .parse()
        .map_err(|_| NntpError::InvalidResponse(response.message.clone()))?;
    let high = parts[2]
        .parse()
        .map_err(|_| NntpError::InvalidResponse(response.message.clone()))?;

    Ok(GroupInfo {
        code: response.code,
        message: response.message.clone(),
        count,
        low,
        high,
        name: parts[3].to_string(),
    })
}

/// Build AUTHINFO USER command (RFC 4643)
pub fn authinfo_user(username: &str) -> String {
    format!("AUTHINFO USER {username}")
}

/// Build AUTHINFO PASS command (RFC 4643)
pub fn authinfo_pass(password: &str) -> String {
    format!("AUTHINFO PASS {password}")
}

/// Build GROUP command
pub fn group(newsgroup: &str) -> String {
    format!("GROUP {newsgroup}")
}

/// Build LISTGROUP command, optionally with a range (RFC 3977 Section 6.1.2)
pub fn listgroup(newsgroup: &str, range: Option<&str>) -> String {
    match range {
        Some(range) => format!("LISTGROUP {newsgroup} {range}"),
        None => format!("LISTGROUP {newsgroup}"),
    }
}

/// Build ARTICLE command
pub fn article(id: &str) -> String {
    format!("ARTICLE {id}")
}

/// Build HEAD command
pub fn head(id: &str) -> String {
    format!("HEAD {id}")
}

/// Build BODY command
pub fn body(id: &str) -> String {
    format!("BODY {id}")
}

/// Build STAT command, optionally for the current article (RFC 3977 Section 6.2.4)
pub fn stat(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("STAT {id}"),
        None => "STAT".to_string(),
    }
}

/// Build NEXT command (RFC 3977 Section 6.1.4)
pub fn next() -> String {
    "NEXT".to_string()
}

/// Build LAST command (RFC 3977 Section 6.1.3)
pub fn last() -> String {
    "LAST".to_string()
}

/// Build OVER command, optionally with a range (RFC 3977 Section 8.3)
pub fn over(range: Option<&str>) -> String {
    match range {
        Some(range) => format!("OVER {range}"),
        None => "OVER".to_string(),
    }
}

/// Build XOVER command (pre-RFC 3977 alias of OVER)
pub fn xover(range: &str) -> String {
    format!("XOVER {range}")
}

/// Build HDR command (RFC 3977 Section 8.5)
pub fn hdr(field: &str, range: Option<&str>) -> String {
    match range {
        Some(range) => format!("HDR {field} {range}"),
        None => format!("HDR {field}"),
    }
}

/// Build XHDR command (pre-RFC 3977 alias of HDR)
pub fn xhdr(field: &str, range: &str) -> String {
    format!("XHDR {field} {range}")
}

/// Build LIST command, optionally with a keyword (RFC 3977 Section 7.6)
pub fn list(keyword: Option<&str>) -> String {
    match keyword {
        Some(keyword) => format!("LIST {keyword}"),
        None => "LIST".to_string(),
    }
}

/// Build NEWGROUPS command (RFC 3977 Section 7.3)
///
/// Format: NEWGROUPS yyyymmdd hhmmss GMT
pub fn newgroups(date: &str, time: &str) -> String {
    format!("NEWGROUPS {date} {time} GMT")
}

/// Build NEWNEWS command (RFC 3977 Section 7.4)
///
/// Format: NEWNEWS wildmat yyyymmdd hhmmss GMT
pub fn newnews(wildmat: &str, date: &str, time: &str) -> String {
    format!("NEWNEWS {wildmat} {date} {time} GMT")
}

/// Build CAPABILITIES command (RFC 3977 Section 5.2)
pub fn capabilities() -> String {
    "CAPABILITIES".to_string()
}

/// Build HELP command (RFC 3977 Section 7.2)
pub fn help() -> String {
    "HELP".to_string()
}

/// Build DATE command (RFC 3977 Section 7.1)
///
/// Response: 111 yyyymmddhhmmss
pub fn date() -> String {
    "DATE".to_string()
}

/// Build MODE READER command (RFC 3977 Section 5.3)
pub fn mode_reader() -> String {
    "MODE READER".to_string()
}

/// Build POST command (RFC 3977 Section 6.3.1)
pub fn post() -> String {
    "POST".to_string()
}

/// Build IHAVE command (RFC 3977 Section 6.3.2)
pub fn ihave(message_id: &str) -> String {
    format!("IHAVE {message_id}")
}

/// Build QUIT command
pub fn quit() -> String {
    "QUIT".to_string()
}

/// Overview entry from an OVER/XOVER response line (RFC 3977 Section 8.3)
#[derive(Debug, Clone)]
pub struct OverEntry {
    /// Article number within the newsgroup
    pub number: i64,
    /// Article subject line
    pub subject: String,
    /// Article author (From header)
    pub author: String,
    /// Article date string
    pub date: String,
    /// Unique message-id
    pub message_id: String,
    /// References to parent articles
    pub references: String,
    /// Article size in bytes
    pub bytes: i64,
    /// Number of lines in the article
    pub lines: i64,
}

/// Parse an OVER/XOVER response line
///
/// Format: "number\tsubject\tauthor\tdate\tmessage-id\treferences\tbytes\tlines[\t...]"
pub fn parse_over_line(line: &str) -> Result<OverEntry> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 8 {
        return Err(NntpError::InvalidResponse(line.to_string()));
    }

    Ok(OverEntry {
        number: parts[0].parse().unwrap_or(0),
        subject: parts[1].to_string(),
        author: parts[2].to_string(),
        date: parts[3].to_string(),
        message_id: parts[4].to_string(),
        references: parts[5].to_string(),
        bytes: parts[6].parse().unwrap_or(0),
        lines: parts[7].parse().unwrap_or(0),
    })
}

/// HDR entry: article number and header field value (RFC 3977 Section 8.5)
#[derive(Debug, Clone)]
pub struct HdrEntry {
    /// Article number, 0 when queried by message-id
    pub number: i64,
    /// Header field value for this article
    pub value: String,
}

/// Parse an HDR response line
///
/// Format: "number value"; the value may contain spaces, so everything
/// after the first space belongs to it.
pub fn parse_hdr_line(line: &str) -> Result<HdrEntry> {
    let (number, value) = line
        .split_once(' ')
        .ok_or_else(|| NntpError::InvalidResponse(line.to_string()))?;

    Ok(HdrEntry {
        number: number
            .parse()
            .map_err(|_| NntpError::InvalidResponse(line.to_string()))?,
        value: value.to_string(),
    })
}
