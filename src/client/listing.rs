//! Listing, overview, and server-information commands
//! (RFC 3977 Sections 5, 7, 8)

use crate::commands::{self, HdrEntry, OverEntry};
use crate::error::{NntpError, Result};
use crate::response::{codes, NntpResponse};

use super::NntpClient;

impl NntpClient {
    /// Request the server's capability list (RFC 3977 Section 5.2)
    pub async fn capabilities(&self) -> Result<Vec<String>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::capabilities())
            .await?;
        if response.code != codes::CAPABILITY_LIST {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines)
    }

    /// Switch the server to reader mode (RFC 3977 Section 5.3)
    pub async fn mode_reader(&self) -> Result<NntpResponse> {
        let response = self.connection().command(&commands::mode_reader()).await?;
        match response.code {
            codes::READY_POSTING_ALLOWED | codes::READY_NO_POSTING => Ok(response),
            code => Err(NntpError::Protocol {
                code,
                message: response.message,
            }),
        }
    }

    /// Request the server's help text (RFC 3977 Section 7.2)
    pub async fn help(&self) -> Result<Vec<String>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::help())
            .await?;
        if response.code != codes::HELP_TEXT_FOLLOWS {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines)
    }

    /// Request the server's current date and time (RFC 3977 Section 7.1)
    ///
    /// Returns the yyyymmddhhmmss timestamp string. Also used by the pool
    /// as its keepalive probe.
    pub async fn date(&self) -> Result<String> {
        let response = self.connection().command(&commands::date()).await?;
        if response.code != codes::SERVER_DATE {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(response.message.trim().to_string())
    }

    /// LIST, optionally with a keyword such as "ACTIVE" or "OVERVIEW.FMT"
    /// (RFC 3977 Section 7.6)
    ///
    /// Returns the raw information lines; their format depends on the
    /// keyword.
    pub async fn list(&self, keyword: Option<&str>) -> Result<Vec<String>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::list(keyword))
            .await?;
        if response.code != codes::LIST_INFORMATION_FOLLOWS {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines)
    }

    /// List newsgroups created since the given date/time
    /// (RFC 3977 Section 7.3)
    ///
    /// `date` is yyyymmdd, `time` is hhmmss, both interpreted as GMT.
    pub async fn newgroups(&self, date: &str, time: &str) -> Result<Vec<String>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::newgroups(date, time))
            .await?;
        if response.code != codes::NEW_NEWSGROUPS_FOLLOW {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines)
    }

    /// List message-ids of articles posted since the given date/time in
    /// groups matching `wildmat` (RFC 3977 Section 7.4)
    pub async fn newnews(&self, wildmat: &str, date: &str, time: &str) -> Result<Vec<String>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::newnews(wildmat, date, time))
            .await?;
        if response.code != codes::NEW_ARTICLE_LIST_FOLLOWS {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Fetch overview data for a range of articles (RFC 3977 Section 8.3)
    ///
    /// Malformed overview lines are skipped.
    pub async fn over(&self, range: Option<&str>) -> Result<Vec<OverEntry>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::over(range))
            .await?;
        if response.code != codes::OVERVIEW_INFO_FOLLOWS {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines
            .iter()
            .filter_map(|line| commands::parse_over_line(line).ok())
            .collect())
    }

    /// Fetch one header field for a range of articles
    /// (RFC 3977 Section 8.5)
    ///
    /// Accepts both the 225 (HDR) and 221 (legacy XHDR) success codes.
    /// Malformed lines are skipped.
    pub async fn hdr(&self, field: &str, range: Option<&str>) -> Result<Vec<HdrEntry>> {
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::hdr(field, range))
            .await?;
        if response.code != codes::HEADERS_FOLLOW && response.code != codes::HEAD_FOLLOWS {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(lines
            .iter()
            .filter_map(|line| commands::parse_hdr_line(line).ok())
            .collect())
    }
}
