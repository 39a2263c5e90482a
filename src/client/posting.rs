//! Article submission commands (RFC 3977 Section 6.3)

use crate::error::{NntpError, Result};
use crate::response::{codes, NntpResponse};
use tracing::debug;

use super::NntpClient;

impl NntpClient {
    /// Post an article (RFC 3977 Section 6.3.1)
    ///
    /// Two-phase: POST must be answered with 340 before the article is
    /// sent, dot-stuffed and terminated with a lone ".". Lines must not
    /// carry their own CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::Protocol`] when the server refuses the POST
    /// (440) or rejects the article (441).
    pub async fn post(&self, lines: &[String]) -> Result<NntpResponse> {
        debug!("posting article ({} lines)", lines.len());
        let response = self.connection().post(lines).await?;
        if response.code != codes::ARTICLE_POSTED {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(response)
    }

    /// Offer an article to the server by message-id (RFC 3977 Section 6.3.2)
    ///
    /// Two-phase like [`post`](Self::post), gated on 335. 436 (try again
    /// later) and 437 (rejected) surface as [`NntpError::Protocol`] with
    /// the respective code.
    pub async fn ihave(&self, message_id: &str, lines: &[String]) -> Result<NntpResponse> {
        debug!("offering article {} ({} lines)", message_id, lines.len());
        let response = self.connection().ihave(message_id, lines).await?;
        if response.code != codes::ARTICLE_TRANSFERRED {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(response)
    }
}
