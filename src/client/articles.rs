//! Article retrieval and navigation commands (RFC 3977 Section 6.2)
//!
//! - ARTICLE / HEAD / BODY - fetch content as text lines
//! - BODY with streaming yEnc decode for binary articles
//! - STAT - check article existence without retrieving content
//! - NEXT / LAST - navigate within the selected group

use crate::commands;
use crate::error::{NntpError, Result};
use crate::response::{codes, ArticleResponse, Stat};
use crate::yenc::{stream, YencFetch, YencHeaders};
use tracing::trace;

use super::NntpClient;

impl NntpClient {
    /// Fetch a full article (headers and body) by message-id or number
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::ArticleNotFound`] on 430/423 and
    /// [`NntpError::Protocol`] on any code other than 220.
    pub async fn article(&self, id: &str) -> Result<ArticleResponse> {
        trace!("fetching article {}", id);
        self.fetch_article_family(commands::article(id), codes::ARTICLE_FOLLOWS, id)
            .await
    }

    /// Fetch article headers only
    pub async fn head(&self, id: &str) -> Result<ArticleResponse> {
        trace!("fetching head {}", id);
        self.fetch_article_family(commands::head(id), codes::HEAD_FOLLOWS, id)
            .await
    }

    /// Fetch an article body as text lines
    ///
    /// For yEnc binary bodies use [`body_yenc`](Self::body_yenc), which
    /// decodes incrementally instead of buffering the whole article.
    pub async fn body(&self, id: &str) -> Result<ArticleResponse> {
        trace!("fetching body {}", id);
        self.fetch_article_family(commands::body(id), codes::BODY_FOLLOWS, id)
            .await
    }

    async fn fetch_article_family(
        &self,
        cmd: String,
        want: u16,
        id: &str,
    ) -> Result<ArticleResponse> {
        let (response, lines) = self.connection().command_multi_line(&cmd).await?;
        match response.code {
            code if code == want => {
                let (number, message_id) = commands::parse_article_response_line(&response.message);
                Ok(ArticleResponse {
                    code,
                    message: response.message,
                    number,
                    message_id,
                    lines,
                })
            }
            codes::NO_SUCH_ARTICLE_ID | codes::NO_SUCH_ARTICLE_NUMBER => {
                Err(NntpError::ArticleNotFound(id.to_string()))
            }
            code => Err(NntpError::Protocol {
                code,
                message: response.message,
            }),
        }
    }

    /// Fetch an article body as a streaming yEnc decode
    ///
    /// Returns once the `=ybegin` (and optional `=ypart`) declaration has
    /// been parsed; decoded bytes then arrive through
    /// [`YencFetch::body`] at the consumer's pace. The connection stays
    /// dedicated to the stream until it completes or is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::ArticleNotFound`] on 430/423,
    /// [`NntpError::YencMalformed`] when the body is not yEnc framed, and
    /// [`NntpError::Protocol`] on any code other than 222. A CRC failure
    /// is reported through the body stream as
    /// [`NntpError::CrcMismatch`] after the preceding chunks were
    /// delivered.
    pub async fn body_yenc(&self, id: &str) -> Result<YencFetch> {
        trace!("fetching yEnc body {}", id);
        let (response, lease) = self.connection().command_raw(&commands::body(id)).await?;
        match response.code {
            codes::BODY_FOLLOWS => stream::start(lease).await,
            codes::NO_SUCH_ARTICLE_ID | codes::NO_SUCH_ARTICLE_NUMBER => {
                lease.release_clean();
                Err(NntpError::ArticleNotFound(id.to_string()))
            }
            code => {
                lease.release_clean();
                Err(NntpError::Protocol {
                    code,
                    message: response.message,
                })
            }
        }
    }

    /// Fetch only the yEnc declaration of an article body
    ///
    /// The body bytes are left unread, so the connection rebuilds its
    /// socket in the background afterwards; the next command waits for
    /// that rebuild transparently.
    pub async fn body_yenc_headers(&self, id: &str) -> Result<YencHeaders> {
        trace!("fetching yEnc headers {}", id);
        let (response, lease) = self.connection().command_raw(&commands::body(id)).await?;
        match response.code {
            codes::BODY_FOLLOWS => stream::headers_only(lease).await,
            codes::NO_SUCH_ARTICLE_ID | codes::NO_SUCH_ARTICLE_NUMBER => {
                lease.release_clean();
                Err(NntpError::ArticleNotFound(id.to_string()))
            }
            code => {
                lease.release_clean();
                Err(NntpError::Protocol {
                    code,
                    message: response.message,
                })
            }
        }
    }

    /// Check article status without retrieving content (RFC 3977 Section 6.2.4)
    ///
    /// 430/423 are reported as [`Stat::NotFound`], not as errors, so a
    /// missing article can be handled as data.
    pub async fn stat(&self, id: Option<&str>) -> Result<Stat> {
        let response = self.connection().command(&commands::stat(id)).await?;
        match response.code {
            codes::ARTICLE_STAT => {
                let (number, message_id) = commands::parse_article_response_line(&response.message);
                Ok(Stat::Found { number, message_id })
            }
            codes::NO_SUCH_ARTICLE_ID | codes::NO_SUCH_ARTICLE_NUMBER => Ok(Stat::NotFound {
                code: response.code,
                message: response.message,
            }),
            code => Err(NntpError::Protocol {
                code,
                message: response.message,
            }),
        }
    }

    /// Move to the next article in the selected group (RFC 3977 Section 6.1.4)
    ///
    /// Returns the new current article's number and message-id.
    pub async fn next(&self) -> Result<(i64, String)> {
        self.navigate(commands::next()).await
    }

    /// Move to the previous article in the selected group (RFC 3977 Section 6.1.3)
    pub async fn last(&self) -> Result<(i64, String)> {
        self.navigate(commands::last()).await
    }

    async fn navigate(&self, cmd: String) -> Result<(i64, String)> {
        let response = self.connection().command(&cmd).await?;
        if response.code != codes::ARTICLE_STAT {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        Ok(commands::parse_article_response_line(&response.message))
    }
}
