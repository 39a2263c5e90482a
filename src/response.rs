//! NNTP response types and status codes

/// NNTP single-line response with status code and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NntpResponse {
    /// 3-digit NNTP response code
    pub code: u16,
    /// Status message from server
    pub message: String,
}

impl NntpResponse {
    /// Check if response indicates success (2xx)
    pub fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// Check if response indicates continuation (3xx)
    pub fn is_continuation(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// Check if response indicates error (4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }
}

/// Article-family response (ARTICLE, HEAD, BODY) with parsed status fields
/// and the dot-unstuffed body lines
#[derive(Debug, Clone)]
pub struct ArticleResponse {
    /// 3-digit NNTP response code (220/221/222)
    pub code: u16,
    /// Status message from server
    pub message: String,
    /// Article number, 0 when the server omits it
    pub number: i64,
    /// Article message-id, empty when the server omits it
    pub message_id: String,
    /// Dot-unstuffed response lines
    pub lines: Vec<String>,
}

/// STAT result (RFC 3977 Section 6.2.4)
///
/// 430/423 are information, not protocol violations, so they are modelled
/// as a variant rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stat {
    /// Article exists (code 223)
    Found {
        /// Article number, 0 when queried by message-id
        number: i64,
        /// The article's message identifier
        message_id: String,
    },
    /// Article does not exist (code 430 or 423)
    NotFound {
        /// The response code the server used
        code: u16,
        /// Status message from server
        message: String,
    },
}

impl Stat {
    /// Whether the article exists
    pub fn is_found(&self) -> bool {
        matches!(self, Stat::Found { .. })
    }
}

/// GROUP response (RFC 3977 Section 6.1.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// 3-digit NNTP response code (211)
    pub code: u16,
    /// Status message from server
    pub message: String,
    /// Estimated article count
    pub count: i64,
    /// Lowest article number in the group
    pub low: i64,
    /// Highest article number in the group
    pub high: i64,
    /// Newsgroup name
    pub name: String,
}

/// LISTGROUP response: group summary plus the article numbers present
/// (RFC 3977 Section 6.1.2)
#[derive(Debug, Clone)]
pub struct ListGroupInfo {
    /// Group summary from the status line
    pub group: GroupInfo,
    /// Article numbers present in the group, in server order
    pub articles: Vec<i64>,
}

/// NNTP response codes consumed by this crate (RFC 3977, RFC 4643)
pub mod codes {
    /// Help text follows
    pub const HELP_TEXT_FOLLOWS: u16 = 100;
    /// Capability list follows (RFC 3977 Section 5.2)
    pub const CAPABILITY_LIST: u16 = 101;
    /// Server date/time (RFC 3977 Section 7.1)
    pub const SERVER_DATE: u16 = 111;

    /// Server ready, posting allowed
    pub const READY_POSTING_ALLOWED: u16 = 200;
    /// Server ready, no posting
    pub const READY_NO_POSTING: u16 = 201;
    /// Closing connection
    pub const CLOSING_CONNECTION: u16 = 205;
    /// Group selected
    pub const GROUP_SELECTED: u16 = 211;
    /// List information follows (RFC 3977 Section 7.6)
    pub const LIST_INFORMATION_FOLLOWS: u16 = 215;
    /// Article follows
    pub const ARTICLE_FOLLOWS: u16 = 220;
    /// Head follows
    pub const HEAD_FOLLOWS: u16 = 221;
    /// Body follows
    pub const BODY_FOLLOWS: u16 = 222;
    /// Article exists
    pub const ARTICLE_STAT: u16 = 223;
    /// Overview information follows
    pub const OVERVIEW_INFO_FOLLOWS: u16 = 224;
    /// Headers follow (RFC 3977 Section 8.5)
    pub const HEADERS_FOLLOW: u16 = 225;
    /// List of new articles follows (RFC 3977 Section 7.4)
    pub const NEW_ARTICLE_LIST_FOLLOWS: u16 = 230;
    /// List of new newsgroups follows (RFC 3977 Section 7.3)
    pub const NEW_NEWSGROUPS_FOLLOW: u16 = 231;
    /// Article transferred OK (RFC 3977 Section 6.3.2)
    pub const ARTICLE_TRANSFERRED: u16 = 235;
    /// Article posted successfully (RFC 3977 Section 6.3.1)
    pub const ARTICLE_POSTED: u16 = 240;
    /// Authentication accepted (RFC 4643)
    pub const AUTH_ACCEPTED: u16 = 281;

    /// Send article to be transferred (RFC 3977 Section 6.3.2)
    pub const SEND_ARTICLE_TRANSFER: u16 = 335;
    /// Send article to be posted
    pub const SEND_ARTICLE: u16 = 340;
    /// Continue with authentication (RFC 4643)
    pub const AUTH_CONTINUE: u16 = 381;

    /// No such newsgroup
    pub const NO_SUCH_GROUP: u16 = 411;
    /// No newsgroup selected
    pub const NO_GROUP_SELECTED: u16 = 412;
    /// No current article
    pub const NO_CURRENT_ARTICLE: u16 = 420;
    /// No next article
    pub const NO_NEXT_ARTICLE: u16 = 421;
    /// No previous article
    pub const NO_PREV_ARTICLE: u16 = 422;
    /// No article with that number
    pub const NO_SUCH_ARTICLE_NUMBER: u16 = 423;
    /// No article with that message-id
    pub const NO_SUCH_ARTICLE_ID: u16 = 430;
    /// Transfer not possible; try again later (RFC 3977 Section 6.3.2)
    pub const TRANSFER_NOT_POSSIBLE: u16 = 436;
    /// Transfer rejected; do not retry (RFC 3977 Section 6.3.2)
    pub const TRANSFER_REJECTED: u16 = 437;
    /// Posting failed (RFC 3977 Section 6.3.1)
    pub const POSTING_FAILED: u16 = 441;
    /// Authentication out of sequence (RFC 4643)
    pub const AUTH_OUT_OF_SEQUENCE: u16 = 482;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        let response = NntpResponse {
            code: 200,
            message: "Ready".to_string(),
        };
        assert!(response.is_success());
        assert!(!response.is_continuation());
        assert!(!response.is_error());
    }

    #[test]
    fn test_is_continuation() {
        let response = NntpResponse {
            code: 381,
            message: "Continue".to_string(),
        };
        assert!(!response.is_success());
        assert!(response.is_continuation());
        assert!(!response.is_error());
    }

    #[test]
    fn test_boundary_codes() {
        for (code, success) in [(199, false), (200, true), (299, true), (300, false)] {
            let response = NntpResponse {
                code,
                message: String::new(),
            };
            assert_eq!(response.is_success(), success, "code {code}");
        }
    }

    #[test]
    fn test_stat_is_found() {
        let found = Stat::Found {
            number: 12,
            message_id: "<a@b>".to_string(),
        };
        assert!(found.is_found());

        let not_found = Stat::NotFound {
            code: 430,
            message: "no such article".to_string(),
        };
        assert!(!not_found.is_found());
    }
}
