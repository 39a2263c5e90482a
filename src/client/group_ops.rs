//! Newsgroup selection commands (RFC 3977 Section 6.1)

use crate::commands;
use crate::error::{NntpError, Result};
use crate::response::{codes, GroupInfo, ListGroupInfo};
use tracing::debug;

use super::NntpClient;

impl NntpClient {
    /// Select a newsgroup
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::Protocol`] on any code other than 211
    /// (including 411, no such newsgroup).
    pub async fn group(&self, newsgroup: &str) -> Result<GroupInfo> {
        debug!("selecting group {}", newsgroup);
        let response = self
            .connection()
            .command(&commands::group(newsgroup))
            .await?;
        if response.code != codes::GROUP_SELECTED {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }
        commands::parse_group_response(&response)
    }

    /// Select a newsgroup and list its article numbers
    /// (RFC 3977 Section 6.1.2)
    ///
    /// # Arguments
    ///
    /// * `newsgroup` - the group to select
    /// * `range` - optional range limiting the listing
    ///   (e.g. "100-200", "100-")
    pub async fn listgroup(&self, newsgroup: &str, range: Option<&str>) -> Result<ListGroupInfo> {
        debug!("listing group {}", newsgroup);
        let (response, lines) = self
            .connection()
            .command_multi_line(&commands::listgroup(newsgroup, range))
            .await?;
        if response.code != codes::GROUP_SELECTED {
            return Err(NntpError::Protocol {
                code: response.code,
                message: response.message,
            });
        }

        let group = commands::parse_group_response(&response)?;
        let articles = lines
            .iter()
            .filter_map(|line| line.trim().parse::<i64>().ok())
            .collect();

        Ok(ListGroupInfo { group, articles })
    }
}
