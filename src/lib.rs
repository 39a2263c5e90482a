#![doc = include_str!("../README.md")]

mod client;
/// NNTP command builders and response line parsers
pub mod commands;
mod config;
mod connection;
mod error;
mod pool;
mod response;
/// Streaming yEnc decoding for binary article bodies
pub mod yenc;

pub use client::NntpClient;
pub use config::{Credentials, PoolConfig, ServerConfig};
pub use connection::NntpConnection;
pub use error::{NntpError, Result};
pub use pool::{NntpPool, PooledClient};
pub use response::{codes, ArticleResponse, GroupInfo, ListGroupInfo, NntpResponse, Stat};
pub use yenc::{YencBodyStream, YencFetch, YencHeaders, YencTrailer};
