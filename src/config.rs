//! NNTP server and pool configuration

use crate::error::{NntpError, Result};

/// Username/password pair for AUTHINFO authentication
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    /// Authentication username
    pub username: String,
    /// Authentication password
    pub password: String,
}

/// NNTP server configuration
///
/// Contains all the information needed to connect a single socket to an
/// NNTP server.
///
/// # Example
///
/// ```
/// use nntp_stream::ServerConfig;
///
/// // TLS on the standard secure port (563)
/// let config = ServerConfig::tls("news.example.com").with_credentials("user", "pass");
///
/// // Plain connection on the standard port (119), no authentication
/// let config = ServerConfig::plain("localhost");
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    /// Server hostname (e.g., "news.example.com")
    pub host: String,

    /// Server port (typically 119 for plain, 563 for TLS)
    pub port: u16,

    /// Use TLS encryption
    #[cfg_attr(feature = "serde", serde(default))]
    pub use_tls: bool,

    /// Credentials for AUTHINFO USER/PASS, or `None` for anonymous servers
    #[cfg_attr(feature = "serde", serde(default))]
    pub credentials: Option<Credentials>,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls,
            credentials: None,
        }
    }

    /// Create a configuration for a TLS connection on the standard secure port (563)
    pub fn tls(host: impl Into<String>) -> Self {
        Self::new(host, 563, true)
    }

    /// Create a configuration for a plain connection on the standard port (119)
    ///
    /// **Warning:** Plain connections transmit credentials in clear text.
    /// Use TLS connections whenever possible.
    pub fn plain(host: impl Into<String>) -> Self {
        Self::new(host, 119, false)
    }

    /// Override the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the credentials used for AUTHINFO and reconnect replay
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Default keepalive probe interval (60 seconds)
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: i64 = 60_000;

/// Default idle grace period before the pool sleeps (5 minutes)
pub const DEFAULT_IDLE_GRACE_PERIOD_MS: i64 = 300_000;

/// Connection pool configuration
///
/// # Example
///
/// ```
/// use nntp_stream::{PoolConfig, ServerConfig};
///
/// let server = ServerConfig::tls("news.example.com").with_credentials("user", "pass");
/// let config = PoolConfig::new(server, 8)
///     .with_keepalive_interval_ms(30_000)
///     .with_idle_grace_period_ms(0); // never sleep automatically
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Server to connect every pooled socket to
    pub server: ServerConfig,

    /// Maximum (and initial) number of connections; must be at least 1
    pub max_connections: u32,

    /// Interval between keepalive DATE probes on idle connections,
    /// in milliseconds; 0 disables probing
    #[cfg_attr(feature = "serde", serde(default = "default_keepalive_interval"))]
    pub keepalive_interval_ms: i64,

    /// Inactivity period after which the pool closes its connections and
    /// sleeps, in milliseconds; 0 disables automatic sleep
    #[cfg_attr(feature = "serde", serde(default = "default_idle_grace_period"))]
    pub idle_grace_period_ms: i64,
}

#[cfg(feature = "serde")]
fn default_keepalive_interval() -> i64 {
    DEFAULT_KEEPALIVE_INTERVAL_MS
}

#[cfg(feature = "serde")]
fn default_idle_grace_period() -> i64 {
    DEFAULT_IDLE_GRACE_PERIOD_MS
}

impl PoolConfig {
    /// Create a pool configuration with default keepalive and sleep intervals
    pub fn new(server: ServerConfig, max_connections: u32) -> Self {
        Self {
            server,
            max_connections,
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            idle_grace_period_ms: DEFAULT_IDLE_GRACE_PERIOD_MS,
        }
    }

    /// Set the keepalive probe interval (0 disables probing)
    pub fn with_keepalive_interval_ms(mut self, interval_ms: i64) -> Self {
        self.keepalive_interval_ms = interval_ms;
        self
    }

    /// Set the idle grace period before automatic sleep (0 disables it)
    pub fn with_idle_grace_period_ms(mut self, grace_ms: i64) -> Self {
        self.idle_grace_period_ms = grace_ms;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`NntpError::InvalidResponse`] when `max_connections` is 0.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(NntpError::InvalidResponse(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_helper() {
        let config = ServerConfig::tls("news.example.com");
        assert_eq!(config.host, "news.example.com");
        assert_eq!(config.port, 563);
        assert!(config.use_tls);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_plain_helper() {
        let config = ServerConfig::plain("localhost");
        assert_eq!(config.port, 119);
        assert!(!config.use_tls);
    }

    #[test]
    fn test_with_credentials() {
        let config = ServerConfig::tls("news.example.com").with_credentials("user", "pass");
        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pass");
    }

    #[test]
    fn test_pool_defaults() {
        let config = PoolConfig::new(ServerConfig::plain("localhost"), 4);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.keepalive_interval_ms, 60_000);
        assert_eq!(config.idle_grace_period_ms, 300_000);
    }

    #[test]
    fn test_pool_validation() {
        let config = PoolConfig::new(ServerConfig::plain("localhost"), 0);
        assert!(config.validate().is_err());

        let config = PoolConfig::new(ServerConfig::plain("localhost"), 1);
        assert!(config.validate().is_ok());
    }
}
