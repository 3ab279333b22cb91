//! Client configuration for the membership API and the disperse relay.
//!
//! Defaults point at the public Guild API and a relay on localhost. The
//! CLI builds a [`ClientConfig`] from the endpoints in its distribution
//! config; only the relay token comes straight from the environment.

use url::Url;
use zeroize::Zeroizing;

/// Default Guild API base URL.
pub const DEFAULT_MEMBERSHIP_URL: &str = "https://api.guild.xyz";

/// Default disperse relay base URL.
pub const DEFAULT_DISPERSE_URL: &str = "http://127.0.0.1:8680";

/// Configuration for connecting to the external services.
///
/// Custom `Debug` implementation redacts the `relay_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the membership (Guild) API.
    pub membership_url: Url,
    /// Base URL of the disperse relay.
    pub disperse_url: Url,
    /// Bearer token for the disperse relay, if it requires one.
    pub relay_token: Option<Zeroizing<String>>,
    /// Timeout for plain queries, in seconds.
    pub timeout_secs: u64,
    /// Timeout for calls that block until on-chain confirmation, in seconds.
    pub confirmation_timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("membership_url", &self.membership_url)
            .field("disperse_url", &self.disperse_url)
            .field(
                "relay_token",
                &self.relay_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with explicit endpoints and default timeouts.
    pub fn new(membership_url: Url, disperse_url: Url) -> Self {
        Self {
            membership_url,
            disperse_url,
            relay_token: None,
            timeout_secs: 30,
            confirmation_timeout_secs: 300,
        }
    }

    /// Create a configuration pointing to local mock servers (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the localhost URL cannot be parsed.
    pub fn local_mock(base_port: u16) -> Result<Self, ConfigError> {
        let make_url = |port: u16| -> Result<Url, ConfigError> {
            Url::parse(&format!("http://127.0.0.1:{port}"))
                .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))
        };
        Ok(Self {
            membership_url: make_url(base_port)?,
            disperse_url: make_url(base_port + 1)?,
            relay_token: None,
            timeout_secs: 5,
            confirmation_timeout_secs: 5,
        })
    }
}

/// Read the relay token; empty values count as unset.
pub fn relay_token_from_env() -> Option<Zeroizing<String>> {
    std::env::var("AIRDROP_RELAY_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .map(Zeroizing::new)
}

/// Join a relative API path onto a base URL, tolerating a trailing slash or a
/// path prefix on the base.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
