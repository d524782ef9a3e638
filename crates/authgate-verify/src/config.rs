//! Connection settings for the identity authority.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the identity authority lives and how long to wait for it.
///
/// Every field has a default, so an empty `[authority]` table in the
/// server's TOML config is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Base URL; `profile/lookup` and `session/confirm` are resolved
    /// against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bound on the existence probe, in seconds.
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    /// Bound on the identity confirmation, in seconds.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    /// Bound on establishing the TCP/TLS connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Send the player's IP with confirmation requests so the authority
    /// can check it against the address that started the session.
    #[serde(default = "default_send_client_ip")]
    pub send_client_ip: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8600/".to_string()
}

fn default_send_client_ip() -> bool {
    true
}

fn default_lookup_timeout() -> u64 {
    5
}

fn default_confirm_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

impl AuthorityConfig {
    /// Config pointing at `base_url` with default timeouts.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            lookup_timeout_secs: default_lookup_timeout(),
            confirm_timeout_secs: default_confirm_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            send_client_ip: default_send_client_ip(),
        }
    }
}
