//! Server configuration, loaded from TOML by the `authgate` binary.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! login_timeout_secs = 30
//!
//! [authority]
//! base_url = "https://auth.example.net/"
//!
//! [database]
//! kind = "sqlite"
//! path = "authgate.db"
//!
//! [security]
//! bcrypt_cost = 12
//!
//! [messages]
//! prefix = "&8[&6Auth&8] "
//! ```
//!
//! Every section and every key is optional.

use std::path::Path;
use std::time::Duration;

use authgate_store::DatabaseConfig;
use authgate_verify::AuthorityConfig;
use serde::{Deserialize, Serialize};

use crate::{AuthgateError, Messages};

/// The whole config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthgateConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub authority: AuthorityConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub messages: Messages,
}

impl AuthgateConfig {
    /// Reads and parses the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthgateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            AuthgateError::ConfigRead {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::parse(&text).map_err(|source| AuthgateError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parses config text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// `[server]`: where to listen and how long a login may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Raises the default log level to `debug`.
    #[serde(default)]
    pub debug: bool,

    /// Seconds a connection may spend in the login phase. `0` disables
    /// the limit.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_login_timeout() -> u64 {
    30
}

impl ServerConfig {
    pub fn login_timeout(&self) -> Option<Duration> {
        (self.login_timeout_secs > 0).then(|| Duration::from_secs(self.login_timeout_secs))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            debug: false,
            login_timeout_secs: default_login_timeout(),
        }
    }
}

/// `[security]`: password hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// bcrypt work factor for new registrations.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    12
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}
