//! Database location settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which backend holds credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// SQLite file at [`DatabaseConfig::path`].
    #[default]
    Sqlite,
    /// Nothing persisted; records live until the process exits.
    Memory,
}

/// `[database]` section of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub kind: DatabaseKind,

    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("authgate.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::default(),
            path: default_path(),
        }
    }
}
