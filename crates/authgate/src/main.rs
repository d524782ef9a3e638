//! The `authgate` server binary.
//!
//! ```text
//! authgate [config.toml]
//! ```
//!
//! Without an argument, reads `authgate.toml` from the working directory
//! if it exists and falls back to the built-in defaults otherwise.

use std::path::Path;

use authgate::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "authgate.toml";

#[tokio::main]
async fn main() -> Result<(), AuthgateError> {
    let config = load_config()?;

    let default_level = if config.server.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let authority = HttpIdentityAuthority::new(&config.authority)?;
    let builder = AuthgateServerBuilder::from_config(&config);

    match config.database.kind {
        DatabaseKind::Sqlite => {
            let store = SqliteCredentialStore::open(&config.database.path)?;
            tracing::info!(path = %config.database.path.display(), "using SQLite credential store");
            builder.build(store, authority).await?.run().await
        }
        DatabaseKind::Memory => {
            tracing::warn!("using in-memory credential store; registrations will not persist");
            builder
                .build(MemoryCredentialStore::new(), authority)
                .await?
                .run()
                .await
        }
    }
}

fn load_config() -> Result<AuthgateConfig, AuthgateError> {
    match std::env::args().nth(1) {
        Some(path) => AuthgateConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => AuthgateConfig::load(DEFAULT_CONFIG),
        None => Ok(AuthgateConfig::default()),
    }
}
