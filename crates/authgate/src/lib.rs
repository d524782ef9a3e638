//! # Authgate
//!
//! Login gate for a game server: players with a remotely verified
//! identity get in through an encrypted challenge, everyone else plays
//! under a derived local identity and must `/register` or `/login` with a
//! password before they can do anything.
//!
//! ```text
//! Transport (authgate-transport)   ← WebSocket frames
//!     ↕
//! Protocol (authgate-protocol)     ← Envelope / ClientMessage / ServerMessage
//!     ↕
//! Handshake (authgate-handshake)   ← holds LoginStart, challenge, confirm, re-inject
//!     ↕                     ↘
//! Session (authgate-session)    Verify (authgate-verify), Store (authgate-store)
//!     ↕
//! Access filter + commands (this crate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authgate::prelude::*;
//!
//! # async fn start() -> Result<(), AuthgateError> {
//! let config = AuthgateConfig::default();
//! let authority = HttpIdentityAuthority::new(&config.authority)?;
//! let server = AuthgateServerBuilder::from_config(&config)
//!     .build(MemoryCredentialStore::new(), authority)
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod commands;
mod config;
mod error;
pub mod filter;
mod handler;
mod messages;
pub mod online;
mod server;

pub use config::{AuthgateConfig, SecurityConfig, ServerConfig};
pub use error::AuthgateError;
pub use messages::{Messages, translate_colour_codes};
pub use online::OnlinePlayers;
pub use server::{AuthgateServer, AuthgateServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{
        AuthgateConfig, AuthgateError, AuthgateServer, AuthgateServerBuilder, Messages,
        OnlinePlayers,
    };
    pub use authgate_crypto::ServerKeyPair;
    pub use authgate_handshake::reasons;
    pub use authgate_protocol::{
        ClientMessage, Envelope, LoginStart, Payload, PlayerId, ProfileProperty, ServerMessage,
    };
    pub use authgate_session::SessionRegistry;
    pub use authgate_store::{
        CredentialRecord, CredentialStore, DatabaseKind, MemoryCredentialStore,
        SqliteCredentialStore,
    };
    pub use authgate_verify::{ConfirmedIdentity, HttpIdentityAuthority, IdentityAuthority};
}
