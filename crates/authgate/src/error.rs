//! Unified error type for the Authgate server.

use authgate_crypto::CryptoError;
use authgate_handshake::HandshakeError;
use authgate_protocol::ProtocolError;
use authgate_store::StoreError;
use authgate_transport::TransportError;
use authgate_verify::VerifyError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthgateError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unexpected message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Key generation or decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The identity authority client could not be set up.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The credential store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The login handshake rejected the connection.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AuthgateConfig`](crate::AuthgateConfig).
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
