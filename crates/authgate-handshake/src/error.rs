//! Error types for the handshake state machine.

use authgate_crypto::CryptoError;
use authgate_store::StoreError;

/// Disconnect reasons shown to the client.
pub mod reasons {
    pub const FAILED: &str = "Authentication Failed";
    pub const SESSION_ERROR: &str = "Authentication Failed (Session Error)";
    pub const INVALID_TOKEN: &str = "Authentication Failed (Invalid Token)";
    pub const ENCRYPTION_ERROR: &str = "Encryption Error";
    pub const TRY_AGAIN: &str = "Authentication Failed. Please try again.";
    pub const EXPIRED: &str = "Session Expired";
}

/// Why a login attempt was terminated.
///
/// Every variant is terminal for the attempt: pending state is purged and
/// the client is disconnected with [`disconnect_reason`](Self::disconnect_reason).
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// Another connection is already logging in with this name.
    #[error("login for {name} already in progress")]
    DuplicateLogin { name: String },

    /// This connection already has a login in flight.
    #[error("connection already sent a login start")]
    AlreadyInProgress,

    /// A challenge response arrived with no challenge outstanding.
    #[error("no pending login for this connection")]
    SessionNotFound,

    /// The echoed token doesn't match the one we issued.
    #[error("verify token mismatch for {name}")]
    TokenMismatch { name: String },

    /// The response could not be decrypted with our key.
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// The identity authority did not confirm the login.
    #[error("identity authority did not confirm {name}")]
    ConfirmationFailed { name: String },

    /// Looking the name up in the credential store failed.
    #[error("credential lookup failed: {0}")]
    Store(#[from] StoreError),

    /// Writing to the client connection failed.
    #[error("connection channel failed: {0}")]
    Channel(String),

    /// The client took too long to finish logging in.
    #[error("login timed out")]
    Expired,
}

impl HandshakeError {
    /// The text shown to the client when this error ends its login.
    pub fn disconnect_reason(&self) -> &'static str {
        match self {
            Self::SessionNotFound => reasons::SESSION_ERROR,
            Self::TokenMismatch { .. } => reasons::INVALID_TOKEN,
            Self::Crypto(_) => reasons::ENCRYPTION_ERROR,
            Self::ConfirmationFailed { .. } => reasons::TRY_AGAIN,
            Self::Expired => reasons::EXPIRED,
            Self::DuplicateLogin { .. }
            | Self::AlreadyInProgress
            | Self::Store(_)
            | Self::Channel(_) => reasons::FAILED,
        }
    }

    /// `true` for failures that look like an attack rather than a fault.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::TokenMismatch { .. })
    }
}
