//! Per-attempt state held by the machine.

use std::net::SocketAddr;

use authgate_crypto::TOKEN_LEN;
use authgate_protocol::{LoginStart, PlayerId, ProfileProperty};

/// Where a held login currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// Intercepted; waiting on the store or the existence probe.
    Held,
    /// Challenge sent; waiting for the client's response.
    Challenged { token: [u8; TOKEN_LEN] },
    /// Response accepted; waiting on the identity authority.
    Confirming,
    /// Resolved and re-injected; waiting for the message to come back.
    Released,
}

/// One in-flight login, keyed by display name.
#[derive(Debug, Clone)]
pub(crate) struct PendingLogin {
    pub(crate) connection_key: SocketAddr,
    pub(crate) held: LoginStart,
    pub(crate) stage: Stage,
}

/// How a login that passed the handshake was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not remotely verified; the player must `/login` or `/register`.
    Local,
    /// Confirmed by the identity authority.
    Verified {
        id: PlayerId,
        name: String,
        properties: Vec<ProfileProperty>,
    },
}

impl Resolution {
    /// The identity this login plays as.
    ///
    /// Local logins get the id derived from the claimed name; whatever id
    /// the client put in its message is ignored.
    pub fn identity(&self, claimed_name: &str) -> PlayerId {
        match self {
            Self::Local => PlayerId::offline(claimed_name),
            Self::Verified { id, .. } => *id,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// One-shot permission for a re-injected message to pass.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub(crate) connection_key: SocketAddr,
    pub(crate) resolution: Resolution,
}
