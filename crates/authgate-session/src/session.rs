//! The session record: what the server knows about a logged-in player.

use std::net::SocketAddr;

use authgate_protocol::PlayerId;

/// One authenticated player.
///
/// Sessions only ever exist in the authenticated state. A player without
/// a session in the [`SessionRegistry`](crate::SessionRegistry) is, by
/// definition, not logged in, so there is no "pending" or "logged out"
/// variant to keep in sync.
///
/// All fields are fixed at creation. A re-login replaces the whole record
/// instead of mutating it, which is why the type is `Copy` and handed out
/// by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Stable identity: remotely confirmed, or derived from the name.
    pub identity: PlayerId,

    /// Always `true` for a session obtained from the registry.
    pub authenticated: bool,

    /// `true` if the remote authority confirmed the identity,
    /// `false` if the player logged in with a local password.
    pub verified_identity: bool,

    /// Key of the connection that logged in. Only that connection's
    /// teardown may remove the session.
    pub owner: SocketAddr,
}

impl Session {
    pub(crate) fn new(identity: PlayerId, verified_identity: bool, owner: SocketAddr) -> Self {
        Self {
            identity,
            authenticated: true,
            verified_identity,
            owner,
        }
    }
}
