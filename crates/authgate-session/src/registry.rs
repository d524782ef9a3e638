//! The session registry: every authenticated player, keyed by identity.
//!
//! Written from two places: the handshake (verified logins) and the
//! command layer (`/login`, `/register`). Read on every gated action by
//! the access filter. Backed by a `DashMap`, so all of those can run on
//! different tasks without an outer lock.

use std::net::SocketAddr;

use authgate_protocol::PlayerId;
use dashmap::DashMap;

use crate::Session;

/// Process-wide map from identity to [`Session`].
///
/// ```text
///   create(owner A) ──→ [present, owned by A] ──→ remove_if_owned(A) / remove()
///                              │
///   create(owner B) ───────────┘   (re-login replaces, last writer wins;
///                                   A's teardown no longer removes it)
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<PlayerId, Session>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an authenticated session for `identity`, owned by the
    /// connection at `owner`.
    ///
    /// Replaces any existing session for the same identity, so a player
    /// who reconnects without logging out simply gets the new record.
    pub fn create(&self, identity: PlayerId, verified: bool, owner: SocketAddr) -> Session {
        let session = Session::new(identity, verified, owner);
        if let Some(previous) = self.sessions.insert(identity, session) {
            tracing::debug!(%identity, previous = %previous.owner, %owner, "replacing existing session");
        }
        tracing::info!(%identity, verified, %owner, "session created");
        session
    }

    /// Looks up the session for `identity`.
    pub fn get(&self, identity: &PlayerId) -> Option<Session> {
        self.sessions.get(identity).map(|entry| *entry)
    }

    /// Drops the session for `identity` whoever owns it, returning it if
    /// there was one.
    pub fn remove(&self, identity: &PlayerId) -> Option<Session> {
        let removed = self.sessions.remove(identity).map(|(_, s)| s);
        if removed.is_some() {
            tracing::info!(%identity, "session removed");
        }
        removed
    }

    /// Drops the session for `identity` if the connection at `owner`
    /// created it, returning it if so.
    ///
    /// A session that a newer login has replaced is left alone.
    pub fn remove_if_owned(&self, identity: &PlayerId, owner: SocketAddr) -> Option<Session> {
        let removed = self
            .sessions
            .remove_if(identity, |_, s| s.owner == owner)
            .map(|(_, s)| s);
        if removed.is_some() {
            tracing::info!(%identity, %owner, "session removed");
        }
        removed
    }

    /// `true` iff `identity` has a session and it is authenticated.
    pub fn is_authenticated(&self, identity: &PlayerId) -> bool {
        self.get(identity).is_some_and(|s| s.authenticated)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
