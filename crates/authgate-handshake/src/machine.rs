//! The handshake state machine.

use std::net::SocketAddr;
use std::sync::Arc;

use authgate_crypto::{ServerKeyPair, new_challenge_token};
use authgate_protocol::LoginStart;
use authgate_session::SessionRegistry;
use authgate_store::CredentialStore;
use authgate_verify::IdentityAuthority;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::pending::{PendingLogin, Stage, Ticket};
use crate::{HandshakeError, LoginChannel, Resolution};

/// Server id sent in challenges and hashed into the session hash.
pub const SERVER_ID: &str = "";

/// What the caller should do with the message it just offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the message through. Login is complete as far as the
    /// handshake is concerned.
    Pass {
        message: LoginStart,
        resolution: Resolution,
    },
    /// Intercepted. The machine will re-inject it or reject the
    /// connection later.
    Held,
    /// The attempt's state was purged while this call was suspended
    /// (the connection went away). Nothing left to do.
    Abandoned,
}

/// Intercepts login-start messages and drives them to a resolution.
///
/// One instance per server, shared by every connection handler. Holds
/// three tables:
///
/// - `pending`: display name → [`PendingLogin`]. At most one per name,
///   kept until the re-injected message has passed.
/// - `connections`: connection key → display name, so a challenge
///   response (which carries no name) can find its login.
/// - `tickets`: display name → one-shot pass for the re-injected message.
///
/// No `DashMap` guard is ever held across an `.await`.
pub struct HandshakeMachine<S, A> {
    keys: Arc<ServerKeyPair>,
    store: Arc<S>,
    authority: Arc<A>,
    sessions: Arc<SessionRegistry>,
    forward_client_ip: bool,
    pending: DashMap<String, PendingLogin>,
    connections: DashMap<SocketAddr, String>,
    tickets: DashMap<String, Ticket>,
}

impl<S, A> HandshakeMachine<S, A>
where
    S: CredentialStore,
    A: IdentityAuthority,
{
    pub fn new(
        keys: Arc<ServerKeyPair>,
        store: Arc<S>,
        authority: Arc<A>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            keys,
            store,
            authority,
            sessions,
            forward_client_ip: true,
            pending: DashMap::new(),
            connections: DashMap::new(),
            tickets: DashMap::new(),
        }
    }

    /// Pass the client's IP to the authority when confirming. On by
    /// default.
    pub fn forward_client_ip(mut self, enabled: bool) -> Self {
        self.forward_client_ip = enabled;
        self
    }

    pub fn keys(&self) -> &ServerKeyPair {
        &self.keys
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    // -----------------------------------------------------------------
    // LoginStart
    // -----------------------------------------------------------------

    /// Offers an inbound login-start message to the machine.
    ///
    /// # Errors
    /// Any [`HandshakeError`]. The connection has already been sent its
    /// disconnect reason and all state for the attempt is gone.
    pub async fn on_login_start<C: LoginChannel>(
        &self,
        channel: &C,
        message: LoginStart,
    ) -> Result<Verdict, HandshakeError> {
        let key = channel.connection_key();
        let name = message.name.clone();

        if let Some((_, ticket)) = self
            .tickets
            .remove_if(&name, |_, t| t.connection_key == key)
        {
            self.pending.remove_if(&name, |_, p| p.connection_key == key);
            self.connections.remove_if(&key, |_, n| *n == name);
            tracing::debug!(%name, %key, "re-entry ticket consumed");
            return Ok(Verdict::Pass {
                message,
                resolution: ticket.resolution,
            });
        }

        if self.connections.contains_key(&key) {
            return self
                .reject(channel, Some(&name), HandshakeError::AlreadyInProgress)
                .await;
        }

        let inserted = match self.pending.entry(name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(PendingLogin {
                    connection_key: key,
                    held: message,
                    stage: Stage::Held,
                });
                true
            }
        };
        if !inserted {
            // The pending entry belongs to the other attempt; leave it.
            let err = HandshakeError::DuplicateLogin { name };
            tracing::info!(%key, error = %err, "login rejected");
            channel.disconnect(err.disconnect_reason()).await;
            return Err(err);
        }
        self.connections.insert(key, name.clone());
        tracing::debug!(%name, %key, "login start held");

        let verified = match self.store.lookup_verified_flag(&name).await {
            Ok(Some(flag)) => flag,
            Ok(None) => {
                let exists = self.authority.identity_exists(&name).await;
                tracing::debug!(%name, exists, "existence probe answered");
                exists
            }
            Err(e) => {
                return self.reject(channel, Some(&name), e.into()).await;
            }
        };

        if verified {
            self.challenge(channel, key, &name).await
        } else {
            self.release_local(channel, key, &name).await
        }
    }

    /// Local path: hand the message back untouched behind a ticket.
    async fn release_local<C: LoginChannel>(
        &self,
        channel: &C,
        key: SocketAddr,
        name: &str,
    ) -> Result<Verdict, HandshakeError> {
        let Some(held) = self.release(name, key, Stage::Held) else {
            return Ok(Verdict::Abandoned);
        };

        self.tickets.insert(
            name.to_string(),
            Ticket {
                connection_key: key,
                resolution: Resolution::Local,
            },
        );
        tracing::debug!(%name, %key, "releasing login on the local path");

        if let Err(e) = channel.reinject(held).await {
            self.purge(key, name);
            return Err(e);
        }
        Ok(Verdict::Held)
    }

    /// Verified path: issue a fresh token and send the challenge.
    async fn challenge<C: LoginChannel>(
        &self,
        channel: &C,
        key: SocketAddr,
        name: &str,
    ) -> Result<Verdict, HandshakeError> {
        let token = new_challenge_token();
        let stored = match self.pending.get_mut(name) {
            Some(mut p) if p.connection_key == key => {
                p.stage = Stage::Challenged { token };
                true
            }
            _ => false,
        };
        if !stored {
            return Ok(Verdict::Abandoned);
        }

        if let Err(e) = channel
            .send_challenge(SERVER_ID, self.keys.public_key_der(), &token)
            .await
        {
            return self.reject(channel, Some(name), e).await;
        }
        tracing::debug!(%name, %key, "challenge sent");
        Ok(Verdict::Held)
    }

    // -----------------------------------------------------------------
    // EncryptionResponse
    // -----------------------------------------------------------------

    /// Handles the client's answer to a challenge.
    ///
    /// # Errors
    /// As for [`on_login_start`](Self::on_login_start). A response that
    /// arrives when no challenge is outstanding (including a second copy
    /// of one already being confirmed) is
    /// [`HandshakeError::SessionNotFound`].
    pub async fn on_encryption_response<C: LoginChannel>(
        &self,
        channel: &C,
        shared_secret: &[u8],
        verify_token: &[u8],
    ) -> Result<Verdict, HandshakeError> {
        let key = channel.connection_key();
        let Some(name) = self.connections.get(&key).map(|n| n.value().clone()) else {
            return self
                .reject(channel, None, HandshakeError::SessionNotFound)
                .await;
        };

        // Challenged → Confirming exactly once per issued token.
        let expected = match self.pending.get_mut(&name) {
            Some(mut p) if p.connection_key == key => {
                let stage = p.stage;
                match stage {
                    Stage::Challenged { token } => {
                        p.stage = Stage::Confirming;
                        Some(token)
                    }
                    Stage::Held | Stage::Confirming | Stage::Released => None,
                }
            }
            _ => None,
        };
        let Some(expected) = expected else {
            return self
                .reject(channel, Some(&name), HandshakeError::SessionNotFound)
                .await;
        };

        let secret = match self.keys.decrypt_secret(shared_secret) {
            Ok(secret) => secret,
            Err(e) => return self.reject(channel, Some(&name), e.into()).await,
        };
        let echoed = match self.keys.decrypt_token(verify_token) {
            Ok(token) => token,
            Err(e) => return self.reject(channel, Some(&name), e.into()).await,
        };
        if echoed != expected {
            let err = HandshakeError::TokenMismatch { name: name.clone() };
            return self.reject(channel, Some(&name), err).await;
        }

        let hash = self.keys.session_hash(SERVER_ID, &secret);
        let ip = self.forward_client_ip.then(|| key.ip());
        tracing::debug!(%name, %key, "confirming identity");
        let confirmed = self.authority.confirm_identity(&name, &hash, ip).await;

        let Some(identity) = confirmed else {
            if !self.is_ours(&name, key) {
                return Ok(Verdict::Abandoned);
            }
            let err = HandshakeError::ConfirmationFailed { name: name.clone() };
            return self.reject(channel, Some(&name), err).await;
        };
        let Some(mut message) = self.release(&name, key, Stage::Confirming) else {
            tracing::debug!(%name, %key, "login abandoned during confirmation");
            return Ok(Verdict::Abandoned);
        };
        message.profile_id = Some(identity.id);
        message.properties = identity.properties.clone();

        self.tickets.insert(
            name.clone(),
            Ticket {
                connection_key: key,
                resolution: Resolution::Verified {
                    id: identity.id,
                    name: identity.name,
                    properties: identity.properties,
                },
            },
        );
        self.sessions.create(identity.id, true, key);
        tracing::info!(%name, id = %identity.id, "identity confirmed");

        if let Err(e) = channel.reinject(message).await {
            self.purge(key, &name);
            return Err(e);
        }
        Ok(Verdict::Held)
    }

    // -----------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------

    /// Forgets everything about the connection at `key`.
    ///
    /// Called when a connection closes, whatever state its login was in.
    /// Silent: there is nobody left to tell.
    pub fn connection_closed(&self, key: SocketAddr) {
        if let Some((_, name)) = self.connections.remove(&key) {
            self.purge(key, &name);
            tracing::debug!(%name, %key, "pending login purged on disconnect");
        }
    }

    /// Ends the login on `channel` because it ran out of time.
    pub async fn expire<C: LoginChannel>(&self, channel: &C) {
        let key = channel.connection_key();
        let name = self.connections.get(&key).map(|n| n.value().clone());
        let _ = self
            .reject(channel, name.as_deref(), HandshakeError::Expired)
            .await;
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// `true` while `name` has a login in flight.
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Number of logins in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// `true` while `name` holds an unconsumed re-entry ticket.
    pub fn has_ticket(&self, name: &str) -> bool {
        self.tickets.contains_key(name)
    }

    /// `true` while the connection at `key` is tracked.
    pub fn is_tracking(&self, key: &SocketAddr) -> bool {
        self.connections.contains_key(key)
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// Moves the login for `name` from `from` to `Released` and returns a
    /// copy of the held message, if it is still this connection's.
    fn release(&self, name: &str, key: SocketAddr, from: Stage) -> Option<LoginStart> {
        match self.pending.get_mut(name) {
            Some(mut p) if p.connection_key == key && p.stage == from => {
                p.stage = Stage::Released;
                Some(p.held.clone())
            }
            _ => None,
        }
    }

    fn is_ours(&self, name: &str, key: SocketAddr) -> bool {
        self.pending
            .get(name)
            .is_some_and(|p| p.connection_key == key)
    }

    /// Drops all state for (`name`, `key`). A verified session created for
    /// a ticket that was never used goes with it, unless a newer login has
    /// already replaced it.
    fn purge(&self, key: SocketAddr, name: &str) {
        self.pending.remove_if(name, |_, p| p.connection_key == key);
        let ticket = self.tickets.remove_if(name, |_, t| t.connection_key == key);
        if let Some((_, Ticket { resolution: Resolution::Verified { id, .. }, .. })) = ticket {
            self.sessions.remove_if_owned(&id, key);
        }
        self.connections.remove_if(&key, |_, n| n == name);
    }

    async fn reject<C: LoginChannel>(
        &self,
        channel: &C,
        name: Option<&str>,
        err: HandshakeError,
    ) -> Result<Verdict, HandshakeError> {
        let key = channel.connection_key();
        if let Some(name) = name {
            self.purge(key, name);
        }

        let shown = name.unwrap_or("<unknown>");
        if err.is_security_event() {
            tracing::warn!(name = %shown, %key, error = %err, "security: login rejected");
        } else {
            tracing::info!(name = %shown, %key, error = %err, "login rejected");
        }

        channel.disconnect(err.disconnect_reason()).await;
        Err(err)
    }
}

impl<S, A> std::fmt::Debug for HandshakeMachine<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeMachine")
            .field("pending", &self.pending.len())
            .field("connections", &self.connections.len())
            .field("tickets", &self.tickets.len())
            .finish_non_exhaustive()
    }
}
