//! Per-connection handler: login phase, then gated play.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Login: feed client messages and re-injected `LoginStart`s to the
//!      handshake machine until one passes (bounded by the login timeout)
//!   2. Claim the identity (one connection per identity), then send
//!      `LoginSuccess` with it
//!   3. Play: gate every message through the access filter, run the
//!      login commands, stream world data only to logged-in players
//!   4. Teardown: guards purge handshake state, release the identity and
//!      drop the session this connection created

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use authgate_handshake::{HandshakeError, LoginChannel, Resolution, Verdict};
use authgate_protocol::{
    ClientMessage, Codec, Envelope, LoginStart, Payload, PlayerId, ServerMessage,
};
use authgate_session::SessionRegistry;
use authgate_store::CredentialStore;
use authgate_transport::{Connection, ConnectionId, WebSocketConnection};
use authgate_verify::IdentityAuthority;
use tokio::sync::mpsc;

use crate::AuthgateError;
use crate::commands::Caller;
use crate::filter::Gate;
use crate::online::{ALREADY_ONLINE, Kicked, LOGGED_IN_ELSEWHERE, OnlinePlayers};
use crate::server::ServerState;

/// Where every player starts.
const SPAWN: (f64, f64, f64) = (0.5, 64.0, 0.5);

/// Chunk coordinates of the area sent on spawn.
const SPAWN_CHUNKS: [(i32, i32); 4] = [(0, 0), (-1, 0), (0, -1), (-1, -1)];

// =========================================================================
// Guards
// =========================================================================

/// Forgets this connection's handshake state when the handler exits,
/// whichever phase it was in.
struct LoginGuard<S: CredentialStore, A: IdentityAuthority, C> {
    key: SocketAddr,
    state: Arc<ServerState<S, A, C>>,
}

impl<S: CredentialStore, A: IdentityAuthority, C> Drop for LoginGuard<S, A, C> {
    fn drop(&mut self) {
        self.state.machine.connection_closed(self.key);
    }
}

/// Drops the player's session when the handler exits, unless a newer
/// login has replaced it.
struct SessionGuard {
    identity: PlayerId,
    owner: SocketAddr,
    sessions: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove_if_owned(&self.identity, self.owner);
    }
}

/// Gives the identity back when the handler exits, unless a newer
/// login has taken it over.
struct OnlineGuard {
    identity: PlayerId,
    conn: ConnectionId,
    online: Arc<OnlinePlayers>,
}

impl Drop for OnlineGuard {
    fn drop(&mut self) {
        self.online.release(&self.identity, self.conn);
    }
}

// =========================================================================
// Outbound side
// =========================================================================

/// Encodes and sends server messages, stamping sequence and time.
struct Outbound<'a, C> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: AtomicU64,
    start: Instant,
}

impl<'a, C: Codec> Outbound<'a, C> {
    fn new(conn: &'a WebSocketConnection, codec: &'a C) -> Self {
        Self {
            conn,
            codec,
            seq: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    async fn send(&self, message: ServerMessage) -> Result<(), AuthgateError> {
        let envelope = Envelope::server(
            self.seq.fetch_add(1, Ordering::Relaxed),
            self.start.elapsed().as_millis() as u64,
            message,
        );
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }
}

/// The connection as the handshake machine sees it.
///
/// Re-injected messages go into `reinject` and come back out of the
/// login loop ahead of anything the client sends.
struct ConnectionChannel<'a, C> {
    out: &'a Outbound<'a, C>,
    key: SocketAddr,
    reinject: mpsc::UnboundedSender<LoginStart>,
}

impl<C: Codec> LoginChannel for ConnectionChannel<'_, C> {
    fn connection_key(&self) -> SocketAddr {
        self.key
    }

    async fn send_challenge(
        &self,
        server_id: &str,
        public_key: &[u8],
        verify_token: &[u8],
    ) -> Result<(), HandshakeError> {
        self.out
            .send(ServerMessage::EncryptionRequest {
                server_id: server_id.to_string(),
                public_key: public_key.to_vec(),
                verify_token: verify_token.to_vec(),
            })
            .await
            .map_err(|e| HandshakeError::Channel(e.to_string()))
    }

    async fn reinject(&self, message: LoginStart) -> Result<(), HandshakeError> {
        self.reinject
            .send(message)
            .map_err(|_| HandshakeError::Channel("login loop is gone".into()))
    }

    async fn disconnect(&self, reason: &str) {
        let message = ServerMessage::Disconnect {
            reason: reason.to_string(),
        };
        if let Err(e) = self.out.send(message).await {
            tracing::debug!(key = %self.key, error = %e, "disconnect notice not delivered");
        }
        let _ = self.out.conn.close().await;
    }
}

// =========================================================================
// Handler
// =========================================================================

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, A, C>>,
) -> Result<(), AuthgateError>
where
    S: CredentialStore,
    A: IdentityAuthority,
    C: Codec,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let out = Outbound::new(&conn, &state.codec);
    let (reinject_tx, mut reinject_rx) = mpsc::unbounded_channel();
    let channel = ConnectionChannel {
        out: &out,
        key: peer,
        reinject: reinject_tx,
    };
    let _login_guard = LoginGuard {
        key: peer,
        state: Arc::clone(&state),
    };

    // --- Step 1: Login ---
    let login = login_phase(&state, &channel, &mut reinject_rx);
    let passed = match state.login_timeout {
        Some(limit) => match tokio::time::timeout(limit, login).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::info!(%conn_id, %peer, "login timed out");
                state.machine.expire(&channel).await;
                return Ok(());
            }
        },
        None => login.await?,
    };
    let Some((claimed, resolution)) = passed else {
        return Ok(());
    };

    // --- Step 2: Claim identity, LoginSuccess ---
    let identity = resolution.identity(&claimed.name);
    let Some(kicked) = state
        .online
        .claim(identity, conn_id, resolution.is_verified())
    else {
        tracing::info!(%conn_id, name = %claimed.name, %identity, "identity already online");
        channel.disconnect(ALREADY_ONLINE).await;
        return Ok(());
    };
    let _online_guard = OnlineGuard {
        identity,
        conn: conn_id,
        online: Arc::clone(&state.online),
    };
    let (name, properties) = match resolution {
        Resolution::Verified {
            name, properties, ..
        } => (name, properties),
        Resolution::Local => (claimed.name, Vec::new()),
    };
    let _session_guard = SessionGuard {
        identity,
        owner: peer,
        sessions: Arc::clone(&state.sessions),
    };
    out.send(ServerMessage::LoginSuccess {
        profile_id: identity,
        name: name.clone(),
        properties,
    })
    .await?;
    tracing::info!(%conn_id, %name, %identity, "player joined");

    // --- Step 3: Play ---
    let caller = Caller {
        identity,
        name: &name,
        peer,
    };
    play_phase(&state, &out, caller, kicked).await

    // Guards drop here → session removed, identity released, handshake
    // state purged.
}

/// Runs the handshake until a `LoginStart` passes.
///
/// `Ok(None)` means the client went away or the machine abandoned the
/// attempt; there is nothing left to do for this connection.
async fn login_phase<S, A, C>(
    state: &ServerState<S, A, C>,
    channel: &ConnectionChannel<'_, C>,
    reinject_rx: &mut mpsc::UnboundedReceiver<LoginStart>,
) -> Result<Option<(LoginStart, Resolution)>, AuthgateError>
where
    S: CredentialStore,
    A: IdentityAuthority,
    C: Codec,
{
    let key = channel.key;
    loop {
        let message = tokio::select! {
            biased;
            Some(held) = reinject_rx.recv() => ClientMessage::LoginStart(held),
            received = channel.out.conn.recv() => match received? {
                Some(data) => match decode_client(&state.codec, &data) {
                    Some(message) => message,
                    None => continue,
                },
                None => {
                    tracing::info!(%key, "connection closed during login");
                    return Ok(None);
                }
            },
        };

        let verdict = match message {
            ClientMessage::LoginStart(start) => {
                tracing::debug!(%key, name = %start.name, "login start");
                state.machine.on_login_start(channel, start).await?
            }
            ClientMessage::EncryptionResponse {
                shared_secret,
                verify_token,
            } => {
                state
                    .machine
                    .on_encryption_response(channel, &shared_secret, &verify_token)
                    .await?
            }
            ClientMessage::Disconnect { reason } => {
                tracing::info!(%key, %reason, "client left during login");
                return Ok(None);
            }
            _ => {
                tracing::debug!(%key, "ignoring play message before login");
                continue;
            }
        };

        match verdict {
            Verdict::Pass {
                message,
                resolution,
            } => return Ok(Some((message, resolution))),
            Verdict::Held => {}
            Verdict::Abandoned => return Ok(None),
        }
    }
}

/// Gated message loop for a player who has passed the handshake.
async fn play_phase<S, A, C>(
    state: &ServerState<S, A, C>,
    out: &Outbound<'_, C>,
    caller: Caller<'_>,
    mut kicked: Kicked,
) -> Result<(), AuthgateError>
where
    S: CredentialStore,
    A: IdentityAuthority,
    C: Codec,
{
    let identity = caller.identity;
    let mut position = SPAWN;

    if !state.sessions.is_authenticated(&identity) {
        let text = state.messages.render(&state.messages.login_required);
        out.send(ServerMessage::SystemChat { text }).await?;
    }
    send_spawn_area(state, out, &identity).await?;

    loop {
        let received = tokio::select! {
            biased;
            reason = &mut kicked => {
                let reason = reason.unwrap_or(LOGGED_IN_ELSEWHERE);
                tracing::info!(name = %caller.name, %reason, "replaced by a newer login");
                let message = ServerMessage::Disconnect {
                    reason: reason.to_string(),
                };
                if let Err(e) = out.send(message).await {
                    tracing::debug!(name = %caller.name, error = %e, "kick notice not delivered");
                }
                let _ = out.conn.close().await;
                return Ok(());
            }
            received = out.conn.recv() => received,
        };
        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(name = %caller.name, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(name = %caller.name, error = %e, "recv error");
                return Ok(());
            }
        };
        let Some(message) = decode_client(&state.codec, &data) else {
            continue;
        };

        match state.filter.inbound(&identity, &message, position) {
            Gate::Allow => {}
            Gate::Drop => {
                tracing::debug!(name = %caller.name, "message dropped before login");
                continue;
            }
            Gate::Revert { x, y, z } => {
                out.send(ServerMessage::PositionReset { x, y, z }).await?;
                continue;
            }
        }

        match message {
            ClientMessage::Command { line } => {
                let was_authenticated = state.sessions.is_authenticated(&identity);
                let text = match state.commands.dispatch(caller, &line).await {
                    Some(reply) => reply,
                    None => state.messages.render(&state.messages.unknown_command),
                };
                out.send(ServerMessage::SystemChat { text }).await?;
                if !was_authenticated && state.sessions.is_authenticated(&identity) {
                    send_spawn_area(state, out, &identity).await?;
                }
            }
            ClientMessage::Chat { text } => {
                out.send(ServerMessage::Chat {
                    from: caller.name.to_string(),
                    text,
                })
                .await?;
            }
            ClientMessage::Move { x, y, z, .. } => {
                position = (x, y, z);
                out.send(ServerMessage::PositionAck { x, y, z }).await?;
            }
            ClientMessage::Disconnect { reason } => {
                tracing::info!(name = %caller.name, %reason, "client disconnected");
                return Ok(());
            }
            ClientMessage::LoginStart(_) | ClientMessage::EncryptionResponse { .. } => {}
        }
    }
}

/// Streams the spawn area to `identity`, if the filter lets it through.
async fn send_spawn_area<S, A, C: Codec>(
    state: &ServerState<S, A, C>,
    out: &Outbound<'_, C>,
    identity: &PlayerId,
) -> Result<(), AuthgateError> {
    for (x, z) in SPAWN_CHUNKS {
        for message in [
            ServerMessage::ChunkData {
                x,
                z,
                data: Vec::new(),
            },
            ServerMessage::LightUpdate {
                x,
                z,
                data: Vec::new(),
            },
        ] {
            if state.filter.outbound(identity, &message) {
                out.send(message).await?;
            }
        }
    }
    Ok(())
}

/// Decodes an inbound frame, skipping anything that isn't a client message.
fn decode_client(codec: &impl Codec, data: &[u8]) -> Option<ClientMessage> {
    match codec.decode::<Envelope>(data) {
        Ok(Envelope {
            payload: Payload::Client(message),
            ..
        }) => Some(message),
        Ok(_) => {
            tracing::debug!("ignoring server-direction envelope from client");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to decode envelope");
            None
        }
    }
}
