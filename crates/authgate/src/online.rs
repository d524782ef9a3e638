//! Which connection each identity is currently playing on.
//!
//! At most one connection per identity gets past the handshake. A verified
//! login takes over from an older connection for the same identity, since
//! the authority has just vouched for it. A local login has proven nothing
//! yet, so it is refused while the identity is in use.

use authgate_protocol::PlayerId;
use authgate_transport::ConnectionId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;

/// Disconnect reason for a local login whose identity is already playing.
pub const ALREADY_ONLINE: &str = "You are already connected to this server!";

/// Disconnect reason for a connection replaced by a newer verified login.
pub const LOGGED_IN_ELSEWHERE: &str = "You logged in from another location";

/// Resolves with a disconnect reason when a newer login takes the
/// identity over.
pub type Kicked = oneshot::Receiver<&'static str>;

#[derive(Debug)]
struct Occupant {
    conn: ConnectionId,
    kick: oneshot::Sender<&'static str>,
}

/// Process-wide map from identity to the connection playing it.
#[derive(Debug, Default)]
pub struct OnlinePlayers {
    players: DashMap<PlayerId, Occupant>,
}

impl OnlinePlayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `identity` for `conn`.
    ///
    /// An unoccupied identity is always granted. An occupied one is
    /// granted only with `take_over`, in which case the previous
    /// connection's [`Kicked`] fires. Returns `None` when refused.
    pub fn claim(&self, identity: PlayerId, conn: ConnectionId, take_over: bool) -> Option<Kicked> {
        let (kick, kicked) = oneshot::channel();
        let occupant = Occupant { conn, kick };

        match self.players.entry(identity) {
            Entry::Vacant(slot) => {
                slot.insert(occupant);
            }
            Entry::Occupied(mut slot) if take_over => {
                let previous = slot.insert(occupant);
                tracing::info!(%identity, previous = %previous.conn, %conn, "identity taken over");
                let _ = previous.kick.send(LOGGED_IN_ELSEWHERE);
            }
            Entry::Occupied(slot) => {
                tracing::warn!(
                    %identity,
                    current = %slot.get().conn,
                    %conn,
                    "security: identity already online"
                );
                return None;
            }
        }
        Some(kicked)
    }

    /// Gives up `identity` if `conn` still holds it.
    pub fn release(&self, identity: &PlayerId, conn: ConnectionId) -> bool {
        self.players
            .remove_if(identity, |_, o| o.conn == conn)
            .is_some()
    }

    /// The connection currently playing `identity`.
    pub fn connection_of(&self, identity: &PlayerId) -> Option<ConnectionId> {
        self.players.get(identity).map(|o| o.conn)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
