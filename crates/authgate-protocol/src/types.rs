//! Wire types for the Authgate login protocol.
//!
//! Everything in this module travels on the wire: it is serialized by a
//! [`Codec`](crate::Codec), sent over a connection, and decoded on the
//! other side. The login handshake holds, rewrites and re-injects
//! [`LoginStart`] messages, so that type is deliberately a plain value
//! that can be cloned and edited freely.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, unique player identity.
///
/// Newtype over a UUID so an identity can't be confused with any other
/// UUID flying around (request ids, record keys). Serialized as the bare
/// hyphenated UUID string.
///
/// A player gets one of two kinds of identity:
/// - a *verified* id handed out by the remote identity authority, or
/// - an *offline* id derived locally from the display name
///   ([`PlayerId::offline`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Derives the local identity for a name that was not remotely verified.
    ///
    /// Deterministic: the same name always maps to the same id, so a
    /// locally registered account keeps its identity across reconnects.
    pub fn offline(name: &str) -> Self {
        let seed = format!("OfflinePlayer:{name}");
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A signed attribute attached to a verified profile (skin, cape, ...).
///
/// The authority signs `value`; the server passes the property through
/// untouched so clients can verify it themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

// ---------------------------------------------------------------------------
// LoginStart
// ---------------------------------------------------------------------------

/// The first message a client sends: "I am `name`".
///
/// `profile_id` and `properties` are what the handshake rewrites once the
/// remote authority has confirmed the identity. Whatever a client puts in
/// them itself is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStart {
    /// The claimed display name.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<PlayerId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ProfileProperty>,
}

impl LoginStart {
    /// Creates a login-start message carrying only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile_id: None,
            properties: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Messages sent from client to server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///   `{ "type": "Chat", "text": "hi" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    // -- Login phase --

    /// "Let me in as this name."
    LoginStart(LoginStart),

    /// Answer to [`ServerMessage::EncryptionRequest`]. Both fields are
    /// encrypted with the server's public key.
    EncryptionResponse {
        shared_secret: Vec<u8>,
        verify_token: Vec<u8>,
    },

    // -- Play phase --

    Chat { text: String },

    /// A slash command, including the leading `/`.
    Command { line: String },

    /// Absolute position and look direction.
    Move {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
    },

    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    // -- Login phase --

    /// The verified-path challenge.
    ///
    /// `public_key` is the DER-encoded SubjectPublicKeyInfo; the client
    /// encrypts its shared secret and the echoed `verify_token` with it.
    EncryptionRequest {
        server_id: String,
        public_key: Vec<u8>,
        verify_token: Vec<u8>,
    },

    /// Login completed; the player now plays as `profile_id`.
    LoginSuccess {
        profile_id: PlayerId,
        name: String,
        #[serde(default)]
        properties: Vec<ProfileProperty>,
    },

    /// The server is closing the connection. `reason` is user visible.
    Disconnect { reason: String },

    // -- Play phase --

    /// Server-originated text (command replies, notices).
    SystemChat { text: String },

    /// Chat relayed from a player.
    Chat { from: String, text: String },

    PositionAck { x: f64, y: f64, z: f64 },

    /// Snap the client back to this position (movement refused).
    PositionReset { x: f64, y: f64, z: f64 },

    /// World data. Withheld from players who haven't logged in.
    ChunkData { x: i32, z: i32, data: Vec<u8> },

    LightUpdate { x: i32, z: i32, data: Vec<u8> },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope, tagged by direction.
///
/// `#[serde(tag = "type", content = "data")]` produces adjacently tagged
/// JSON: `{ "type": "Client", "data": { "type": "Chat", ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Client(ClientMessage),
    Server(ServerMessage),
}

/// The top-level message wrapper. Every message on the wire is an Envelope.
///
/// ```text
/// ┌──────────────────────────────────┐
/// │ seq: 3                           │  ← per-connection ordering
/// │ timestamp: 1520                  │  ← ms since connection start
/// │ ┌──────────────────────────────┐ │
/// │ │ payload: Client(LoginStart)  │ │
/// │ └──────────────────────────────┘ │
/// └──────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: Payload,
}

impl Envelope {
    /// Wraps a client message.
    pub fn client(seq: u64, timestamp: u64, msg: ClientMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::Client(msg),
        }
    }

    /// Wraps a server message.
    pub fn server(seq: u64, timestamp: u64, msg: ServerMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::Server(msg),
        }
    }
}
