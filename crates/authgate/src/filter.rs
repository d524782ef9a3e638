//! What a connected but not yet logged-in player may do.
//!
//! A player who came in on the local path is connected before they have
//! proven anything. Until `/login` or `/register` creates their session,
//! the filter keeps them frozen: no chat, no commands besides the two
//! login commands, no walking, and no world data.

use std::sync::Arc;

use authgate_protocol::{ClientMessage, PlayerId, ServerMessage};
use authgate_session::SessionRegistry;

/// Commands an unauthenticated player may run.
const OPEN_COMMANDS: [&str; 2] = ["/login", "/register"];

/// Decision for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    Allow,
    Drop,
    /// Refuse the move and snap the player back here.
    Revert { x: f64, y: f64, z: f64 },
}

/// Gates play-phase traffic on the session registry.
#[derive(Debug, Clone)]
pub struct AccessFilter {
    sessions: Arc<SessionRegistry>,
}

impl AccessFilter {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Decides what to do with `message` from `player`.
    ///
    /// `last_pos` is the last position the server accepted for this
    /// player; a refused move is reverted to it.
    pub fn inbound(
        &self,
        player: &PlayerId,
        message: &ClientMessage,
        last_pos: (f64, f64, f64),
    ) -> Gate {
        // Login traffic is over once play starts, logged in or not.
        if matches!(
            message,
            ClientMessage::LoginStart(_) | ClientMessage::EncryptionResponse { .. }
        ) {
            return Gate::Drop;
        }
        if self.sessions.is_authenticated(player) {
            return Gate::Allow;
        }

        match message {
            ClientMessage::Chat { .. } => Gate::Drop,
            ClientMessage::Command { line } => {
                if is_open_command(line) {
                    Gate::Allow
                } else {
                    Gate::Drop
                }
            }
            ClientMessage::Move { x, y, z, .. } => {
                let (lx, ly, lz) = last_pos;
                if *x == lx && *y == ly && *z == lz {
                    Gate::Allow
                } else {
                    Gate::Revert { x: lx, y: ly, z: lz }
                }
            }
            ClientMessage::Disconnect { .. } => Gate::Allow,
            ClientMessage::LoginStart(_) | ClientMessage::EncryptionResponse { .. } => {
                Gate::Drop
            }
        }
    }

    /// `false` if `message` must not reach `player` yet.
    pub fn outbound(&self, player: &PlayerId, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::ChunkData { .. } | ServerMessage::LightUpdate { .. } => {
                self.sessions.is_authenticated(player)
            }
            _ => true,
        }
    }
}

fn is_open_command(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|head| OPEN_COMMANDS.iter().any(|c| head.eq_ignore_ascii_case(c)))
}
