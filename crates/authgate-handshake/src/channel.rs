//! What the handshake needs from the connection it is intercepting.

use std::net::SocketAddr;

use authgate_protocol::LoginStart;

use crate::HandshakeError;

/// One client connection, seen from the handshake.
///
/// The server implements this over its transport connection. Tests
/// implement it with a recorder.
pub trait LoginChannel: Send + Sync {
    /// Remote endpoint; keys this connection's pending state.
    fn connection_key(&self) -> SocketAddr;

    /// Sends the verified-path challenge.
    fn send_challenge(
        &self,
        server_id: &str,
        public_key: &[u8],
        verify_token: &[u8],
    ) -> impl std::future::Future<Output = Result<(), HandshakeError>> + Send;

    /// Feeds `message` back into this connection's inbound stream, as if
    /// the client had sent it again.
    fn reinject(
        &self,
        message: LoginStart,
    ) -> impl std::future::Future<Output = Result<(), HandshakeError>> + Send;

    /// Tells the client why it is being dropped and closes the connection.
    fn disconnect(
        &self,
        reason: &str,
    ) -> impl std::future::Future<Output = ()> + Send;
}
