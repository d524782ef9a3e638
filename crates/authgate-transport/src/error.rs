//! Error types for the transport layer.

#[cfg(feature = "websocket")]
use std::net::SocketAddr;

#[cfg(feature = "websocket")]
use tokio_tungstenite::tungstenite;

/// Errors that can occur while moving bytes to and from a peer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The peer connected but the WebSocket upgrade failed.
    #[cfg(feature = "websocket")]
    #[error("websocket upgrade from {peer} failed: {source}")]
    Upgrade {
        peer: SocketAddr,
        #[source]
        source: tungstenite::Error,
    },

    /// The peer connected but never finished the upgrade.
    #[cfg(feature = "websocket")]
    #[error("websocket upgrade from {peer} timed out")]
    UpgradeTimeout { peer: SocketAddr },

    /// Sending (or closing) failed.
    #[cfg(feature = "websocket")]
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    /// Receiving failed.
    #[cfg(feature = "websocket")]
    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),
}
