//! Wire protocol for Authgate.
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`],
//!   [`LoginStart`], [`PlayerId`]): what travels on the wire.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how it becomes bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Handshake / Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Envelope, LoginStart, Payload, PlayerId, ProfileProperty,
    ServerMessage,
};
