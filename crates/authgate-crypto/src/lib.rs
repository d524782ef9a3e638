//! Crypto engine for the Authgate login handshake.
//!
//! - [`ServerKeyPair`]: the process-wide RSA key pair; decrypts what the
//!   client sends back during the verified path.
//! - [`new_challenge_token`]: random per-connection challenge.
//! - [`session_hash`]: the digest presented to the identity authority.
//!
//! Nothing here blocks on I/O; every operation costs at most one RSA
//! private-key operation.

mod error;
mod hash;
mod keys;

pub use error::CryptoError;
pub use hash::{hex_digest, session_hash};
pub use keys::{
    KEY_BITS, SECRET_LEN, ServerKeyPair, SharedSecret, TOKEN_LEN,
    encrypt_for_server, new_challenge_token,
};
