//! The session hash: a digest binding one handshake's secret to the server.
//!
//! The remote authority recomputes this value from what the client tells
//! it, so the byte order and the text rendering are fixed:
//!
//! ```text
//! SHA-1( latin1(label) || shared_secret || public_key_der )
//! ```
//!
//! rendered as a *signed* big-endian hex number: the 20 digest bytes are
//! read as a two's-complement integer, leading zeros are dropped and a
//! negative value gets a `-` prefix.

use sha1::{Digest, Sha1};

use crate::{ServerKeyPair, SharedSecret};

/// Computes the session hash for a completed key exchange.
pub fn session_hash(
    label: &str,
    public_key_der: &[u8],
    secret: &SharedSecret,
) -> String {
    let label = latin1(label);
    hex_digest(&[&label, secret.as_bytes(), public_key_der])
}

impl ServerKeyPair {
    /// [`session_hash`] against this key pair's public key.
    pub fn session_hash(&self, label: &str, secret: &SharedSecret) -> String {
        session_hash(label, self.public_key_der(), secret)
    }
}

/// SHA-1 over `parts` in order, rendered as a signed hex number.
pub fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&hasher.finalize());
    signed_hex(digest)
}

fn signed_hex(mut digest: [u8; 20]) -> String {
    let negative = digest[0] & 0x80 != 0;
    if negative {
        // Two's-complement negation: invert, then add one.
        let mut carry = true;
        for byte in digest.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (sum, overflow) = byte.overflowing_add(1);
                *byte = sum;
                carry = overflow;
            }
        }
    }

    let hex = hex::encode(digest);
    let magnitude = match hex.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    if negative {
        format!("-{magnitude}")
    } else {
        magnitude.to_string()
    }
}

/// ISO-8859-1 encoding; characters outside it become `?`.
fn latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
