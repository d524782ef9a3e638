//! The server key pair and the values it protects.
//!
//! One [`ServerKeyPair`] is generated when the server starts and shared
//! read-only by every connection for the life of the process. It holds no
//! external resource, so there is nothing to tear down.

use std::fmt;

use rand::Rng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::CryptoError;

/// RSA modulus size for the server key pair.
pub const KEY_BITS: usize = 1024;

/// Length of a challenge (verify) token in bytes.
pub const TOKEN_LEN: usize = 4;

/// Length of the client's shared secret (an AES-128 key) in bytes.
pub const SECRET_LEN: usize = 16;

/// A fresh random challenge token.
///
/// Drawn from the thread-local CSPRNG, so every connection gets an
/// unpredictable value without any shared state.
pub fn new_challenge_token() -> [u8; TOKEN_LEN] {
    rand::rng().random()
}

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// The symmetric key a client proposes during the handshake.
///
/// `Debug` is redacted; the bytes only leave through [`as_bytes`](Self::as_bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SECRET_LEN]);

impl SharedSecret {
    /// Wraps raw key bytes, checking the length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; SECRET_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidSecretLength {
                    expected: SECRET_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

// ---------------------------------------------------------------------------
// ServerKeyPair
// ---------------------------------------------------------------------------

/// The server's RSA key pair plus its cached DER public key.
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    /// Generates a new [`KEY_BITS`]-bit key pair.
    ///
    /// Takes a noticeable fraction of a second; call once at startup.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(CryptoError::KeyGeneration)?;
        let public_der = private
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();

        tracing::info!(bits = KEY_BITS, "server key pair generated");
        Ok(Self {
            private,
            public_der,
        })
    }

    /// The public key as a DER-encoded SubjectPublicKeyInfo.
    ///
    /// This exact encoding is what goes into the challenge and into the
    /// session hash, so both sides must see the same bytes.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Decrypts the client's encrypted shared secret.
    ///
    /// # Errors
    /// [`CryptoError::Decryption`] for malformed ciphertext,
    /// [`CryptoError::InvalidSecretLength`] if it decrypts to the wrong size.
    pub fn decrypt_secret(
        &self,
        ciphertext: &[u8],
    ) -> Result<SharedSecret, CryptoError> {
        SharedSecret::from_bytes(&self.decrypt(ciphertext)?)
    }

    /// Decrypts the token the client echoes back.
    pub fn decrypt_token(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(CryptoError::Decryption)
    }
}

impl fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public_der_len", &self.public_der.len())
            .finish_non_exhaustive()
    }
}

/// Client side of the exchange: encrypts `plaintext` for the server key
/// advertised in a challenge.
///
/// The server never calls this. It exists for clients, bots and tests that
/// need to answer a challenge.
pub fn encrypt_for_server(
    public_key_der: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let public = RsaPublicKey::from_public_key_der(public_key_der)
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    public
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(CryptoError::Encryption)
}
