//! Error types for the crypto engine.

/// Errors produced by key handling and decryption.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Generating the server key pair failed. Only happens at startup.
    #[error("key generation failed: {0}")]
    KeyGeneration(#[source] rsa::Error),

    /// A public key could not be encoded to or decoded from DER.
    #[error("public key encoding failed: {0}")]
    KeyEncoding(String),

    /// Ciphertext was malformed or not encrypted for our key.
    #[error("decryption failed: {0}")]
    Decryption(#[source] rsa::Error),

    /// The decrypted shared secret has the wrong size.
    #[error("shared secret must be {expected} bytes, got {actual}")]
    InvalidSecretLength { expected: usize, actual: usize },

    /// Client-side encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(#[source] rsa::Error),
}
