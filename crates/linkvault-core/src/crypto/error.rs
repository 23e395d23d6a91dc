//! Cryptography error types

use thiserror::Error;

/// Errors raised while encrypting or decrypting vault data.
///
/// Decryption deliberately collapses every failure (bad base64, truncated
/// blob, bad padding, unparseable plaintext) into [`CryptoError::Undecryptable`]
/// so callers cannot tell a wrong password from a damaged file.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Unable to decrypt data: wrong password or corrupted file")]
    Undecryptable,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for cryptography operations
pub type CryptoResult<T> = Result<T, CryptoError>;
