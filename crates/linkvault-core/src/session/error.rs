//! Session error types

use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::image_cache::CacheError;
use crate::merge::MergeError;
use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Errors raised by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Crypto(CryptoError),

    #[error("Link already exists: {0}")]
    DuplicateLink(String),

    #[error("No such link: {0}")]
    LinkNotFound(String),

    #[error(transparent)]
    IncompatibleMerge(#[from] MergeError),

    #[error("Wrong password")]
    WrongPassword,

    #[error("No vault is unlocked")]
    Locked,

    #[error("A vault is already unlocked")]
    AlreadyUnlocked,

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to save vault '{0}'")]
    SaveFailed(PathBuf),

    #[error("Export target already exists: '{0}'")]
    ExportTargetExists(PathBuf),
}

impl From<StorageError> for SessionError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Crypto(e) => SessionError::Crypto(e),
            other => SessionError::Storage(other),
        }
    }
}

impl From<CryptoError> for SessionError {
    fn from(error: CryptoError) -> Self {
        SessionError::Crypto(error)
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
