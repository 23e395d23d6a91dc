//! Storage layer
//!
//! Handles encrypted persistence of the vault document and thumbnail cache
//! entries.
//!
//! ## Format
//!
//! Every encrypted file is `IV (16 bytes) || AES-CBC ciphertext`. The vault
//! document is UTF-8 JSON wrapped in base64 text; cache entries are raw bytes.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{atomic_write, read_plain_json, write_plain_json, EncryptedFile};
