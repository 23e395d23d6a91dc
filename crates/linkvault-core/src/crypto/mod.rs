//! Password-derived encryption
//!
//! This module provides:
//! - SHA-256 password to key derivation
//! - AES-256-CBC/PKCS#7 sealing with a random IV prefix

pub mod cipher;
pub mod error;
pub mod key;

pub use cipher::{open, seal, IV_LEN};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, keys_match, VaultKey, KEY_LEN};
