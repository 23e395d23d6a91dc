//! Password to key derivation
//!
//! The key is the SHA-256 digest of the UTF-8 password bytes. There is no salt
//! and no stretching, so the same password always yields the same key. The full
//! 32-byte digest keys AES-256.

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of derived key material in bytes
pub const KEY_LEN: usize = 32;

/// Symmetric key material derived from a vault password.
///
/// Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// Derive key material from a password
pub fn derive_key(password: &str) -> VaultKey {
    let digest = Sha256::digest(password.as_bytes());
    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&digest);
    VaultKey::from_bytes(bytes)
}

/// Check whether `password` derives `reference`
pub fn keys_match(password: &str, reference: &VaultKey) -> bool {
    derive_key(password) == *reference
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_is_deterministic() {
        assert_eq!(derive_key("hunter2"), derive_key("hunter2"));
        assert_ne!(derive_key("hunter2"), derive_key("hunter3"));
    }

    #[test]
    fn test_derive_key_is_sha256() {
        // SHA-256("abc")
        let key = derive_key("abc");
        assert_eq!(key.as_bytes()[..4], [0xba, 0x78, 0x16, 0xbf]);
        assert_eq!(key.as_bytes()[28..], [0xf2, 0x00, 0x15, 0xad]);
    }

    #[test]
    fn test_empty_password_is_allowed() {
        let key = derive_key("");
        assert!(keys_match("", &key));
        assert!(!keys_match(" ", &key));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = derive_key("secret");
        assert_eq!(format!("{:?}", key), "VaultKey(..)");
    }
}
