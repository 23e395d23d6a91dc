//! AES-256-CBC with PKCS#7 padding
//!
//! Sealed data is laid out as `IV (16 bytes) || ciphertext`, with a fresh
//! random IV for every call to [`seal`].

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use super::error::{CryptoError, CryptoResult};
use super::key::VaultKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV size in bytes (one AES block)
pub const IV_LEN: usize = 16;

/// Generate a random IV
fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext`, returning `IV || ciphertext`
pub fn seal(plaintext: &[u8], key: &VaultKey) -> CryptoResult<Vec<u8>> {
    let iv = generate_iv();
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut sealed = Vec::with_capacity(IV_LEN + ciphertext.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt `IV || ciphertext` produced by [`seal`]
pub fn open(sealed: &[u8], key: &VaultKey) -> CryptoResult<Vec<u8>> {
    if sealed.len() < IV_LEN * 2 || (sealed.len() - IV_LEN) % IV_LEN != 0 {
        return Err(CryptoError::Undecryptable);
    }

    let (iv, ciphertext) = sealed.split_at(IV_LEN);
    let cipher =
        Aes256CbcDec::new_from_slices(key.as_bytes(), iv).map_err(|_| CryptoError::Undecryptable)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Undecryptable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key::derive_key;

    #[test]
    fn test_seal_and_open() {
        let key = derive_key("password");
        let sealed = seal(b"hello vault", &key).unwrap();
        assert_eq!(open(&sealed, &key).unwrap(), b"hello vault");
    }

    #[test]
    fn test_layout_is_iv_then_padded_blocks() {
        let key = derive_key("password");
        // 16 bytes of plaintext gets a full padding block
        let sealed = seal(&[7u8; 16], &key).unwrap();
        assert_eq!(sealed.len(), IV_LEN + 32);

        let sealed = seal(b"", &key).unwrap();
        assert_eq!(sealed.len(), IV_LEN + 16);
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let key = derive_key("password");
        let a = seal(b"same", &key).unwrap();
        let b = seal(b"same", &key).unwrap();
        assert_ne!(a[..IV_LEN], b[..IV_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_never_yields_plaintext() {
        let sealed = seal(b"{\"links\":[]}", &derive_key("right")).unwrap();
        match open(&sealed, &derive_key("wrong")) {
            Err(CryptoError::Undecryptable) => {}
            // Padding can validate by chance; the bytes are still garbage
            Ok(bytes) => assert_ne!(bytes, b"{\"links\":[]}"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let key = derive_key("password");
        assert!(matches!(open(&[0u8; 10], &key), Err(CryptoError::Undecryptable)));
        assert!(matches!(open(&[0u8; 16], &key), Err(CryptoError::Undecryptable)));
        assert!(matches!(open(&[0u8; 40], &key), Err(CryptoError::Undecryptable)));
    }
}
