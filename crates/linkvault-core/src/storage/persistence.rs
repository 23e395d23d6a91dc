//! Encrypted file persistence
//!
//! Reads and writes single values as encrypted files. Uses atomic writes
//! (write to temp file, then rename) to prevent corruption.
//!
//! Two payload flavours share the same `IV || ciphertext` envelope:
//! - JSON values (the vault document), stored base64-encoded as text
//! - raw bytes (thumbnail cache entries), stored as-is

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{StorageError, StorageResult};
use crate::crypto::{self, CryptoError, VaultKey};

/// One encrypted file on disk
#[derive(Debug, Clone)]
pub struct EncryptedFile {
    path: PathBuf,
}

impl EncryptedFile {
    /// Create a handle for the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Serialize `value` to JSON, encrypt it and write it as base64 text
    pub fn write_json<T: Serialize>(&self, value: &T, key: &VaultKey) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(value).map_err(CryptoError::from)?;
        let sealed = crypto::seal(&json, key)?;
        atomic_write(&self.path, BASE64.encode(sealed).as_bytes())
    }

    /// Read, decrypt and deserialize a JSON value written by [`write_json`](Self::write_json)
    ///
    /// Every failure past reading the file is reported as
    /// [`CryptoError::Undecryptable`].
    pub fn read_json<T: DeserializeOwned>(&self, key: &VaultKey) -> StorageResult<T> {
        let raw =
            fs::read(&self.path).map_err(|e| StorageError::from_read_io(e, self.path.clone()))?;
        let text = std::str::from_utf8(&raw).map_err(|_| CryptoError::Undecryptable)?;
        let sealed = BASE64
            .decode(text.trim())
            .map_err(|_| CryptoError::Undecryptable)?;
        let json = crypto::open(&sealed, key)?;
        let value = serde_json::from_slice(&json).map_err(|_| CryptoError::Undecryptable)?;
        Ok(value)
    }

    /// Encrypt raw bytes and write them
    pub fn write_bytes(&self, bytes: &[u8], key: &VaultKey) -> StorageResult<()> {
        let sealed = crypto::seal(bytes, key)?;
        atomic_write(&self.path, &sealed)
    }

    /// Read and decrypt raw bytes written by [`write_bytes`](Self::write_bytes)
    pub fn read_bytes(&self, key: &VaultKey) -> StorageResult<Vec<u8>> {
        let sealed =
            fs::read(&self.path).map_err(|e| StorageError::from_read_io(e, self.path.clone()))?;
        Ok(crypto::open(&sealed, key)?)
    }

    /// Delete the file if present
    ///
    /// Returns whether a file was removed.
    pub fn delete(&self) -> StorageResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| StorageError::from_io(e, self.path.clone()))?;
        Ok(true)
    }
}

/// Write `value` as pretty JSON in the clear, refusing to overwrite
pub fn write_plain_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if path.exists() {
        return Err(StorageError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    let json = serde_json::to_vec_pretty(value).map_err(CryptoError::from)?;
    atomic_write(path, &json)
}

/// Read a plain JSON file
pub fn read_plain_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let text =
        fs::read_to_string(path).map_err(|e| StorageError::from_read_io(e, path.to_path_buf()))?;
    serde_json::from_str(&text).map_err(|e| StorageError::InvalidFormat {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    // Same directory as the target so the rename stays on one filesystem
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<u32>,
    }

    fn sample() -> Sample {
        Sample {
            name: "links".to_string(),
            values: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_json_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("doc.linkvault"));
        let key = derive_key("pw");

        assert!(!file.exists());
        file.write_json(&sample(), &key).unwrap();
        assert!(file.exists());

        let loaded: Sample = file.read_json(&key).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_json_is_stored_as_base64_text() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("doc.linkvault"));
        file.write_json(&sample(), &derive_key("pw")).unwrap();

        let text = fs::read_to_string(file.path()).unwrap();
        assert!(!text.contains("links"));
        let raw = BASE64.decode(text).unwrap();
        assert!(raw.len() >= crypto::IV_LEN + 16);
        assert_eq!((raw.len() - crypto::IV_LEN) % 16, 0);
    }

    #[test]
    fn test_wrong_key_and_corruption_look_the_same() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("doc.linkvault"));
        file.write_json(&sample(), &derive_key("right")).unwrap();

        let wrong_key = file.read_json::<Sample>(&derive_key("wrong")).unwrap_err();
        assert!(matches!(
            wrong_key,
            StorageError::Crypto(CryptoError::Undecryptable)
        ));

        fs::write(file.path(), "not base64 at all!").unwrap();
        let corrupt = file.read_json::<Sample>(&derive_key("right")).unwrap_err();
        assert_eq!(wrong_key.to_string(), corrupt.to_string());
    }

    #[test]
    fn test_binary_garbage_looks_like_wrong_key() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("doc.linkvault"));
        file.write_json(&sample(), &derive_key("right")).unwrap();
        let wrong_key = file.read_json::<Sample>(&derive_key("wrong")).unwrap_err();

        fs::write(file.path(), [0xff, 0xfe, 0x00, 0x80, 0x81]).unwrap();
        let corrupt = file.read_json::<Sample>(&derive_key("right")).unwrap_err();
        assert!(matches!(corrupt, StorageError::Crypto(CryptoError::Undecryptable)));
        assert_eq!(wrong_key.to_string(), corrupt.to_string());
    }

    #[test]
    fn test_valid_ciphertext_with_wrong_shape_is_undecryptable() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("doc.linkvault"));
        let key = derive_key("pw");
        file.write_json(&vec!["just", "strings"], &key).unwrap();

        let err = file.read_json::<Sample>(&key).unwrap_err();
        assert!(matches!(err, StorageError::Crypto(CryptoError::Undecryptable)));
    }

    #[test]
    fn test_bytes_round_trip_is_raw() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("cache").join("ABCDEF"));
        let key = derive_key("pw");

        file.write_bytes(&[0xff, 0xd8, 0xff, 0x00], &key).unwrap();
        let on_disk = fs::read(file.path()).unwrap();
        assert_eq!(on_disk.len(), crypto::IV_LEN + 16);
        assert_eq!(file.read_bytes(&key).unwrap(), vec![0xff, 0xd8, 0xff, 0x00]);
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("missing"));
        let err = file.read_bytes(&derive_key("pw")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let file = EncryptedFile::new(temp_dir.path().join("entry"));
        assert!(!file.delete().unwrap());

        file.write_bytes(b"x", &derive_key("pw")).unwrap();
        assert!(file.delete().unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn test_plain_json_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("export.json");

        write_plain_json(&path, &sample()).unwrap();
        let loaded: Sample = read_plain_json(&path).unwrap();
        assert_eq!(loaded, sample());

        let err = write_plain_json(&path, &sample()).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[test]
    fn test_read_plain_json_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ nope").unwrap();

        let err = read_plain_json::<Sample>(&path).unwrap_err();
        assert!(matches!(err, StorageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir
            .path()
            .join("a")
            .join("b")
            .join("c")
            .join("file.txt");

        atomic_write(&nested_path, b"test data").unwrap();

        assert!(nested_path.exists());
        let content = fs::read_to_string(&nested_path).unwrap();
        assert_eq!(content, "test data");
        assert!(!nested_path.with_file_name("file.txt.tmp").exists());
    }
}
