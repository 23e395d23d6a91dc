//! Encrypted thumbnail cache
//!
//! Thumbnails are stored one file per source URL under the vault's cache
//! directory. File names are the upper-case hex MD5 of the content key (the
//! thumbnail URL), so the same URL always lands on the same file. Collisions
//! are not detected; the last write wins.
//!
//! Decoded images are additionally kept in memory for the lifetime of the
//! session. The disk entry and the memory entry have independent lifetimes:
//! the file survives restarts, the decoded image does not.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::VaultKey;
use crate::fetch::{FetchError, ImageFetcher};
use crate::filter::ArtifactLookup;
use crate::models::Link;
use crate::storage::{EncryptedFile, StorageError};

/// Errors from cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Downloaded content from '{url}' is not a supported image: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Could not list cache directory '{path}': {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some entries kept the old key
    #[error("Re-keyed {} cache entries but {} failed; run the password change again", .report.rekeyed, .report.failed.len())]
    PartialRekey { report: RekeyReport },
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// A thumbnail decoded into pixels
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        Ok(Self {
            image: image::load_from_memory(bytes)?,
        })
    }

    /// Pixel dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// The decoded image
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Outcome of re-encrypting the cache under a new key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RekeyReport {
    /// Entries now encrypted with the new key
    pub rekeyed: usize,
    /// Entries still under the old key (or unreadable)
    pub failed: Vec<PathBuf>,
}

impl RekeyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Cache directory for a vault file: `<vault dir>/Cache/<vault file stem>`
pub fn cache_dir_for(vault_path: &Path) -> PathBuf {
    let parent = vault_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = vault_path.file_stem().unwrap_or_default();
    parent.join("Cache").join(stem)
}

/// Content-addressed, encrypted-at-rest thumbnail store
pub struct ImageCache {
    directory: PathBuf,
    key: VaultKey,
    decoded: HashMap<PathBuf, Arc<DecodedImage>>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ImageCache {
    /// Create a cache rooted at `directory`
    ///
    /// The directory is created lazily on the first write.
    pub fn new(directory: impl Into<PathBuf>, key: VaultKey, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            directory: directory.into(),
            key,
            decoded: HashMap::new(),
            fetcher,
        }
    }

    /// Cache directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the on-disk entry for `content_key`
    pub fn entry_path(&self, content_key: &str) -> PathBuf {
        self.directory
            .join(format!("{:X}", md5::compute(content_key.as_bytes())))
    }

    /// Check whether an encrypted entry exists on disk
    pub fn contains(&self, content_key: &str) -> bool {
        self.entry_path(content_key).is_file()
    }

    /// Number of decoded images held in memory
    pub fn memory_len(&self) -> usize {
        self.decoded.len()
    }

    /// Get the image for `content_key`, downloading it from `source_url` if
    /// neither memory nor disk has a usable copy
    pub fn add(&mut self, content_key: &str, source_url: &str) -> CacheResult<Arc<DecodedImage>> {
        let path = self.entry_path(content_key);

        if let Some(image) = self.decoded.get(&path) {
            debug!(key = %content_key, "Thumbnail served from memory");
            return Ok(Arc::clone(image));
        }

        let file = EncryptedFile::new(&path);
        if file.exists() {
            match self.load_entry(&file) {
                Some(image) => {
                    debug!(key = %content_key, "Thumbnail loaded from disk");
                    let image = Arc::new(image);
                    self.decoded.insert(path, Arc::clone(&image));
                    return Ok(image);
                }
                None => warn!(path = %path.display(), "Unusable cache entry, fetching again"),
            }
        }

        debug!(url = %source_url, "Thumbnail cache miss");
        let bytes = self.fetcher.fetch(source_url)?;
        let image = DecodedImage::decode(&bytes).map_err(|source| CacheError::Decode {
            url: source_url.to_string(),
            source,
        })?;
        file.write_bytes(&bytes, &self.key)?;

        let image = Arc::new(image);
        self.decoded.insert(path, Arc::clone(&image));
        Ok(image)
    }

    fn load_entry(&self, file: &EncryptedFile) -> Option<DecodedImage> {
        let bytes = file.read_bytes(&self.key).ok()?;
        DecodedImage::decode(&bytes).ok()
    }

    /// Delete the entry for `content_key` from disk and memory
    ///
    /// Returns whether a file was deleted.
    pub fn remove(&mut self, content_key: &str) -> CacheResult<bool> {
        let path = self.entry_path(content_key);
        self.decoded.remove(&path);
        let removed = EncryptedFile::new(&path).delete()?;
        if removed {
            debug!(key = %content_key, "Thumbnail evicted");
        }
        Ok(removed)
    }

    /// Re-encrypt every entry on disk with `new_key`
    ///
    /// Entries are processed one at a time. The cache switches to `new_key`
    /// even when some entries fail, since new entries must match the
    /// document key; failed entries are listed in the error. A directory
    /// that cannot be listed is reported as a failed entry itself.
    pub fn change_key(&mut self, new_key: VaultKey) -> CacheResult<RekeyReport> {
        let mut report = RekeyReport::default();

        let files = match self.entry_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Failed to list cache entries for re-keying");
                report.failed.push(self.directory.clone());
                Vec::new()
            }
        };

        for path in files {
            let file = EncryptedFile::new(&path);
            let result = file
                .read_bytes(&self.key)
                .and_then(|bytes| file.write_bytes(&bytes, &new_key));
            match result {
                Ok(()) => report.rekeyed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to re-key cache entry");
                    report.failed.push(path);
                }
            }
        }

        self.key = new_key;
        info!(
            rekeyed = report.rekeyed,
            failed = report.failed.len(),
            "Thumbnail cache re-keyed"
        );

        if report.is_complete() {
            Ok(report)
        } else {
            Err(CacheError::PartialRekey { report })
        }
    }

    /// Encrypted entry files currently on disk
    fn entry_files(&self) -> CacheResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::ListDirectory {
                    path: self.directory.clone(),
                    source,
                })
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::ListDirectory {
                path: self.directory.clone(),
                source,
            })?;
            let path = entry.path();
            // leftovers from interrupted atomic writes
            if path.extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Drop every decoded image; disk entries stay
    pub fn clear_memory(&mut self) {
        self.decoded.clear();
    }
}

impl ArtifactLookup for ImageCache {
    fn has_artifact(&self, link: &Link) -> bool {
        link.thumbnail_url
            .as_deref()
            .is_some_and(|url| self.contains(url))
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("directory", &self.directory)
            .field("decoded", &self.decoded.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::derive_key;
    use crate::fetch::FetchResult;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// PNG bytes of a tiny solid image
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 10, 10]),
        ));
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    /// Serves the same bytes for every URL and counts requests
    pub(crate) struct StubFetcher {
        bytes: Vec<u8>,
        pub(crate) calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn png() -> Arc<Self> {
            Arc::new(Self {
                bytes: png_bytes(4, 3),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn with_bytes(bytes: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                bytes,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ImageFetcher for StubFetcher {
        fn fetch(&self, _url: &str) -> FetchResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    struct Offline;

    impl ImageFetcher for Offline {
        fn fetch(&self, url: &str) -> FetchResult<Vec<u8>> {
            Err(FetchError::Other {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    const THUMB: &str = "https://x.test/thumb.png";

    fn cache_with(dir: &TempDir, password: &str, fetcher: Arc<dyn ImageFetcher>) -> ImageCache {
        ImageCache::new(dir.path().join("Cache"), derive_key(password), fetcher)
    }

    #[test]
    fn test_entry_path_is_uppercase_md5() {
        let temp_dir = TempDir::new().unwrap();
        let cache = cache_with(&temp_dir, "pw", StubFetcher::png());
        let path = cache.entry_path("abc");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "900150983CD24FB0D6963F7D28E17F72"
        );
    }

    #[test]
    fn test_cache_dir_for_vault() {
        assert_eq!(
            cache_dir_for(Path::new("/data/links.linkvault")),
            PathBuf::from("/data/Cache/links")
        );
    }

    #[test]
    fn test_add_fetches_once_then_uses_memory() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StubFetcher::png();
        let mut cache = cache_with(&temp_dir, "pw", fetcher.clone());

        let image = cache.add(THUMB, THUMB).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert!(cache.contains(THUMB));

        cache.add(THUMB, THUMB).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.memory_len(), 1);
    }

    #[test]
    fn test_disk_entry_used_by_new_cache() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StubFetcher::png();
        cache_with(&temp_dir, "pw", fetcher.clone())
            .add(THUMB, THUMB)
            .unwrap();

        let mut fresh = cache_with(&temp_dir, "pw", fetcher.clone());
        fresh.add(THUMB, THUMB).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_entry_is_encrypted_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "pw", StubFetcher::png());
        cache.add(THUMB, THUMB).unwrap();

        let on_disk = fs::read(cache.entry_path(THUMB)).unwrap();
        assert!(!on_disk.windows(4).any(|w| w == b"\x89PNG"));
    }

    #[test]
    fn test_undecryptable_entry_is_fetched_again() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StubFetcher::png();
        cache_with(&temp_dir, "old", fetcher.clone())
            .add(THUMB, THUMB)
            .unwrap();

        let mut other_key = cache_with(&temp_dir, "new", fetcher.clone());
        other_key.add(THUMB, THUMB).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "pw", Arc::new(Offline));

        let err = cache.add(THUMB, THUMB).unwrap_err();
        assert!(matches!(err, CacheError::Fetch(_)));
        assert!(!cache.contains(THUMB));
    }

    #[test]
    fn test_non_image_download_is_not_stored() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(
            &temp_dir,
            "pw",
            StubFetcher::with_bytes(b"<html>nope</html>".to_vec()),
        );

        let err = cache.add(THUMB, THUMB).unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
        assert!(!cache.contains(THUMB));
    }

    #[test]
    fn test_remove_evicts_disk_and_memory() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StubFetcher::png();
        let mut cache = cache_with(&temp_dir, "pw", fetcher.clone());
        cache.add(THUMB, THUMB).unwrap();

        assert!(cache.remove(THUMB).unwrap());
        assert!(!cache.contains(THUMB));
        assert_eq!(cache.memory_len(), 0);
        assert!(!cache.remove(THUMB).unwrap());

        // memory entry is gone too, so this has to download again
        cache.add(THUMB, THUMB).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_change_key_rekeys_every_disk_entry() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "old", StubFetcher::png());
        cache.add("https://x.test/1.png", "https://x.test/1.png").unwrap();
        cache.add("https://x.test/2.png", "https://x.test/2.png").unwrap();
        cache.clear_memory();

        let report = cache.change_key(derive_key("new")).unwrap();
        assert_eq!(report.rekeyed, 2);
        assert!(report.is_complete());

        for url in ["https://x.test/1.png", "https://x.test/2.png"] {
            let file = EncryptedFile::new(cache.entry_path(url));
            assert!(file.read_bytes(&derive_key("new")).is_ok());
            assert!(file.read_bytes(&derive_key("old")).is_err());
        }
    }

    #[test]
    fn test_change_key_reports_failed_entries() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "old", StubFetcher::png());
        cache.add(THUMB, THUMB).unwrap();
        fs::write(cache.directory().join("STRAY"), b"garbage").unwrap();

        let err = cache.change_key(derive_key("new")).unwrap_err();
        match err {
            CacheError::PartialRekey { report } => {
                assert_eq!(report.rekeyed, 1);
                assert_eq!(report.failed, vec![cache.directory().join("STRAY")]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // the cache moved to the new key regardless
        let file = EncryptedFile::new(cache.entry_path(THUMB));
        assert!(file.read_bytes(&derive_key("new")).is_ok());
    }

    #[test]
    fn test_change_key_switches_key_when_directory_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "old", StubFetcher::png());
        fs::create_dir_all(cache.directory().parent().unwrap()).unwrap();
        fs::write(cache.directory(), b"not a directory").unwrap();

        let err = cache.change_key(derive_key("new")).unwrap_err();
        match err {
            CacheError::PartialRekey { report } => {
                assert_eq!(report.rekeyed, 0);
                assert_eq!(report.failed, vec![cache.directory().to_path_buf()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // entries written afterwards use the new key
        fs::remove_file(cache.directory()).unwrap();
        cache.add(THUMB, THUMB).unwrap();
        let file = EncryptedFile::new(cache.entry_path(THUMB));
        assert!(file.read_bytes(&derive_key("new")).is_ok());
        assert!(file.read_bytes(&derive_key("old")).is_err());
    }

    #[test]
    fn test_change_key_without_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "old", StubFetcher::png());
        let report = cache.change_key(derive_key("new")).unwrap();
        assert_eq!(report, RekeyReport::default());
    }

    #[test]
    fn test_artifact_lookup_uses_thumbnail_url() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = cache_with(&temp_dir, "pw", StubFetcher::png());
        cache.add(THUMB, THUMB).unwrap();

        let with_thumb =
            Link::new("https://x.test").with_thumbnail_url(Some(THUMB.to_string()));
        assert!(cache.has_artifact(&with_thumb));
        assert!(!cache.has_artifact(&Link::new("https://y.test")));
    }
}
