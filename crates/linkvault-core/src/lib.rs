//! linkvault core library
//!
//! A password-protected bookmark vault. The vault document (links, settings,
//! saved filters) is stored AES-encrypted on disk and unlocked into a
//! time-boxed session that locks itself after a period of inactivity.
//!
//! # Quick Start
//!
//! ```text
//! let mut lifecycle = SessionLifecycle::new(Arc::new(SystemClock), Arc::new(HttpFetcher::new()?));
//! lifecycle.start_session(&path, "password")?;
//!
//! let store = lifecycle.store_mut()?;
//! store.add_link(Link::new("https://example.com").with_tags(["rust"]))?;
//! store.save();
//!
//! lifecycle.stop_session();
//! ```
//!
//! # Modules
//!
//! - `crypto`: password to key derivation and AES-CBC sealing
//! - `storage`: encrypted file persistence
//! - `image_cache`: encrypted thumbnail cache
//! - `session`: session store, lifecycle state machine, events, ticking
//! - `filter`: filter pipeline and sorting
//! - `merge`: merging links that share a URL
//! - `models`: links, settings, filters, the vault document
//! - `validation`: document schema rules
//! - `config`: application configuration

pub mod config;
pub mod crypto;
pub mod fetch;
pub mod filter;
pub mod image_cache;
pub mod link_files;
pub mod merge;
pub mod models;
pub mod session;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use crypto::{derive_key, keys_match, CryptoError, VaultKey};
pub use fetch::{FetchError, HttpFetcher, ImageFetcher};
pub use filter::{ArtifactLookup, FilterPipeline};
pub use image_cache::{CacheError, DecodedImage, ImageCache, RekeyReport};
pub use link_files::LinkFileIndex;
pub use merge::{merge_links, MergeError};
pub use models::{Availability, Filters, Link, OrderBy, RatingSelector, Settings, VaultDocument};
pub use session::{
    EventSink, SessionError, SessionEvent, SessionLifecycle, SessionState, SessionStore,
    SystemClock,
};
pub use storage::{EncryptedFile, StorageError};
pub use validation::ValidationError;
