//! Session state machine
//!
//! ```text
//!            start_session            tick (deadline passed)
//!   Locked ----------------> Unlocked ----------------------> Stopping --> Locked
//!                               |  ^                             ^
//!                    reset_time |  | tick (time left)            |
//!                               +--+           stop_session -----+
//! ```
//!
//! The lifecycle owns the [`SessionStore`] while unlocked. Locking drops the
//! store, which wipes the key and releases the decrypted document.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::clock::Clock;
use super::error::{SessionError, SessionResult};
use super::events::{EventSink, SessionEvent};
use super::store::SessionStore;
use crate::crypto::{derive_key, keys_match};
use crate::fetch::ImageFetcher;
use crate::image_cache::{cache_dir_for, ImageCache, RekeyReport};
use crate::models::{Settings, VaultDocument};
use crate::storage::{EncryptedFile, StorageError};
use crate::validation::{validate_document, validate_password};

const MAX_LOCK_AFTER_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocked,
    /// Shutting down; only observable by event listeners
    Stopping,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TimedOut,
}

/// Host-side effects of stopping a session
///
/// Both hooks default to doing nothing.
pub trait SessionHost: Send {
    /// Wipe anything copied to the clipboard during the session
    fn clear_clipboard(&self) {}

    /// Ask the application to exit
    fn request_quit(&self) {}
}

/// Host without side effects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl SessionHost for NoopHost {}

/// Coordinates unlock, inactivity timeout, lock and password rotation
pub struct SessionLifecycle {
    state: SessionState,
    store: Option<SessionStore>,
    deadline: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    fetcher: Arc<dyn ImageFetcher>,
    events: EventSink,
    host: Box<dyn SessionHost>,
}

impl SessionLifecycle {
    /// Create a locked lifecycle
    pub fn new(clock: Arc<dyn Clock>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let deadline = clock.now();
        Self {
            state: SessionState::Locked,
            store: None,
            deadline,
            clock,
            fetcher,
            events: EventSink::disabled(),
            host: Box::new(NoopHost),
        }
    }

    /// Publish events to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Route stop side effects to `host`
    pub fn with_host(mut self, host: Box<dyn SessionHost>) -> Self {
        self.host = host;
        self
    }

    /// Create a new empty vault file
    ///
    /// Refuses to overwrite an existing file.
    pub fn create_vault(path: &Path, password: &str, settings: Settings) -> SessionResult<()> {
        validate_password(password)?;
        let file = EncryptedFile::new(path);
        if file.exists() {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            }
            .into());
        }

        let document = VaultDocument::new(settings);
        validate_document(&document)?;
        file.write_json(&document, &derive_key(password))?;
        info!(path = %path.display(), "Created vault");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == SessionState::Unlocked
    }

    /// The open session
    pub fn store(&self) -> SessionResult<&SessionStore> {
        self.store.as_ref().ok_or(SessionError::Locked)
    }

    /// The open session, for mutations
    pub fn store_mut(&mut self) -> SessionResult<&mut SessionStore> {
        self.store.as_mut().ok_or(SessionError::Locked)
    }

    /// Time until the session locks itself
    pub fn remaining(&self) -> Option<StdDuration> {
        if !self.is_unlocked() {
            return None;
        }
        Some((self.deadline - self.clock.now()).to_std().unwrap_or_default())
    }

    fn lock_after(&self) -> Duration {
        let seconds = self
            .store
            .as_ref()
            .map_or(0, |store| store.settings().lock_after_seconds);
        // Clamped to stay inside chrono's range
        let seconds = i64::try_from(seconds)
            .map_or(MAX_LOCK_AFTER_SECONDS, |s| s.min(MAX_LOCK_AFTER_SECONDS));
        Duration::seconds(seconds)
    }

    fn restart_deadline(&mut self) {
        self.deadline = self.clock.now() + self.lock_after();
    }

    /// Unlock the vault at `path`
    ///
    /// On any failure the lifecycle stays locked.
    pub fn start_session(&mut self, path: &Path, password: &str) -> SessionResult<()> {
        if self.state != SessionState::Locked {
            return Err(SessionError::AlreadyUnlocked);
        }
        validate_password(password)?;

        let key = derive_key(password);
        let file = EncryptedFile::new(path);
        let document: VaultDocument = file.read_json(&key)?;
        validate_document(&document)?;

        let cache = ImageCache::new(cache_dir_for(path), key.clone(), Arc::clone(&self.fetcher));
        self.store = Some(SessionStore::new(
            file,
            key,
            document,
            cache,
            self.events.clone(),
        ));
        self.state = SessionState::Unlocked;
        self.restart_deadline();

        info!(path = %path.display(), "Session started");
        self.events.emit(SessionEvent::SessionStarted);
        Ok(())
    }

    /// Advance the timer; locks the session once the deadline has passed
    ///
    /// Returns the state after the tick.
    pub fn tick(&mut self) -> SessionState {
        if self.state != SessionState::Unlocked {
            return self.state;
        }

        let now = self.clock.now();
        if now >= self.deadline {
            info!("Session timed out");
            self.stop(StopReason::TimedOut);
        } else {
            let remaining = (self.deadline - now).to_std().unwrap_or_default();
            self.events.emit(SessionEvent::SessionTick { remaining });
        }
        self.state
    }

    /// Activity seen: push the deadline out again
    pub fn reset_time(&mut self) {
        if self.is_unlocked() {
            self.restart_deadline();
        }
    }

    /// Lock the session on request
    pub fn stop_session(&mut self) {
        if self.is_unlocked() {
            self.stop(StopReason::Requested);
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.state = SessionState::Stopping;
        self.events.emit(SessionEvent::SessionStopping);

        let Some(mut store) = self.store.take() else {
            self.state = SessionState::Locked;
            return;
        };

        if store.is_dirty() && !store.save() {
            warn!(path = %store.path().display(), "Unsaved changes lost while locking");
        }

        let settings = store.settings().clone();
        if settings.clear_clipboard_when_session_stops {
            self.host.clear_clipboard();
        }
        if reason == StopReason::TimedOut && settings.quit_when_session_timeouts {
            self.host.request_quit();
        }

        store.close();
        drop(store);

        self.state = SessionState::Locked;
        info!(?reason, "Session stopped");
        self.events.emit(SessionEvent::SessionStopped { settings });
    }

    /// Re-encrypt the vault and its thumbnail cache under a new password
    ///
    /// The document is written first, then the cache. The two steps are not
    /// atomic: if the cache step fails, the document already uses the new
    /// password and the error lists the cache entries left behind.
    pub fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
    ) -> SessionResult<RekeyReport> {
        let store = self.store.as_mut().ok_or(SessionError::Locked)?;
        if !keys_match(old_password, store.key()) {
            return Err(SessionError::WrongPassword);
        }
        validate_password(new_password)?;

        let new_key = derive_key(new_password);
        store.rekey_document(new_key.clone())?;
        let report = store.cache_mut().change_key(new_key)?;

        info!(rekeyed = report.rekeyed, "Password changed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;
    use crate::image_cache::tests::StubFetcher;
    use crate::image_cache::CacheError;
    use crate::models::Link;
    use crate::session::clock::ManualClock;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    const PASSWORD: &str = "correct horse";

    struct Fixture {
        _dir: TempDir,
        path: std::path::PathBuf,
        clock: ManualClock,
        lifecycle: SessionLifecycle,
        events: UnboundedReceiver<SessionEvent>,
    }

    fn fixture_with(settings: Settings) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links.linkvault");
        SessionLifecycle::create_vault(&path, PASSWORD, settings).unwrap();

        let clock = ManualClock::default();
        let (sink, events) = EventSink::channel();
        let lifecycle = SessionLifecycle::new(Arc::new(clock.clone()), StubFetcher::png())
            .with_events(sink);
        Fixture {
            _dir: dir,
            path,
            clock,
            lifecycle,
            events,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Settings {
            lock_after_seconds: 60,
            ..Settings::default()
        })
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn count(events: &[SessionEvent], wanted: &SessionEvent) -> usize {
        events.iter().filter(|e| *e == wanted).count()
    }

    #[derive(Default)]
    struct RecordingHost {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SessionHost for RecordingHost {
        fn clear_clipboard(&self) {
            self.calls.lock().unwrap().push("clipboard");
        }

        fn request_quit(&self) {
            self.calls.lock().unwrap().push("quit");
        }
    }

    #[test]
    fn test_create_vault_refuses_overwrite() {
        let f = fixture();
        let err = SessionLifecycle::create_vault(&f.path, PASSWORD, Settings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_create_vault_rejects_empty_password() {
        let dir = TempDir::new().unwrap();
        let err = SessionLifecycle::create_vault(&dir.path().join("v"), "", Settings::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[test]
    fn test_start_session_unlocks() {
        let mut f = fixture();
        assert_eq!(f.lifecycle.state(), SessionState::Locked);
        assert!(matches!(f.lifecycle.store(), Err(SessionError::Locked)));

        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();
        assert_eq!(f.lifecycle.state(), SessionState::Unlocked);
        assert_eq!(f.lifecycle.remaining(), Some(StdDuration::from_secs(60)));
        assert_eq!(drain(&mut f.events), vec![SessionEvent::SessionStarted]);

        let err = f.lifecycle.start_session(&f.path, PASSWORD).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyUnlocked));
    }

    #[test]
    fn test_wrong_password_stays_locked() {
        let mut f = fixture();
        let err = f.lifecycle.start_session(&f.path, "nope").unwrap_err();
        assert!(matches!(err, SessionError::Crypto(CryptoError::Undecryptable)));
        assert_eq!(f.lifecycle.state(), SessionState::Locked);
        assert!(drain(&mut f.events).is_empty());
    }

    #[test]
    fn test_corrupt_vault_reports_same_error_as_wrong_password() {
        let mut f = fixture();
        let wrong_password = f.lifecycle.start_session(&f.path, "nope").unwrap_err();

        std::fs::write(&f.path, [0xff, 0xfe, 0x00, 0x80, 0x81]).unwrap();
        let corrupt = f.lifecycle.start_session(&f.path, PASSWORD).unwrap_err();
        assert!(matches!(corrupt, SessionError::Crypto(CryptoError::Undecryptable)));
        assert_eq!(wrong_password.to_string(), corrupt.to_string());
        assert_eq!(f.lifecycle.state(), SessionState::Locked);
    }

    #[test]
    fn test_timeout_fires_exactly_once() {
        let mut f = fixture();
        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();

        for _ in 0..59 {
            f.clock.advance(Duration::seconds(1));
            assert_eq!(f.lifecycle.tick(), SessionState::Unlocked);
        }
        let before = drain(&mut f.events);
        assert_eq!(count(&before, &SessionEvent::SessionStopping), 0);
        assert!(before.contains(&SessionEvent::SessionTick {
            remaining: StdDuration::from_secs(1)
        }));

        f.clock.advance(Duration::seconds(1));
        assert_eq!(f.lifecycle.tick(), SessionState::Locked);

        f.clock.advance(Duration::seconds(30));
        assert_eq!(f.lifecycle.tick(), SessionState::Locked);

        let after = drain(&mut f.events);
        assert_eq!(count(&after, &SessionEvent::SessionStopping), 1);
        assert!(matches!(
            after.last(),
            Some(SessionEvent::SessionStopped { .. })
        ));
        assert!(f.lifecycle.store().is_err());
    }

    #[test]
    fn test_reset_time_postpones_timeout() {
        let mut f = fixture();
        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();

        f.clock.advance(Duration::seconds(50));
        f.lifecycle.reset_time();
        f.clock.advance(Duration::seconds(50));
        assert_eq!(f.lifecycle.tick(), SessionState::Unlocked);

        f.clock.advance(Duration::seconds(10));
        assert_eq!(f.lifecycle.tick(), SessionState::Locked);
    }

    #[test]
    fn test_stop_saves_dirty_document() {
        let mut f = fixture();
        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();
        f.lifecycle
            .store_mut()
            .unwrap()
            .add_link(Link::new("https://x.test"))
            .unwrap();

        f.lifecycle.stop_session();
        assert_eq!(f.lifecycle.state(), SessionState::Locked);

        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();
        assert_eq!(f.lifecycle.store().unwrap().links().len(), 1);
    }

    #[test]
    fn test_stop_runs_host_hooks_from_settings() {
        let f = fixture_with(Settings {
            lock_after_seconds: 60,
            clear_clipboard_when_session_stops: true,
            quit_when_session_timeouts: true,
            ..Settings::default()
        });
        let host = RecordingHost::default();
        let calls = Arc::clone(&host.calls);
        let mut lifecycle = SessionLifecycle::new(Arc::new(f.clock.clone()), StubFetcher::png())
            .with_host(Box::new(host));

        lifecycle.start_session(&f.path, PASSWORD).unwrap();
        lifecycle.stop_session();
        assert_eq!(*calls.lock().unwrap(), vec!["clipboard"]);

        lifecycle.start_session(&f.path, PASSWORD).unwrap();
        f.clock.advance(Duration::seconds(61));
        lifecycle.tick();
        assert_eq!(*calls.lock().unwrap(), vec!["clipboard", "clipboard", "quit"]);
    }

    #[test]
    fn test_change_password_requires_old_password() {
        let mut f = fixture();
        assert!(matches!(
            f.lifecycle.change_password(PASSWORD, "new"),
            Err(SessionError::Locked)
        ));

        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();
        assert!(matches!(
            f.lifecycle.change_password("wrong", "new"),
            Err(SessionError::WrongPassword)
        ));
        assert!(matches!(
            f.lifecycle.change_password(PASSWORD, ""),
            Err(SessionError::Validation(_))
        ));
    }

    #[test]
    fn test_change_password_rekeys_document_and_cache() {
        let mut f = fixture();
        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();

        let thumbs = ["https://x.test/1.png", "https://x.test/2.png"];
        let store = f.lifecycle.store_mut().unwrap();
        for (i, thumb) in thumbs.iter().enumerate() {
            let link = Link::new(format!("https://x.test/{i}"))
                .with_thumbnail_url(Some(thumb.to_string()));
            store.add_link(link.clone()).unwrap();
            assert!(store.thumbnail(&link).is_some());
        }
        let entries: Vec<_> = thumbs.iter().map(|t| store.cache().entry_path(t)).collect();

        let report = f.lifecycle.change_password(PASSWORD, "new secret").unwrap();
        assert_eq!(report.rekeyed, 2);
        assert!(!f.lifecycle.store().unwrap().is_dirty());

        for entry in &entries {
            let file = EncryptedFile::new(entry);
            assert!(file.read_bytes(&derive_key("new secret")).is_ok());
            assert!(file.read_bytes(&derive_key(PASSWORD)).is_err());
        }

        f.lifecycle.stop_session();
        assert!(f.lifecycle.start_session(&f.path, PASSWORD).is_err());
        f.lifecycle.start_session(&f.path, "new secret").unwrap();
        assert_eq!(f.lifecycle.store().unwrap().links().len(), 2);
    }

    #[test]
    fn test_change_password_reports_partial_cache_failure() {
        let mut f = fixture();
        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();

        let cache_dir = f.lifecycle.store().unwrap().cache().directory().to_path_buf();
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("BROKEN"), b"not encrypted").unwrap();

        let err = f.lifecycle.change_password(PASSWORD, "new secret").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Cache(CacheError::PartialRekey { .. })
        ));

        // the document already moved to the new password
        f.lifecycle.stop_session();
        f.lifecycle.start_session(&f.path, "new secret").unwrap();
    }

    #[test]
    fn test_end_to_end_add_remove_evicts_cache_entry() {
        let mut f = fixture();
        f.lifecycle.start_session(&f.path, PASSWORD).unwrap();
        let thumb = "https://x.test/thumb.png";

        let store = f.lifecycle.store_mut().unwrap();
        assert!(store.links().is_empty());
        let link = Link::new("https://x.test")
            .with_tags(["t"])
            .with_thumbnail_url(Some(thumb.to_string()));
        store.add_link(link.clone()).unwrap();
        store.thumbnail(&link).unwrap();
        let entry = store.cache().entry_path(thumb);
        assert!(entry.exists());

        store.remove_link("https://x.test").unwrap();
        assert!(store.links().is_empty());
        assert!(!entry.exists());
    }

    #[test]
    fn test_cache_is_shared_across_sessions() {
        let fetcher = StubFetcher::png();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.linkvault");
        SessionLifecycle::create_vault(&path, PASSWORD, Settings::default()).unwrap();
        let link = Link::new("https://x.test").with_thumbnail_url(Some("https://x.test/t.png".into()));

        let mut lifecycle = SessionLifecycle::new(
            Arc::new(ManualClock::default()),
            Arc::clone(&fetcher) as Arc<dyn ImageFetcher>,
        );
        for _ in 0..2 {
            lifecycle.start_session(&path, PASSWORD).unwrap();
            lifecycle.store_mut().unwrap().thumbnail(&link).unwrap();
            lifecycle.stop_session();
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
