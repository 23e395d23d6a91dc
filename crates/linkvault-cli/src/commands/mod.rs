//! Command handlers
//!
//! One-shot commands unlock the vault, do their work and lock it again.
//! `session` keeps it unlocked until the inactivity timeout.

pub mod config;
pub mod link;
pub mod session;
pub mod settings;
pub mod tag;
pub mod vault;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use linkvault_core::{
    CacheError, Config, HttpFetcher, SessionError, SessionLifecycle, StorageError, SystemClock,
};

use crate::prompt;

/// A locked lifecycle wired to the system clock and the HTTP fetcher
pub fn new_lifecycle(config: &Config) -> Result<SessionLifecycle> {
    let fetcher = HttpFetcher::with_timeout(Duration::from_secs(config.fetch_timeout_secs))
        .context("Failed to create HTTP client")?;
    Ok(SessionLifecycle::new(Arc::new(SystemClock), Arc::new(fetcher)))
}

/// Unlock `vault` with a password from the environment or stdin
pub fn unlock(lifecycle: &mut SessionLifecycle, vault: &Path) -> Result<()> {
    if !vault.exists() {
        bail!(
            "Vault not found: {}\nCreate one with `linkvault create`",
            vault.display()
        );
    }

    let password = prompt::read_password("Password")?;
    lifecycle
        .start_session(vault, &password)
        .with_context(|| format!("Failed to unlock {}", vault.display()))?;
    Ok(())
}

/// Save pending changes, then lock
///
/// Unlike the automatic save on timeout, a failed save here is an error.
pub fn close(lifecycle: &mut SessionLifecycle) -> Result<()> {
    if let Ok(store) = lifecycle.store_mut() {
        if store.is_dirty() && !store.save() {
            bail!("Failed to save {}", store.path().display());
        }
    }
    lifecycle.stop_session();
    Ok(())
}

/// Run `f` against an unlocked vault and lock it afterwards
pub fn with_session<T>(
    config: &Config,
    vault: &Path,
    f: impl FnOnce(&mut SessionLifecycle) -> Result<T>,
) -> Result<T> {
    let mut lifecycle = new_lifecycle(config)?;
    unlock(&mut lifecycle, vault)?;

    let result = f(&mut lifecycle);
    match result {
        Ok(value) => {
            close(&mut lifecycle)?;
            Ok(value)
        }
        Err(e) => {
            // Keep whatever was already applied before the failure
            lifecycle.stop_session();
            Err(e)
        }
    }
}

/// Recovery suggestion for a failure caused by vault or cache storage
pub fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| {
            if let Some(storage) = cause.downcast_ref::<StorageError>() {
                return Some(storage);
            }
            match cause.downcast_ref::<SessionError>()? {
                SessionError::Storage(storage)
                | SessionError::Cache(CacheError::Storage(storage)) => Some(storage),
                _ => None,
            }
        })
        .and_then(StorageError::recovery_suggestion)
}
