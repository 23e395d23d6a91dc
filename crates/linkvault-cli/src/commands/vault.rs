//! Vault-level handlers: create, change password, import and export

use std::path::Path;

use anyhow::{bail, Context, Result};

use linkvault_core::session::ImportOptions;
use linkvault_core::{CacheError, SessionError, SessionLifecycle, SessionStore, Settings};

use crate::output::Output;
use crate::prompt;

/// Create a new, empty vault
pub fn create(vault: &Path, lock_after_seconds: Option<u64>, output: &Output) -> Result<()> {
    if vault.exists() {
        bail!("Vault already exists: {}", vault.display());
    }
    if let Some(parent) = vault.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let mut settings = Settings::default();
    if let Some(seconds) = lock_after_seconds {
        settings.lock_after_seconds = seconds;
    }

    let password = prompt::read_new_password("New password")?;
    SessionLifecycle::create_vault(vault, &password, settings)
        .with_context(|| format!("Failed to create {}", vault.display()))?;

    output.success(&format!("Created vault: {}", vault.display()));
    Ok(())
}

/// Re-encrypt the vault and its thumbnail cache under a new password
pub fn change_password(lifecycle: &mut SessionLifecycle, output: &Output) -> Result<()> {
    let old_password = prompt::read_password("Current password")?;
    let new_password = prompt::read_new_password("New password")?;

    match lifecycle.change_password(&old_password, &new_password) {
        Ok(report) => {
            output.success(&format!(
                "Password changed ({} cached thumbnail(s) re-encrypted)",
                report.rekeyed
            ));
            Ok(())
        }
        Err(SessionError::Cache(CacheError::PartialRekey { report })) => {
            for path in &report.failed {
                output.warning(&format!("not re-encrypted: {}", path.display()));
            }
            bail!(
                "Password changed for the vault, but {} cached thumbnail(s) could not be \
                 re-encrypted and will be fetched again",
                report.failed.len()
            )
        }
        Err(e) => Err(e).context("Failed to change password"),
    }
}

/// Which parts of an exported document to skip on import
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportSkips {
    pub links: bool,
    pub filters: bool,
    pub settings: bool,
}

/// Merge an exported document into the vault
pub fn import(
    store: &mut SessionStore,
    path: &Path,
    skips: ImportSkips,
    output: &Output,
) -> Result<()> {
    let options = ImportOptions {
        path: path.to_path_buf(),
        links: !skips.links,
        filters: !skips.filters,
        settings: !skips.settings,
    };

    let summary = store
        .import(options)
        .with_context(|| format!("Failed to import {}", path.display()))?;

    output.success(&format!(
        "Imported {}: {} new link(s), {} merged",
        path.display(),
        summary.added,
        summary.merged
    ));
    Ok(())
}

/// Export the whole vault document as plain JSON
pub fn export_document(store: &SessionStore, path: &Path, output: &Output) -> Result<()> {
    store.export_document(path)?;
    output.warning("the exported file is not encrypted");
    output.success(&format!("Exported vault to {}", path.display()));
    Ok(())
}
