//! The unlocked vault document
//!
//! `SessionStore` owns the decrypted document for one session and is the
//! only way to change it. Every mutation is validated first; a rejected
//! mutation leaves the document untouched. Successful mutations set the
//! dirty flag, which [`SessionStore::save`] clears.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{SessionError, SessionResult};
use super::events::{EventSink, SessionEvent};
use crate::crypto::VaultKey;
use crate::filter::{ArtifactLookup, FilterPipeline};
use crate::image_cache::{DecodedImage, ImageCache};
use crate::link_files::LinkFileIndex;
use crate::merge::merge_links;
use crate::models::{Filters, Link, Settings, VaultDocument};
use crate::storage::{atomic_write, read_plain_json, write_plain_json, EncryptedFile, StorageError};
use crate::validation::{validate_document, validate_link};

/// Which parts of an exported document to import
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub path: PathBuf,
    pub links: bool,
    pub filters: bool,
    pub settings: bool,
}

impl ImportOptions {
    /// Import everything from `path`
    pub fn all(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            links: true,
            filters: true,
            settings: true,
        }
    }
}

/// What an import changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Links that were new
    pub added: usize,
    /// Links merged into an existing record
    pub merged: usize,
}

/// External command that opens a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCommand {
    pub program: String,
    pub arguments: String,
}

/// Owner of the decrypted document for an unlocked vault
pub struct SessionStore {
    file: EncryptedFile,
    key: VaultKey,
    document: VaultDocument,
    dirty: bool,
    cache: ImageCache,
    link_files: LinkFileIndex,
    events: EventSink,
}

impl SessionStore {
    /// Wrap an already decrypted and validated document
    pub fn new(
        file: EncryptedFile,
        key: VaultKey,
        document: VaultDocument,
        cache: ImageCache,
        events: EventSink,
    ) -> Self {
        let mut store = Self {
            file,
            key,
            document,
            dirty: false,
            cache,
            link_files: LinkFileIndex::new(),
            events,
        };
        store.refresh_link_files();
        store
    }

    // ========== Accessors ==========

    /// Vault file path
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn document(&self) -> &VaultDocument {
        &self.document
    }

    /// All links in insertion order
    pub fn links(&self) -> &[Link] {
        &self.document.links
    }

    /// Find a link by URL
    pub fn link(&self, url: &str) -> Option<&Link> {
        self.document.link(url)
    }

    pub fn settings(&self) -> &Settings {
        &self.document.settings
    }

    pub fn filters(&self) -> &Filters {
        &self.document.filters
    }

    pub fn selected_url(&self) -> Option<&str> {
        self.document.selected_url.as_deref()
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn key(&self) -> &VaultKey {
        &self.key
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut ImageCache {
        &mut self.cache
    }

    pub fn link_files(&self) -> &LinkFileIndex {
        &self.link_files
    }

    fn set_dirty(&mut self, dirty: bool) {
        if self.dirty != dirty {
            self.dirty = dirty;
            self.events.emit(SessionEvent::DataUpdatedChanged { dirty });
        }
    }

    // ========== Link operations ==========

    /// Append a new link
    pub fn add_link(&mut self, link: Link) -> SessionResult<()> {
        validate_link(&link)?;
        if self.document.position(&link.url).is_some() {
            return Err(SessionError::DuplicateLink(link.url));
        }

        debug!(url = %link.url, "Adding link");
        self.document.links.push(link.clone());
        self.set_dirty(true);
        self.events.emit(SessionEvent::LinkAdded(link));
        Ok(())
    }

    /// Replace the link with the same URL, keeping its position
    pub fn update_link(&mut self, link: Link) -> SessionResult<()> {
        validate_link(&link)?;
        let index = self
            .document
            .position(&link.url)
            .ok_or_else(|| SessionError::LinkNotFound(link.url.clone()))?;

        debug!(url = %link.url, "Updating link");
        self.document.links[index] = link.clone();
        self.set_dirty(true);
        self.events.emit(SessionEvent::LinkUpdated(link));
        Ok(())
    }

    /// Remove a link and evict its cached thumbnail
    ///
    /// Returns the removed link.
    pub fn remove_link(&mut self, url: &str) -> SessionResult<Link> {
        let index = self
            .document
            .position(url)
            .ok_or_else(|| SessionError::LinkNotFound(url.to_string()))?;

        debug!(url = %url, "Removing link");
        let removed = self.document.links.remove(index);
        if self.document.selected_url.as_deref() == Some(url) {
            self.document.selected_url = None;
        }
        self.set_dirty(true);
        self.events.emit(SessionEvent::LinkRemoved(removed.clone()));

        if let Some(ref thumbnail_url) = removed.thumbnail_url {
            if let Err(e) = self.cache.remove(thumbnail_url) {
                warn!(url = %thumbnail_url, error = %e, "Failed to evict thumbnail");
            }
        }
        Ok(removed)
    }

    /// Count an open of `url` and build the command that opens it
    pub fn open_link(&mut self, url: &str) -> SessionResult<OpenCommand> {
        let link = self
            .link(url)
            .cloned()
            .ok_or_else(|| SessionError::LinkNotFound(url.to_string()))?;
        self.update_link(link.opened())?;

        let settings = &self.document.settings;
        Ok(OpenCommand {
            program: settings.open_link_command.clone(),
            arguments: settings.open_link_arguments_for(url),
        })
    }

    // ========== Settings, filters, selection ==========

    /// Apply `change` to a copy of the document and keep it only if it validates
    fn replace_validated(&mut self, change: impl FnOnce(&mut VaultDocument)) -> SessionResult<()> {
        let mut candidate = self.document.clone();
        change(&mut candidate);
        validate_document(&candidate)?;
        self.document = candidate;
        self.set_dirty(true);
        Ok(())
    }

    pub fn save_settings(&mut self, settings: Settings) -> SessionResult<()> {
        self.replace_validated(|doc| doc.settings = settings)?;
        self.refresh_link_files();
        self.events
            .emit(SessionEvent::SettingsUpdated(self.document.settings.clone()));
        Ok(())
    }

    pub fn save_filters(&mut self, filters: Filters) -> SessionResult<()> {
        self.replace_validated(|doc| doc.filters = filters)
    }

    pub fn save_selection(&mut self, selected_url: Option<String>) -> SessionResult<()> {
        self.replace_validated(|doc| doc.selected_url = selected_url)
    }

    // ========== Persistence ==========

    /// Write the document if there are unsaved changes
    ///
    /// Returns `true` only when a write happened and succeeded. Write failures
    /// are logged and leave the dirty flag set.
    pub fn save(&mut self) -> bool {
        if !self.dirty {
            return false;
        }

        match self.file.write_json(&self.document, &self.key) {
            Ok(()) => {
                info!(path = %self.file.path().display(), "Vault saved");
                self.set_dirty(false);
                true
            }
            Err(e) => {
                warn!(path = %self.file.path().display(), error = %e, "Failed to save vault");
                false
            }
        }
    }

    /// Persist the document under `new_key` and adopt it
    ///
    /// On failure the old key stays in effect.
    pub(crate) fn rekey_document(&mut self, new_key: VaultKey) -> SessionResult<()> {
        self.file.write_json(&self.document, &new_key)?;
        self.key = new_key;
        self.set_dirty(false);
        info!(path = %self.file.path().display(), "Vault re-encrypted with new key");
        Ok(())
    }

    // ========== Import / export ==========

    /// Merge an exported (plain JSON) document into this one, then save
    pub fn import(&mut self, options: ImportOptions) -> SessionResult<ImportSummary> {
        let imported: VaultDocument = read_plain_json(&options.path)?;
        let mut summary = ImportSummary::default();

        if options.settings {
            self.save_settings(imported.settings)?;
        }
        if options.filters {
            self.save_filters(imported.filters)?;
        }
        if options.links {
            for link in imported.links {
                match self.link(&link.url) {
                    Some(current) => {
                        let merged = merge_links(current, &link)?;
                        self.update_link(merged)?;
                        summary.merged += 1;
                    }
                    None => {
                        self.add_link(link)?;
                        summary.added += 1;
                    }
                }
            }
        }

        if self.dirty && !self.save() {
            return Err(SessionError::SaveFailed(self.file.path().to_path_buf()));
        }

        info!(
            added = summary.added,
            merged = summary.merged,
            "Imported from {}",
            options.path.display()
        );
        Ok(summary)
    }

    /// Write the whole document as plain JSON
    pub fn export_document(&self, path: &Path) -> SessionResult<()> {
        write_plain_json(path, &self.document).map_err(|e| export_error(e, path))
    }

    /// Write the URLs of `links`, one per line
    pub fn export_links(&self, path: &Path, links: &[&Link]) -> SessionResult<()> {
        if path.exists() {
            return Err(SessionError::ExportTargetExists(path.to_path_buf()));
        }
        let mut text = String::new();
        for link in links {
            text.push_str(&link.url);
            text.push('\n');
        }
        atomic_write(path, text.as_bytes()).map_err(|e| export_error(e, path))
    }

    // ========== Views ==========

    /// Links passing the saved filters, sorted; availability uses link files
    pub fn filtered_links(&self) -> Vec<&Link> {
        self.filtered_links_with(&self.link_files)
    }

    /// Links passing the saved filters, with a custom availability source
    pub fn filtered_links_with(&self, lookup: &dyn ArtifactLookup) -> Vec<&Link> {
        FilterPipeline::from_filters(&self.document.filters, lookup).apply(&self.document.links)
    }

    /// Thumbnail for a link, fetched on a cache miss
    ///
    /// Network and decode failures mean "no thumbnail".
    pub fn thumbnail(&mut self, link: &Link) -> Option<Arc<DecodedImage>> {
        let url = link.thumbnail_url.as_deref()?;
        match self.cache.add(url, url) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!(url = %url, error = %e, "No thumbnail");
                None
            }
        }
    }

    /// Re-scan the link-files directory from the current settings
    pub fn refresh_link_files(&mut self) {
        let directory = self.document.settings.link_files_directory_path.clone();
        self.link_files.refresh(directory.as_deref());
    }

    /// Drop in-memory indexes before the session ends
    pub(crate) fn close(&mut self) {
        self.cache.clear_memory();
        self.link_files.clear();
    }
}

fn export_error(error: StorageError, path: &Path) -> SessionError {
    match error {
        StorageError::AlreadyExists { .. } => SessionError::ExportTargetExists(path.to_path_buf()),
        other => other.into(),
    }
}
