//! Index of local files that belong to links
//!
//! A link "has a file" when the configured directory contains a file whose
//! stem equals the link title, with characters that are not allowed in file
//! names replaced by `_`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::filter::ArtifactLookup;
use crate::models::Link;

const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// File name stem expected for a link title
pub fn expected_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Snapshot of the files in the link-files directory
#[derive(Debug, Clone, Default)]
pub struct LinkFileIndex {
    files: Vec<PathBuf>,
}

impl LinkFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the index with the files directly inside `directory`
    ///
    /// A missing or unreadable directory yields an empty index.
    pub fn refresh(&mut self, directory: Option<&Path>) {
        self.files.clear();
        let Some(directory) = directory else {
            return;
        };

        match fs::read_dir(directory) {
            Ok(entries) => {
                self.files = entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| path.is_file())
                    .collect();
                self.files.sort();
                debug!(dir = %directory.display(), count = self.files.len(), "Indexed link files");
            }
            Err(e) => {
                warn!(dir = %directory.display(), error = %e, "Cannot read link files directory");
            }
        }
    }

    /// Forget every indexed file
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Indexed file paths
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The file belonging to `link`, if any
    pub fn file_for(&self, link: &Link) -> Option<&Path> {
        let title = link.title.as_deref().filter(|t| !t.is_empty())?;
        let stem = expected_stem(title);
        self.files
            .iter()
            .find(|path| path.file_stem().is_some_and(|s| s.to_string_lossy() == stem))
            .map(PathBuf::as_path)
    }
}

impl ArtifactLookup for LinkFileIndex {
    fn has_artifact(&self, link: &Link) -> bool {
        self.file_for(link).is_some()
    }
}
