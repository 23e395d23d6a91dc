//! Data models for linkvault
//!
//! Defines the vault document and its parts: links, settings and filters.
//! Links are value types; changes produce a modified copy, which keeps
//! dirty-tracking and equality checks simple.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder in `Settings::open_link_arguments` replaced by the link URL
pub const URL_PLACEHOLDER: &str = "%URL%";

/// Lowest rating a link can have
pub const MIN_RATING: u8 = 1;
/// Highest rating a link can have
pub const MAX_RATING: u8 = 5;

/// A saved link with metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Display title (often fetched from page metadata)
    #[serde(default)]
    pub title: Option<String>,
    /// Tags for organization
    #[serde(default)]
    pub tags: Vec<String>,
    /// The URL, unique within a vault
    pub url: String,
    /// When this link was created or last edited
    pub date_time: DateTime<Utc>,
    /// Optional rating in `MIN_RATING..=MAX_RATING`
    #[serde(default)]
    pub rating: Option<u8>,
    /// Where the thumbnail image is fetched from
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// How many times the link has been opened
    #[serde(default)]
    pub open_counter: u64,
}

impl Link {
    /// Create a new link with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            title: None,
            tags: Vec::new(),
            url: url.into(),
            date_time: Utc::now(),
            rating: None,
            thumbnail_url: None,
            open_counter: 0,
        }
    }

    /// Copy with a new title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Copy with the given tags, dropping duplicates but keeping order
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Copy with a rating (or none)
    pub fn with_rating(mut self, rating: Option<u8>) -> Self {
        self.rating = rating;
        self
    }

    /// Copy with a thumbnail URL (or none)
    pub fn with_thumbnail_url(mut self, thumbnail_url: Option<String>) -> Self {
        self.thumbnail_url = thumbnail_url;
        self
    }

    /// Copy with a specific timestamp
    pub fn with_date_time(mut self, date_time: DateTime<Utc>) -> Self {
        self.date_time = date_time;
        self
    }

    /// Copy with the open counter bumped by one
    ///
    /// The counter wraps to zero instead of overflowing.
    pub fn opened(mut self) -> Self {
        self.open_counter = self.open_counter.checked_add(1).unwrap_or(0);
        self
    }

    /// Title if it has content, otherwise the URL
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => &self.url,
        }
    }

    /// Check for a tag (case-sensitive)
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Per-vault settings, stored encrypted with the links
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Program used to open links
    pub open_link_command: String,
    /// Arguments for `open_link_command`; must contain `%URL%`
    pub open_link_arguments: String,
    /// Tag suggested for new links
    #[serde(default)]
    pub default_tag: String,
    /// Inactivity timeout before the session locks
    pub lock_after_seconds: u64,
    /// Element ids tried first when looking for a thumbnail on a page
    #[serde(default)]
    pub thumbnail_image_ids: Vec<String>,
    #[serde(default)]
    pub clear_clipboard_when_session_stops: bool,
    #[serde(default)]
    pub quit_when_session_timeouts: bool,
    /// Directory scanned for local files that belong to links
    #[serde(default)]
    pub link_files_directory_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            open_link_command: String::new(),
            open_link_arguments: URL_PLACEHOLDER.to_string(),
            default_tag: String::new(),
            lock_after_seconds: 300,
            thumbnail_image_ids: Vec::new(),
            clear_clipboard_when_session_stops: false,
            quit_when_session_timeouts: false,
            link_files_directory_path: None,
        }
    }
}

impl Settings {
    /// Arguments for opening `url` with `open_link_command`
    pub fn open_link_arguments_for(&self, url: &str) -> String {
        self.open_link_arguments.replace(URL_PLACEHOLDER, url)
    }
}

/// Ordering applied after filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    /// Rating descending, then title
    #[default]
    Rating,
    /// Newest first
    Time,
    /// Title ascending
    Title,
    /// Shuffled on every application
    Random,
    /// Open counter descending, then rating descending, then title
    Views,
    /// First tag ascending, then title
    Tags,
}

/// Rating part of the filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RatingSelector {
    /// Only links with exactly this rating
    Exactly(u8),
    /// Only links without a rating
    Unrated,
}

/// Tri-state selector for the local artifact filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    #[default]
    Any,
    Present,
    Absent,
}

/// Saved filter state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    /// Free text matched against title, tags and URL
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rating: Option<RatingSelector>,
    /// Substring the URL must contain
    #[serde(default)]
    pub site: Option<String>,
    /// Checked tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Require all checked tags instead of any
    #[serde(default)]
    pub combine_tags: bool,
    /// Comma separated tags whose links are hidden
    #[serde(default)]
    pub hidden_tags: Option<String>,
    #[serde(default)]
    pub order_by: OrderBy,
    #[serde(default)]
    pub reversed: bool,
    #[serde(default)]
    pub availability: Availability,
}

impl Filters {
    /// Hidden tags parsed from the comma separated text
    pub fn hidden_tag_list(&self) -> Vec<String> {
        self.hidden_tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// The decrypted vault document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultDocument {
    pub settings: Settings,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub selected_url: Option<String>,
}

impl VaultDocument {
    /// Create an empty document with the given settings
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Find a link by URL
    pub fn link(&self, url: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.url == url)
    }

    /// Position of a link by URL
    pub fn position(&self, url: &str) -> Option<usize> {
        self.links.iter().position(|l| l.url == url)
    }
}
