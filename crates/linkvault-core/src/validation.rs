//! Schema validation for the vault document
//!
//! Every mutation is validated before it is applied so a rejected change
//! never leaves the document half-updated.

use std::collections::HashSet;

use reqwest::Url;
use thiserror::Error;

use crate::models::{
    Filters, Link, RatingSelector, Settings, VaultDocument, MAX_RATING, MIN_RATING,
    URL_PLACEHOLDER,
};

/// Minimum inactivity timeout, exclusive
pub const MIN_LOCK_AFTER_SECONDS: u64 = 10;

/// Schema violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid thumbnail URL: {0}")]
    InvalidThumbnailUrl(String),

    #[error("Rating {0} is outside {MIN_RATING}..={MAX_RATING}")]
    RatingOutOfRange(u8),

    #[error("Tags must not be empty")]
    EmptyTag,

    #[error("Duplicate tag: {0}")]
    DuplicateTag(String),

    #[error("Duplicate URL in document: {0}")]
    DuplicateUrl(String),

    #[error("Open link arguments must contain {URL_PLACEHOLDER}")]
    MissingUrlPlaceholder,

    #[error("Lock timeout must be greater than {MIN_LOCK_AFTER_SECONDS} seconds, got {0}")]
    LockTimeoutTooShort(u64),

    #[error("Filter field '{0}' must not be empty when set")]
    EmptyFilterField(&'static str),

    #[error("Selected URL does not match any link: {0}")]
    UnknownSelection(String),

    #[error("Password too short")]
    PasswordTooShort,
}

/// Result type alias for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check that `url` parses as an absolute URL
pub fn is_url(url: &str) -> bool {
    Url::parse(url).is_ok()
}

fn check_rating(rating: u8) -> ValidationResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::RatingOutOfRange(rating))
    }
}

/// Validate a single link
pub fn validate_link(link: &Link) -> ValidationResult<()> {
    if !is_url(&link.url) {
        return Err(ValidationError::InvalidUrl(link.url.clone()));
    }
    if let Some(ref thumbnail_url) = link.thumbnail_url {
        if !is_url(thumbnail_url) {
            return Err(ValidationError::InvalidThumbnailUrl(thumbnail_url.clone()));
        }
    }
    if let Some(rating) = link.rating {
        check_rating(rating)?;
    }
    if link.tags.iter().any(|t| t.is_empty()) {
        return Err(ValidationError::EmptyTag);
    }
    let mut seen = HashSet::new();
    if let Some(tag) = link.tags.iter().find(|t| !seen.insert(t.as_str())) {
        return Err(ValidationError::DuplicateTag(tag.clone()));
    }
    Ok(())
}

/// Validate settings
pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
    if !settings.open_link_arguments.contains(URL_PLACEHOLDER) {
        return Err(ValidationError::MissingUrlPlaceholder);
    }
    if settings.lock_after_seconds <= MIN_LOCK_AFTER_SECONDS {
        return Err(ValidationError::LockTimeoutTooShort(
            settings.lock_after_seconds,
        ));
    }
    Ok(())
}

/// Validate saved filters
pub fn validate_filters(filters: &Filters) -> ValidationResult<()> {
    if filters.text.as_deref() == Some("") {
        return Err(ValidationError::EmptyFilterField("text"));
    }
    if filters.site.as_deref() == Some("") {
        return Err(ValidationError::EmptyFilterField("site"));
    }
    if let Some(RatingSelector::Exactly(rating)) = filters.rating {
        check_rating(rating)?;
    }
    if filters.tags.iter().any(|t| t.is_empty()) {
        return Err(ValidationError::EmptyTag);
    }
    Ok(())
}

/// Validate a whole document
pub fn validate_document(doc: &VaultDocument) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(doc.links.len());
    for link in &doc.links {
        validate_link(link)?;
        if !seen.insert(link.url.as_str()) {
            return Err(ValidationError::DuplicateUrl(link.url.clone()));
        }
    }

    validate_settings(&doc.settings)?;
    validate_filters(&doc.filters)?;

    if let Some(ref selected) = doc.selected_url {
        if !seen.contains(selected.as_str()) {
            return Err(ValidationError::UnknownSelection(selected.clone()));
        }
    }
    Ok(())
}

/// Password policy: non-empty
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}
