//! HTTP fetching for thumbnail cache misses
//!
//! The cache only needs "give me the bytes behind this URL", so fetching is a
//! small trait with a blocking reqwest implementation. Tests plug in stubs.

use std::time::Duration;

use thiserror::Error;

/// Default fetch timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT: u64 = 10;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; linkvault/1.0)";

/// Errors from fetching remote content
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to '{url}' returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Raised by non-HTTP fetchers
    #[error("Fetching '{url}' failed: {reason}")]
    Other { url: String, reason: String },
}

/// Result type alias for fetching
pub type FetchResult<T> = Result<T, FetchError>;

/// Source of raw bytes for a URL
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FetchResult<Vec<u8>>;
}

/// Blocking HTTP fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT))
    }

    /// Create a fetcher with a custom timeout
    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> FetchResult<Vec<u8>> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(request_error)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}
