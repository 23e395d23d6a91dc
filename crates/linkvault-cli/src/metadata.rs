//! Web page scraping
//!
//! Loads a page when a link is added and pulls out a title and candidate
//! thumbnail images.

use anyhow::Result;
use reqwest::Url;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; linkvault/0.1)";

/// A loaded web page that can be queried for a title and images
pub trait WebPageScraper {
    /// Load `url`, replacing any previous page; false when it could not be loaded
    fn load(&mut self, url: &str) -> bool;

    /// Title of the loaded page
    fn page_title(&self) -> Option<String>;

    /// Absolute image URLs: `preferred_ids` first, then every other image
    fn image_srcs(&self, preferred_ids: &[String]) -> Vec<String>;

    /// Forget the loaded page
    fn close(&mut self);
}

/// Scraper backed by a blocking HTTP client and an HTML parser
pub struct HtmlScraper {
    client: reqwest::blocking::Client,
    page: Option<Page>,
}

struct Page {
    url: Option<Url>,
    document: Html,
}

impl HtmlScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            page: None,
        })
    }

    fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.text()?)
    }

    /// Use already-fetched HTML as the page at `page_url`
    pub fn load_html(&mut self, page_url: &str, html: &str) {
        self.page = Some(Page {
            url: Url::parse(page_url).ok(),
            document: Html::parse_document(html),
        });
    }
}

impl WebPageScraper for HtmlScraper {
    fn load(&mut self, url: &str) -> bool {
        self.close();
        match self.fetch(url) {
            Ok(html) => {
                self.load_html(url, &html);
                true
            }
            Err(e) => {
                debug!(url, error = %e, "Failed to load page");
                false
            }
        }
    }

    fn page_title(&self) -> Option<String> {
        self.page.as_ref().and_then(|page| extract_title(&page.document))
    }

    fn image_srcs(&self, preferred_ids: &[String]) -> Vec<String> {
        match &self.page {
            Some(page) => extract_image_srcs(&page.document, page.url.as_ref(), preferred_ids),
            None => Vec::new(),
        }
    }

    fn close(&mut self) {
        self.page = None;
    }
}

/// Extract title from HTML
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("head > title").ok()?;
    let title = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());
    if title.is_some() {
        return title;
    }

    // Pages without a <title> often still carry Open Graph data
    let selector = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_image_srcs(
    document: &Html,
    base: Option<&Url>,
    preferred_ids: &[String],
) -> Vec<String> {
    let mut srcs: Vec<String> = Vec::new();
    let mut push = |src: &str| {
        let Some(resolved) = resolve(base, src) else {
            return;
        };
        if !srcs.contains(&resolved) {
            srcs.push(resolved);
        }
    };

    for id in preferred_ids {
        // Ids that would not form a valid selector simply match nothing
        let Ok(selector) = Selector::parse(&format!("[id=\"{}\"]", id.replace('"', ""))) else {
            continue;
        };
        if let Some(src) = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("src"))
        {
            push(src);
        }
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        for el in document.select(&selector) {
            if let Some(src) = el.value().attr("src") {
                if is_absolute_http(src) && !src.contains("svg") {
                    push(src);
                }
            }
        }
    }

    srcs
}

fn is_absolute_http(src: &str) -> bool {
    src.starts_with("https://") || src.starts_with("http://")
}

/// Resolve `src` against the page URL; only http(s) results are kept
fn resolve(base: Option<&Url>, src: &str) -> Option<String> {
    let url = match base {
        Some(base) => base.join(src).ok()?,
        None => Url::parse(src).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
