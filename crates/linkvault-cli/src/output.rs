//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use linkvault_core::{Link, Settings};
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single link
    pub fn print_link(&self, link: &Link) {
        match self.format {
            OutputFormat::Human => {
                println!("Title:       {}", link.display_title());
                println!("URL:         {}", link.url);
                if !link.tags.is_empty() {
                    println!("Tags:        {}", link.tags.join(", "));
                }
                println!("Rating:      {}", stars(link.rating));
                if let Some(ref thumbnail) = link.thumbnail_url {
                    println!("Thumbnail:   {}", thumbnail);
                }
                println!("Opened:      {} time(s)", link.open_counter);
                println!("Saved:       {}", link.date_time.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(link),
            OutputFormat::Quiet => {
                println!("{}", link.url);
            }
        }
    }

    /// Print a list of links
    pub fn print_links(&self, links: &[&Link]) {
        match self.format {
            OutputFormat::Human => {
                if links.is_empty() {
                    println!("No links found.");
                    return;
                }
                for link in links {
                    println!(
                        "{:5} | {} | {}",
                        stars(link.rating),
                        truncate(link.display_title(), 40),
                        truncate(&link.url, 50)
                    );
                }
                println!("\n{} link(s)", links.len());
            }
            OutputFormat::Json => print_json(&links),
            OutputFormat::Quiet => {
                for link in links {
                    println!("{}", link.url);
                }
            }
        }
    }

    /// Print a list of tags with their link counts
    pub fn print_tags(&self, tags: &[(String, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                print_json(&json_tags);
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print plain values, one per line
    pub fn print_values(&self, values: &[String]) {
        match self.format {
            OutputFormat::Json => print_json(&values),
            OutputFormat::Human | OutputFormat::Quiet => {
                for value in values {
                    println!("{}", value);
                }
            }
        }
    }

    /// Print per-vault settings
    pub fn print_settings(&self, settings: &Settings) {
        match self.format {
            OutputFormat::Human => {
                println!("Vault settings:");
                println!("  open_link_command:                  {}", or_unset(&settings.open_link_command));
                println!("  open_link_arguments:                {}", settings.open_link_arguments);
                println!("  default_tag:                        {}", or_unset(&settings.default_tag));
                println!("  lock_after_seconds:                 {}", settings.lock_after_seconds);
                println!(
                    "  thumbnail_image_ids:                {}",
                    or_unset(&settings.thumbnail_image_ids.join(","))
                );
                println!(
                    "  clear_clipboard_when_session_stops: {}",
                    settings.clear_clipboard_when_session_stops
                );
                println!(
                    "  quit_when_session_timeouts:         {}",
                    settings.quit_when_session_timeouts
                );
                println!(
                    "  link_files_directory_path:          {}",
                    settings
                        .link_files_directory_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(not set)".to_string())
                );
            }
            OutputFormat::Json => print_json(settings),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (shown in every mode)
    pub fn warning(&self, message: &str) {
        eprintln!("warning: {}", message);
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("error: failed to serialize output: {}", e),
    }
}

/// Rating as a short star string, `-` when unrated
fn stars(rating: Option<u8>) -> String {
    match rating {
        Some(n) => "*".repeat(usize::from(n)),
        None => "-".to_string(),
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
