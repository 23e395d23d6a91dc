//! Link command handlers

use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};

use linkvault_core::filter::FilterPipeline;
use linkvault_core::session::OpenCommand;
use linkvault_core::validation::validate_filters;
use linkvault_core::{
    ArtifactLookup, Availability, Filters, Link, OrderBy, RatingSelector, SessionStore,
};

use crate::metadata::{HtmlScraper, WebPageScraper};
use crate::output::Output;
use crate::prompt::{confirm, prompt_with_default};

/// Fields for a new link
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub url: String,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub rating: Option<u8>,
    pub thumbnail: Option<String>,
    /// Skip loading the page for a title and thumbnail
    pub offline: bool,
}

/// Create a new link
pub fn add(
    store: &mut SessionStore,
    new_link: NewLink,
    fetch_timeout: Duration,
    output: &Output,
) -> Result<()> {
    if store.link(&new_link.url).is_some() {
        bail!("Link already added: {}", new_link.url);
    }

    let mut title = new_link.title;
    let mut thumbnail = new_link.thumbnail;

    if !new_link.offline && (title.is_none() || thumbnail.is_none()) {
        let mut scraper = HtmlScraper::new(fetch_timeout)?;
        if scraper.load(&new_link.url) {
            if title.is_none() {
                title = scraper.page_title();
            }
            if thumbnail.is_none() {
                thumbnail = scraper
                    .image_srcs(&store.settings().thumbnail_image_ids)
                    .into_iter()
                    .next();
            }
            scraper.close();
        } else {
            output.warning(&format!("Could not load {}", new_link.url));
        }
    }

    let tags = if new_link.tags.is_empty() && !store.settings().default_tag.is_empty() {
        vec![store.settings().default_tag.clone()]
    } else {
        new_link.tags
    };

    let mut link = Link::new(new_link.url)
        .with_tags(tags)
        .with_rating(new_link.rating)
        .with_thumbnail_url(thumbnail);
    if let Some(title) = title {
        link = link.with_title(title);
    }

    store
        .add_link(link.clone())
        .context("Failed to add link")?;

    output.success(&format!("Added link: {}", link.url));
    output.print_link(&link);
    Ok(())
}

/// Ordering choices on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Rating,
    Time,
    Title,
    Random,
    Views,
    Tags,
}

impl From<OrderArg> for OrderBy {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Rating => OrderBy::Rating,
            OrderArg::Time => OrderBy::Time,
            OrderArg::Title => OrderBy::Title,
            OrderArg::Random => OrderBy::Random,
            OrderArg::Views => OrderBy::Views,
            OrderArg::Tags => OrderBy::Tags,
        }
    }
}

/// Local artifact filter choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AvailabilityArg {
    Any,
    Present,
    Absent,
}

impl From<AvailabilityArg> for Availability {
    fn from(arg: AvailabilityArg) -> Self {
        match arg {
            AvailabilityArg::Any => Availability::Any,
            AvailabilityArg::Present => Availability::Present,
            AvailabilityArg::Absent => Availability::Absent,
        }
    }
}

/// What "available" means for `--available`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ArtifactSource {
    /// A file named after the link in the link-files directory
    #[default]
    Files,
    /// A cached thumbnail
    Thumbnails,
}

/// Filter flags for `link list`
///
/// With no flags the filters saved in the vault are used.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Text matched against title, tags and URL
    #[arg(long)]
    pub text: Option<String>,
    /// Only links with this tag (repeatable)
    #[arg(short, long)]
    pub tag: Vec<String>,
    /// Require all given tags instead of any
    #[arg(long)]
    pub all_tags: bool,
    /// Substring the URL must contain
    #[arg(long)]
    pub site: Option<String>,
    /// Only links with exactly this rating
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5), conflicts_with = "unrated")]
    pub rating: Option<u8>,
    /// Only links without a rating
    #[arg(long)]
    pub unrated: bool,
    /// Comma separated tags to hide
    #[arg(long)]
    pub hide: Option<String>,
    /// Sort order
    #[arg(long, value_enum)]
    pub order: Option<OrderArg>,
    /// Reverse the sort order
    #[arg(long)]
    pub reversed: bool,
    /// Filter on local artifacts
    #[arg(long, value_enum)]
    pub available: Option<AvailabilityArg>,
    /// Where `--available` looks
    #[arg(long, value_enum, default_value_t)]
    pub source: ArtifactSource,
    /// Store these filters in the vault
    #[arg(long)]
    pub save: bool,
}

impl FilterArgs {
    /// Filters described by the flags, or None when no filter flag is set
    pub fn to_filters(&self) -> Option<Filters> {
        let any_set = self.text.is_some()
            || !self.tag.is_empty()
            || self.all_tags
            || self.site.is_some()
            || self.rating.is_some()
            || self.unrated
            || self.hide.is_some()
            || self.order.is_some()
            || self.reversed
            || self.available.is_some();
        if !any_set {
            return None;
        }

        let rating = match (self.rating, self.unrated) {
            (Some(r), _) => Some(RatingSelector::Exactly(r)),
            (None, true) => Some(RatingSelector::Unrated),
            (None, false) => None,
        };

        Some(Filters {
            text: self.text.clone(),
            rating,
            site: self.site.clone(),
            tags: self.tag.clone(),
            combine_tags: self.all_tags,
            hidden_tags: self.hide.clone(),
            order_by: self.order.map(OrderBy::from).unwrap_or_default(),
            reversed: self.reversed,
            availability: self.available.map(Availability::from).unwrap_or_default(),
        })
    }
}

/// List links through the filter pipeline
pub fn list(store: &mut SessionStore, args: &FilterArgs, output: &Output) -> Result<()> {
    let filters = match args.to_filters() {
        Some(filters) => {
            validate_filters(&filters).context("Invalid filter")?;
            if args.save {
                store.save_filters(filters.clone())?;
            }
            filters
        }
        None => store.filters().clone(),
    };

    let lookup: &dyn ArtifactLookup = match args.source {
        ArtifactSource::Files => store.link_files(),
        ArtifactSource::Thumbnails => store.cache(),
    };
    let links = FilterPipeline::from_filters(&filters, lookup).apply(store.links());
    output.print_links(&links);
    Ok(())
}

/// Show a single link with its local artifacts
pub fn show(store: &mut SessionStore, url: &str, output: &Output) -> Result<()> {
    let link = find(store, url)?.clone();
    output.print_link(&link);

    if output.should_prompt() {
        if let Some(file) = store.link_files().file_for(&link) {
            println!("File:        {}", file.display());
        }
        if let Some(image) = store.thumbnail(&link) {
            let (width, height) = image.dimensions();
            println!("Image:       {}x{} (cached)", width, height);
        }
    }
    Ok(())
}

/// Edit a link interactively
pub fn edit(store: &mut SessionStore, url: &str, output: &Output) -> Result<()> {
    let mut link = find(store, url)?.clone();

    println!("Editing link: {}", link.url);
    println!("Press Enter to keep current value, or type new value.\n");

    if let Some(title) = prompt_with_default("Title", link.title.as_deref().unwrap_or(""))? {
        link = link.with_title(title);
    }

    if let Some(tags) = prompt_with_default("Tags (comma-separated)", &link.tags.join(", "))? {
        link = link.with_tags(split_list(&tags));
    }

    let current_rating = link.rating.map(|r| r.to_string()).unwrap_or_default();
    if let Some(rating) = prompt_with_default("Rating (1-5, 0 for none)", &current_rating)? {
        let rating: u8 = rating.parse().context("Rating must be a number")?;
        link = link.with_rating((rating > 0).then_some(rating));
    }

    let current_thumbnail = link.thumbnail_url.clone().unwrap_or_default();
    if let Some(thumbnail) = prompt_with_default("Thumbnail URL", &current_thumbnail)? {
        link = link.with_thumbnail_url(Some(thumbnail));
    }

    store
        .update_link(link.clone())
        .context("Failed to update link")?;

    output.success("Link updated");
    output.print_link(&link);
    Ok(())
}

/// Remove a link (and its cached thumbnail)
pub fn remove(store: &mut SessionStore, url: &str, output: &Output) -> Result<()> {
    let link = find(store, url)?;

    if output.should_prompt() {
        println!("Remove link: {}", link.display_title());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = store.remove_link(url).context("Failed to remove link")?;
    output.success(&format!("Removed link: {}", removed.url));
    Ok(())
}

/// Count an open and launch the configured program
pub fn open(store: &mut SessionStore, url: &str, output: &Output) -> Result<()> {
    let command = store.open_link(url)?;
    launch(&command, url)?;
    output.success(&format!("Opened {}", url));
    Ok(())
}

fn launch(command: &OpenCommand, url: &str) -> Result<()> {
    if command.program.is_empty() {
        return open::that(url).with_context(|| format!("Failed to open {}", url));
    }

    Command::new(&command.program)
        .args(split_arguments(&command.arguments))
        .spawn()
        .with_context(|| format!("Failed to run {}", command.program))?;
    Ok(())
}

/// Split an argument string on whitespace, honouring double quotes
fn split_arguments(arguments: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for c in arguments.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    result.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        result.push(current);
    }
    result
}

/// Split a comma separated list, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn find<'a>(store: &'a SessionStore, url: &str) -> Result<&'a Link> {
    store
        .link(url)
        .ok_or_else(|| anyhow::anyhow!("Link not found: {}", url))
}

/// Export the links currently passing the saved filters
pub fn export(store: &SessionStore, path: &std::path::Path, output: &Output) -> Result<()> {
    let links = store.filtered_links();
    store.export_links(path, &links)?;
    output.success(&format!("Exported {} link(s) to {}", links.len(), path.display()));
    Ok(())
}
