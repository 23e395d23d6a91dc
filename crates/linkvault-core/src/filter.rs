//! Filtering and sorting of the link list
//!
//! A [`FilterPipeline`] is built from the saved [`Filters`] and runs a fixed
//! sequence of filters followed by a sort stage:
//!
//! 1. hidden tags
//! 2. checked tags (all or any, depending on `combine_tags`)
//! 3. exact rating
//! 4. unrated only
//! 5. site substring
//! 6. free text (case-insensitive over title, tags and URL)
//! 7. local artifact availability
//!
//! A filter whose parameter is unset is the identity.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use reqwest::Url;

use crate::models::{Availability, Filters, Link, OrderBy, RatingSelector};

/// Answers whether a link has a local artifact (cached thumbnail, link file)
pub trait ArtifactLookup {
    fn has_artifact(&self, link: &Link) -> bool;
}

/// Lookup that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

impl ArtifactLookup for NoArtifacts {
    fn has_artifact(&self, _link: &Link) -> bool {
        false
    }
}

/// One stage of the pipeline
pub trait LinkFilter {
    /// Keep the subset of `links` this filter accepts, preserving order
    fn apply<'a>(&self, links: Vec<&'a Link>) -> Vec<&'a Link>;
}

/// Excludes links carrying any hidden tag
#[derive(Debug, Clone, Default)]
pub struct HiddenTagsFilter {
    pub hidden: Vec<String>,
}

impl LinkFilter for HiddenTagsFilter {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        if !self.hidden.is_empty() {
            links.retain(|link| !link.tags.iter().any(|t| self.hidden.contains(t)));
        }
        links
    }
}

/// How checked tags combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// Link must carry every checked tag
    All,
    /// Link must carry at least one checked tag
    Any,
}

/// Keeps links matching the checked tags
#[derive(Debug, Clone)]
pub struct TagFilter {
    pub tags: Vec<String>,
    pub mode: TagMode,
}

impl LinkFilter for TagFilter {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        if self.tags.is_empty() {
            return links;
        }
        match self.mode {
            TagMode::All => links.retain(|link| self.tags.iter().all(|t| link.has_tag(t))),
            TagMode::Any => links.retain(|link| self.tags.iter().any(|t| link.has_tag(t))),
        }
        links
    }
}

/// Keeps links with exactly this rating
#[derive(Debug, Clone, Default)]
pub struct RatingFilter {
    pub rating: Option<u8>,
}

impl LinkFilter for RatingFilter {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        if let Some(rating) = self.rating {
            links.retain(|link| link.rating == Some(rating));
        }
        links
    }
}

/// Keeps links without a rating
#[derive(Debug, Clone, Default)]
pub struct UnratedFilter {
    pub active: bool,
}

impl LinkFilter for UnratedFilter {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        if self.active {
            links.retain(|link| link.rating.is_none());
        }
        links
    }
}

/// Keeps links whose URL contains the site text
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    pub site: Option<String>,
}

impl LinkFilter for SiteFilter {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        if let Some(site) = self.site.as_deref().filter(|s| !s.is_empty()) {
            links.retain(|link| link.url.contains(site));
        }
        links
    }
}

/// Case-insensitive text search
#[derive(Debug, Clone, Default)]
pub struct TextFilter {
    pub text: Option<String>,
}

impl LinkFilter for TextFilter {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        let Some(needle) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return links;
        };
        let needle = needle.to_lowercase();
        let found = |haystack: &str| haystack.to_lowercase().contains(&needle);

        links.retain(|link| {
            link.title.as_deref().is_some_and(found)
                || link.tags.iter().any(|t| found(t))
                || found(&link.url)
        });
        links
    }
}

/// Keeps or drops links depending on whether a local artifact exists
pub struct AvailabilityFilter<'l> {
    pub availability: Availability,
    pub lookup: &'l dyn ArtifactLookup,
}

impl LinkFilter for AvailabilityFilter<'_> {
    fn apply<'a>(&self, mut links: Vec<&'a Link>) -> Vec<&'a Link> {
        match self.availability {
            Availability::Any => {}
            Availability::Present => links.retain(|link| self.lookup.has_artifact(link)),
            Availability::Absent => links.retain(|link| !self.lookup.has_artifact(link)),
        }
        links
    }
}

/// The ordered filter sequence plus sort settings
pub struct FilterPipeline<'l> {
    filters: Vec<Box<dyn LinkFilter + 'l>>,
    order_by: OrderBy,
    reversed: bool,
}

impl<'l> FilterPipeline<'l> {
    /// Build the pipeline for saved filters
    pub fn from_filters(filters: &Filters, lookup: &'l dyn ArtifactLookup) -> Self {
        let (rating, unrated) = match filters.rating {
            Some(RatingSelector::Exactly(r)) => (Some(r), false),
            Some(RatingSelector::Unrated) => (None, true),
            None => (None, false),
        };
        let mode = if filters.combine_tags {
            TagMode::All
        } else {
            TagMode::Any
        };

        let stages: Vec<Box<dyn LinkFilter + 'l>> = vec![
            Box::new(HiddenTagsFilter {
                hidden: filters.hidden_tag_list(),
            }),
            Box::new(TagFilter {
                tags: filters.tags.clone(),
                mode,
            }),
            Box::new(RatingFilter { rating }),
            Box::new(UnratedFilter { active: unrated }),
            Box::new(SiteFilter {
                site: filters.site.clone(),
            }),
            Box::new(TextFilter {
                text: filters.text.clone(),
            }),
            Box::new(AvailabilityFilter {
                availability: filters.availability,
                lookup,
            }),
        ];

        Self {
            filters: stages,
            order_by: filters.order_by,
            reversed: filters.reversed,
        }
    }

    /// Filter then sort `links`
    pub fn apply<'a>(&self, links: &'a [Link]) -> Vec<&'a Link> {
        let mut selected: Vec<&Link> = links.iter().collect();
        for filter in &self.filters {
            selected = filter.apply(selected);
        }
        sort_links(&mut selected, self.order_by, self.reversed);
        selected
    }
}

fn by_title(a: &Link, b: &Link) -> Ordering {
    a.display_title()
        .to_lowercase()
        .cmp(&b.display_title().to_lowercase())
}

/// Sort in place; `reversed` flips the final order
pub fn sort_links(links: &mut [&Link], order_by: OrderBy, reversed: bool) {
    match order_by {
        // None sorts below Some, so descending puts unrated links last
        OrderBy::Rating => links.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| by_title(a, b))),
        OrderBy::Time => links.sort_by(|a, b| b.date_time.cmp(&a.date_time)),
        OrderBy::Title => links.sort_by(|a, b| by_title(a, b)),
        OrderBy::Random => links.shuffle(&mut rand::thread_rng()),
        OrderBy::Views => links.sort_by(|a, b| {
            b.open_counter
                .cmp(&a.open_counter)
                .then_with(|| b.rating.cmp(&a.rating))
                .then_with(|| by_title(a, b))
        }),
        OrderBy::Tags => {
            links.sort_by(|a, b| a.tags.first().cmp(&b.tags.first()).then_with(|| by_title(a, b)))
        }
    }

    if reversed {
        links.reverse();
    }
}

/// Distinct host names of all links, sorted
pub fn available_sites(links: &[Link]) -> Vec<String> {
    links
        .iter()
        .filter_map(|link| Url::parse(&link.url).ok())
        .filter_map(|url| url.host_str().map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Ratings in use, highest first, followed by `Unrated` if any link lacks one
pub fn available_ratings(links: &[Link]) -> Vec<RatingSelector> {
    let rated: BTreeSet<u8> = links.iter().filter_map(|link| link.rating).collect();
    let mut ratings: Vec<RatingSelector> =
        rated.into_iter().rev().map(RatingSelector::Exactly).collect();
    if links.iter().any(|link| link.rating.is_none()) {
        ratings.push(RatingSelector::Unrated);
    }
    ratings
}

/// Distinct tags of all links, sorted
pub fn available_tags(links: &[Link]) -> Vec<String> {
    links
        .iter()
        .flat_map(|link| link.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
