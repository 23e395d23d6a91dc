//! Tag and site facet handlers

use anyhow::Result;

use linkvault_core::filter::{available_ratings, available_sites, available_tags};
use linkvault_core::{Link, RatingSelector, SessionStore};

use crate::output::Output;

/// List all tags with usage counts
pub fn list(store: &SessionStore, output: &Output) -> Result<()> {
    output.print_tags(&tag_counts(store.links()));
    Ok(())
}

/// List the host names links point at
pub fn sites(store: &SessionStore, output: &Output) -> Result<()> {
    output.print_values(&available_sites(store.links()));
    Ok(())
}

/// List the ratings in use, best first
pub fn ratings(store: &SessionStore, output: &Output) -> Result<()> {
    let ratings: Vec<String> = available_ratings(store.links())
        .into_iter()
        .map(|r| match r {
            RatingSelector::Exactly(n) => n.to_string(),
            RatingSelector::Unrated => "unrated".to_string(),
        })
        .collect();
    output.print_values(&ratings);
    Ok(())
}

fn tag_counts(links: &[Link]) -> Vec<(String, usize)> {
    available_tags(links)
        .into_iter()
        .map(|tag| {
            let count = links.iter().filter(|l| l.has_tag(&tag)).count();
            (tag, count)
        })
        .collect()
}
