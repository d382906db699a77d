//! Search result scoring shared by all connectors

use std::collections::HashSet;

use crate::model::CatalogEntry;
use crate::url::{last_segment, strip_query};

pub const EXACT_MATCH: u32 = 100;
pub const PREFIX_MATCH: u32 = 50;
pub const SUBSTRING_MATCH: u32 = 20;
pub const SLUG_MATCH: u32 = 10;

/// What to do with candidates that do not match the query at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankPolicy {
    /// The source returned an unfiltered page; drop non-matches
    DropUnmatched,
    /// The source already filtered; keep non-matches after the matches
    KeepUnmatched,
}

/// Scores a title (and optional slug) against a query, case-insensitively
///
/// Exact title > title prefix > title substring > slug substring > nothing.
pub fn score(title: &str, slug: Option<&str>, query: &str) -> u32 {
    let query = query.trim().to_lowercase();
    let title = title.trim().to_lowercase();

    if title == query {
        EXACT_MATCH
    } else if title.starts_with(&query) {
        PREFIX_MATCH
    } else if title.contains(&query) {
        SUBSTRING_MATCH
    } else if slug.is_some_and(|slug| slug_matches(slug, &query)) {
        SLUG_MATCH
    } else {
        0
    }
}

fn slug_matches(slug: &str, query: &str) -> bool {
    let slug = slug.to_lowercase();
    slug.contains(query)
        || slug.contains(&query.replace(' ', "-"))
        || slug.contains(&query.replace(' ', "_"))
}

/// Orders search candidates by relevance
///
/// Candidates are de-duplicated by canonical URL (first occurrence wins) and
/// sorted by descending score; equal scores keep their original order.
pub fn rank(
    candidates: Vec<CatalogEntry>,
    query: &str,
    policy: RankPolicy,
    limit: Option<usize>,
) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    let mut scored: Vec<(u32, CatalogEntry)> = candidates
        .into_iter()
        .filter(|entry| seen.insert(strip_query(&entry.url)))
        .map(|entry| {
            let slug = last_segment(&entry.url);
            (score(&entry.title, slug.as_deref(), query), entry)
        })
        .filter(|(score, _)| policy == RankPolicy::KeepUnmatched || *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let ranked = scored.into_iter().map(|(_, entry)| entry);
    match limit {
        Some(limit) => ranked.take(limit).collect(),
        None => ranked.collect(),
    }
}
