//! Cross-source result merging and adult-content filtering

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{CatalogEntry, SourceId};
use crate::source::score;
use crate::url::last_segment;

const STOP_WORDS: [&str; 5] = ["the", "a", "an", "of", "and"];

const ADULT_GENRES: [&str; 7] = [
    "hentai", "adult", "mature", "smut", "ecchi", "erotica", "18+",
];

const ADULT_TITLE_KEYWORDS: [&str; 4] = ["hentai", "xxx", "18+", "nsfw"];

/// A catalog entry with its relevance against the merged query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub relevance: u32,
    #[serde(flatten)]
    pub entry: CatalogEntry,
}

/// Title key used to recognise the same series on different sources
///
/// Lowercased, punctuation turned into spaces, stop words removed.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether an entry should be hidden when adult filtering is on
pub fn is_adult_entry(entry: &CatalogEntry) -> bool {
    if entry.adult || entry.source().is_adult_only() {
        return true;
    }

    let adult_genre = entry.genres.iter().any(|genre| {
        let genre = genre.trim().to_lowercase();
        ADULT_GENRES.contains(&genre.as_str())
    });

    let title = entry.title.to_lowercase();
    adult_genre
        || ADULT_TITLE_KEYWORDS
            .iter()
            .any(|keyword| title.contains(keyword))
}

/// Merges per-source results into one ranked list
///
/// Entries whose normalized titles collide are folded together; the copy
/// with the higher relevance wins, then the one from the higher-priority
/// source. The output is ordered by relevance, source priority and title.
pub fn merge_results(
    results: Vec<(SourceId, Vec<CatalogEntry>)>,
    query: &str,
    limit: usize,
) -> Vec<ScoredEntry> {
    let mut best: HashMap<String, ScoredEntry> = HashMap::new();

    for entry in results.into_iter().flat_map(|(_, entries)| entries) {
        let slug = last_segment(&entry.url);
        let relevance = score(&entry.title, slug.as_deref(), query);
        let candidate = ScoredEntry { relevance, entry };
        let key = normalize_title(&candidate.entry.title);

        match best.get(&key) {
            Some(current) if !outranks(&candidate, current) => {}
            _ => {
                best.insert(key, candidate);
            }
        }
    }

    let mut merged: Vec<ScoredEntry> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.relevance
            .cmp(&a.relevance)
            .then_with(|| a.entry.source().priority().cmp(&b.entry.source().priority()))
            .then_with(|| a.entry.title.to_lowercase().cmp(&b.entry.title.to_lowercase()))
    });
    merged.truncate(limit);
    merged
}

fn outranks(candidate: &ScoredEntry, current: &ScoredEntry) -> bool {
    (candidate.relevance, std::cmp::Reverse(candidate.entry.source().priority()))
        > (current.relevance, std::cmp::Reverse(current.entry.source().priority()))
}
