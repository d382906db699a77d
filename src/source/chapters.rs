//! Chapter list normalization
//!
//! Series pages often link the same chapter several times (list entry,
//! "latest" box, mirrors). Links are grouped by season and chapter number,
//! the shortest URL becomes the primary and the rest are kept as fallbacks.

use std::collections::BTreeMap;

use crate::model::ChapterNumber;

/// One chapter link as scraped, before grouping
#[derive(Debug, Clone, PartialEq)]
pub struct RawChapterLink {
    pub number: ChapterNumber,
    /// Number exactly as written in the link, e.g. "012" or "10.5"
    pub raw_number: String,
    pub url: String,
    pub title: Option<String>,
    /// Season index for sources whose numbering restarts per season; 0 otherwise
    pub season: u32,
}

impl RawChapterLink {
    pub fn new(raw_number: &str, url: impl Into<String>) -> Option<Self> {
        Some(Self {
            number: ChapterNumber::parse(raw_number)?,
            raw_number: raw_number.to_string(),
            url: url.into(),
            title: None,
            season: 0,
        })
    }

    /// A chapter whose name carries no number, ordered before chapter 1
    pub fn unnumbered(url: impl Into<String>) -> Self {
        Self {
            number: ChapterNumber(0.0),
            raw_number: String::new(),
            url: url.into(),
            title: None,
            season: 0,
        }
    }

    pub fn in_season(mut self, season: u32) -> Self {
        self.season = season;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// All links sharing one season and chapter number
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterGroup {
    pub primary: RawChapterLink,
    pub fallback_urls: Vec<String>,
}

/// Groups links by `(season, chapter number)`, ascending
///
/// Within a group links are ordered by `(url length, url)`; the first one is
/// primary. Duplicate URLs are dropped.
pub fn collate(links: Vec<RawChapterLink>) -> Vec<ChapterGroup> {
    let mut groups: BTreeMap<(u32, ChapterNumber), Vec<RawChapterLink>> = BTreeMap::new();
    for link in links {
        groups.entry((link.season, link.number)).or_default().push(link);
    }

    groups
        .into_values()
        .filter_map(|mut links| {
            links.sort_by(|a, b| (a.url.len(), &a.url).cmp(&(b.url.len(), &b.url)));
            links.dedup_by(|a, b| a.url == b.url);

            let mut links = links.into_iter();
            let primary = links.next()?;
            Some(ChapterGroup {
                primary,
                fallback_urls: links.map(|link| link.url).collect(),
            })
        })
        .collect()
}
