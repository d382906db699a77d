use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::{ChapterKey, SeriesKey, SourceId};

/// A series as returned by a connector's listing or search
///
/// Identity is the key, which already includes the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: SeriesKey,
    pub title: String,
    /// Canonical series page on the source
    pub url: String,
    pub language: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub cover_url: Option<String>,
}

impl CatalogEntry {
    pub fn new(key: SeriesKey, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            url: url.into(),
            language: "en".to_string(),
            genres: Vec::new(),
            adult: false,
            cover_url: None,
        }
    }

    pub fn source(&self) -> SourceId {
        self.key.source()
    }
}

/// Numeric chapter order key
///
/// Ordered with `f64::total_cmp`, so "10.5" sorts between 10 and 11.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterNumber(pub f64);

impl ChapterNumber {
    /// Parses "12", "10.5" or "012"; returns None for anything else
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ChapterNumber)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for ChapterNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ChapterNumber {}

impl PartialOrd for ChapterNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChapterNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as i64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One downloadable chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub key: ChapterKey,
    pub title: String,
    pub number: ChapterNumber,
    pub url: String,
    pub series: SeriesKey,
    /// Alternate links for the same chapter number, tried when `url` fails
    #[serde(default)]
    pub fallback_urls: Vec<String>,
}

/// One logical page: the primary image URL plus ordered alternates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub url: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Page the image must appear to be requested from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

impl PageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fallbacks: Vec::new(),
            referer: None,
        }
    }

    pub fn with_fallbacks(url: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            url: url.into(),
            fallbacks,
            referer: None,
        }
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Primary URL first, then the fallbacks in order
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.url.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

/// Descriptive metadata for a series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesDetails {
    pub description: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub authors: Vec<String>,
    pub cover_url: Option<String>,
}
