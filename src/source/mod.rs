//! Source connectors
//!
//! Each supported website is one variant of [`Connector`]. All variants
//! share the same contract:
//!
//! - `list_catalog` / `search` return [`CatalogEntry`] values whose keys can
//!   be handed straight back to the same connector
//! - `list_chapters` returns chapters sorted ascending by number, with
//!   duplicate links folded into fallbacks
//! - `list_pages` returns page references in reading order
//! - `get_details` returns description, status, genres and cover
//!
//! The public operations are fail-soft: transport and parse failures are
//! logged and turn into empty results. Only `list_pages` reports paywalled
//! or unsupported chapters, since callers must tell "locked" from "empty".
//!
//! HTML is parsed in synchronous helpers that return owned data, so no
//! document is held across an `.await` and connector futures stay `Send`.

mod chapters;
mod cover;
mod error;
mod fanfox;
mod hentaifox;
mod listing;
mod mangahub;
mod omegascans;
mod relevance;

pub use chapters::{collate, ChapterGroup, RawChapterLink};
pub use cover::{find_cover, is_non_cover, normalize_cover_url, CoverRules};
pub use error::ConnectorError;
pub use fanfox::FanFox;
pub use hentaifox::HentaiFox;
pub use mangahub::MangaHub;
pub use omegascans::OmegaScans;
pub use relevance::{rank, score, RankPolicy};

use scraper::{ElementRef, Html, Selector};

use crate::config::Config;
use crate::http::{FetchError, HttpClient};
use crate::model::{CatalogEntry, Chapter, PageRef, SeriesDetails, SeriesKey, SourceId};

/// Result type for connector internals
pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// One configured source
#[derive(Debug)]
pub enum Connector {
    MangaHub(MangaHub),
    OmegaScans(OmegaScans),
    HentaiFox(HentaiFox),
    FanFox(FanFox),
}

impl Connector {
    /// Builds the connector for `id` from its configuration section
    ///
    /// Adult-content cookies and headers are installed here, once.
    pub fn from_config(id: SourceId, config: &Config) -> Result<Self, FetchError> {
        let http = &config.http;
        let probe = &config.probe;
        let sources = &config.sources;

        Ok(match id {
            SourceId::MangaHub => {
                Connector::MangaHub(MangaHub::new(&sources.mangahub, http, probe)?)
            }
            SourceId::OmegaScans => {
                Connector::OmegaScans(OmegaScans::new(&sources.omegascans, http)?)
            }
            SourceId::HentaiFox => {
                Connector::HentaiFox(HentaiFox::new(&sources.hentaifox, http, probe)?)
            }
            SourceId::FanFox => Connector::FanFox(FanFox::new(&sources.fanfox, http, probe)?),
        })
    }

    pub fn id(&self) -> SourceId {
        match self {
            Connector::MangaHub(_) => SourceId::MangaHub,
            Connector::OmegaScans(_) => SourceId::OmegaScans,
            Connector::HentaiFox(_) => SourceId::HentaiFox,
            Connector::FanFox(_) => SourceId::FanFox,
        }
    }

    /// The HTTP session (cookies, headers, rate limit) of this source
    pub fn client(&self) -> &HttpClient {
        match self {
            Connector::MangaHub(c) => c.client(),
            Connector::OmegaScans(c) => c.client(),
            Connector::HentaiFox(c) => c.client(),
            Connector::FanFox(c) => c.client(),
        }
    }

    /// Lists series from the source's directory, up to `limit`
    pub async fn list_catalog(&self, limit: Option<usize>) -> Vec<CatalogEntry> {
        let result = match self {
            Connector::MangaHub(c) => c.catalog(limit).await,
            Connector::OmegaScans(c) => c.catalog(limit).await,
            Connector::HentaiFox(c) => c.catalog(limit).await,
            Connector::FanFox(c) => c.catalog(limit).await,
        };
        self.soften("list_catalog", result)
    }

    /// Searches the source and returns entries ordered by relevance
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Vec<CatalogEntry> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let result = match self {
            Connector::MangaHub(c) => c.search(query, limit).await,
            Connector::OmegaScans(c) => c.search(query, limit).await,
            Connector::HentaiFox(c) => c.search(query, limit).await,
            Connector::FanFox(c) => c.search(query, limit).await,
        };
        let entries = self.soften("search", result);
        tracing::info!(
            "{} returned {} result(s) for '{}'",
            self.id().display_name(),
            entries.len(),
            query
        );
        entries
    }

    /// Lists the chapters of a series, ascending by chapter number
    pub async fn list_chapters(&self, series: &SeriesKey) -> Vec<Chapter> {
        let result = match self {
            Connector::MangaHub(c) => c.chapters(series).await,
            Connector::OmegaScans(c) => c.chapters(series).await,
            Connector::HentaiFox(c) => c.chapters(series).await,
            Connector::FanFox(c) => c.chapters(series).await,
        };
        let chapters = self.soften("list_chapters", result);
        let fallbacks: usize = chapters.iter().map(|c| c.fallback_urls.len()).sum();
        tracing::info!(
            "Found {} chapter(s) for {} ({} fallback URL(s))",
            chapters.len(),
            series,
            fallbacks
        );
        chapters
    }

    /// Lists the page images of a chapter in reading order
    ///
    /// # Errors
    ///
    /// Only [`ConnectorError::Paywall`] and
    /// [`ConnectorError::UnsupportedContent`]; every other failure is logged
    /// and yields an empty list.
    pub async fn list_pages(&self, chapter: &Chapter) -> Result<Vec<PageRef>, ConnectorError> {
        let result = match self {
            Connector::MangaHub(c) => c.pages(chapter).await,
            Connector::OmegaScans(c) => c.pages(chapter).await,
            Connector::HentaiFox(c) => c.pages(chapter).await,
            Connector::FanFox(c) => c.pages(chapter).await,
        };

        match result {
            Ok(pages) => {
                tracing::info!("Resolved {} page(s) for {}", pages.len(), chapter.title);
                Ok(pages)
            }
            Err(e) if e.degrades_to_empty() => {
                tracing::warn!(
                    "{} list_pages failed for {}: {}",
                    self.id().display_name(),
                    chapter.key,
                    e
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetches series metadata; missing fields stay empty
    pub async fn get_details(&self, series: &SeriesKey) -> SeriesDetails {
        let result = match self {
            Connector::MangaHub(c) => c.details(series).await,
            Connector::OmegaScans(c) => c.details(series).await,
            Connector::HentaiFox(c) => c.details(series).await,
            Connector::FanFox(c) => c.details(series).await,
        };
        self.soften("get_details", result)
    }

    fn soften<T: Default>(&self, operation: &str, result: ConnectorResult<T>) -> T {
        result.unwrap_or_else(|e| {
            tracing::warn!("{} {} failed: {}", self.id().display_name(), operation, e);
            T::default()
        })
    }
}

/// Parses a CSS selector, reporting failures as parse errors
pub(crate) fn selector(css: &str) -> ConnectorResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ConnectorError::parse(format!("bad selector '{}': {:?}", css, e)))
}

/// Text content of an element with whitespace collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching any of the selectors, in order
pub(crate) fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Texts of every element matching the selector, empty ones skipped
pub(crate) fn all_texts(document: &Html, css: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    let mut texts: Vec<String> = Vec::new();
    for text in document.select(&selector).map(element_text) {
        if !text.is_empty() && !texts.contains(&text) {
            texts.push(text);
        }
    }
    texts
}

/// Series slug following `/manga/` in a URL
pub(crate) fn manga_slug(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/manga/")?;
    let slug = rest.split(['/', '?', '#']).next()?.trim();
    (!slug.is_empty()).then(|| slug.to_string())
}

/// `one-piece_color` -> `One Piece Color`
pub(crate) fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the key-mismatch error for a connector handed a foreign key
pub(crate) fn key_mismatch(expected: SourceId, found: SourceId) -> ConnectorError {
    ConnectorError::KeyMismatch { expected, found }
}
