//! OmegaScans: JSON API with an HTML fallback for series details

use regex::Regex;
use scraper::Html;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use super::{
    collate, find_cover, first_text, key_mismatch, rank, ChapterGroup, ConnectorError,
    ConnectorResult, CoverRules, RankPolicy, RawChapterLink,
};
use crate::config::{HttpConfig, OmegaScansConfig};
use crate::http::{FetchError, HttpClient};
use crate::model::{
    CatalogEntry, Chapter, ChapterKey, PageRef, SeriesDetails, SeriesKey, SourceId,
};
use crate::url::{absolutize, join_path, last_segment};

/// Catalog size scanned when the search endpoint gives nothing
const LOCAL_SEARCH_POOL: usize = 200;

const COVER_RULES: CoverRules<'static> = CoverRules {
    selectors: &[
        r#"img[src*="media.omegascans.org/series"][src*="/cover"]"#,
        "img.series-poster",
        "img.manga-poster",
        "img.series-cover",
        r#"img[src*="media.omegascans.org"]"#,
        r#"img[src*="_next/image"]"#,
        ".series-info img:first-of-type",
        "[data-cover] img",
        r#"img[alt*="series" i]"#,
    ],
    keywords: &["media.omegascans.org"],
    min_length: 15,
};

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".series-description",
    ".manga-description",
    ".summary",
    r#"p[class*="description"]"#,
];

#[derive(Debug, Deserialize)]
struct SeriesPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    id: u64,
    title: String,
    series_slug: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    adult: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SeasonListing {
    #[serde(default)]
    seasons: Vec<Season>,
}

#[derive(Debug, Deserialize)]
struct Season {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    chapters: Vec<ApiChapter>,
}

#[derive(Debug, Deserialize)]
struct ChapterPage {
    #[serde(default)]
    data: Vec<ApiChapter>,
}

#[derive(Debug, Deserialize)]
struct ApiChapter {
    chapter_name: String,
    #[serde(default)]
    chapter_title: Option<String>,
    chapter_slug: String,
}

#[derive(Debug, Deserialize)]
struct ChapterResponse {
    #[serde(default)]
    paywall: Option<bool>,
    #[serde(default)]
    data: Option<Vec<ApiImage>>,
    #[serde(default)]
    chapter: Option<ChapterInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ChapterInfo {
    #[serde(default)]
    chapter_type: Option<String>,
    #[serde(default)]
    storage: Option<String>,
    #[serde(default)]
    chapter_data: Option<ChapterData>,
}

#[derive(Debug, Default, Deserialize)]
struct ChapterData {
    #[serde(default)]
    images: Vec<ApiImage>,
}

/// Images come either as bare strings or as `{src}` / `{url}` objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiImage {
    Plain(String),
    Object {
        #[serde(default)]
        src: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl ApiImage {
    fn location(&self) -> Option<&str> {
        match self {
            ApiImage::Plain(url) => Some(url.as_str()),
            ApiImage::Object { src, url } => src.as_deref().or(url.as_deref()),
        }
        .map(str::trim)
        .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    data: Option<ApiDetails>,
}

#[derive(Debug, Deserialize)]
struct ApiDetails {
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    authors: Vec<Named>,
}

/// Tags are either plain names or `{name}` objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Named {
    Plain(String),
    Object { name: String },
}

impl Named {
    fn into_name(self) -> String {
        match self {
            Named::Plain(name) | Named::Object { name } => name,
        }
    }
}

#[derive(Debug)]
pub struct OmegaScans {
    client: HttpClient,
    config: OmegaScansConfig,
}

impl OmegaScans {
    pub fn new(config: &OmegaScansConfig, http: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(http)?,
            config: config.clone(),
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn api_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn series_url(&self, slug: &str) -> String {
        format!("{}/series/{}", self.base_url(), slug)
    }

    async fn api<T: DeserializeOwned>(&self, url: &str) -> ConnectorResult<T> {
        Ok(self.client.get_json(url).await?)
    }

    fn entries_from(&self, page: SeriesPage, adult: Option<bool>) -> Vec<CatalogEntry> {
        page.data
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<ApiSeries>(value) {
                Ok(series) => Some(series),
                Err(e) => {
                    tracing::debug!("Skipping malformed OmegaScans series: {}", e);
                    None
                }
            })
            .map(|series| {
                let mut entry = CatalogEntry::new(
                    SeriesKey::OmegaScans {
                        id: series.id,
                        slug: series.series_slug.clone(),
                    },
                    series.title,
                    self.series_url(&series.series_slug),
                );
                entry.adult = adult.or(series.adult).unwrap_or(false);
                entry.cover_url = series
                    .thumbnail
                    .as_deref()
                    .and_then(|thumb| absolutize(thumb, self.base_url()));
                entry
            })
            .collect()
    }

    /// Walks the paged listing, adult titles first
    pub(crate) async fn catalog(&self, limit: Option<usize>) -> ConnectorResult<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for adult in [true, false] {
            for page in 1..=self.config.catalog_pages {
                let url = format!(
                    "{}/query?perPage=100&page={}&adult={}",
                    self.api_url(),
                    page,
                    adult
                );
                let listing = match self.api::<SeriesPage>(&url).await {
                    Ok(listing) => listing,
                    Err(e) => {
                        tracing::warn!(
                            "OmegaScans catalog page {} (adult={}) failed: {}",
                            page,
                            adult,
                            e
                        );
                        break;
                    }
                };

                let found = self.entries_from(listing, Some(adult));
                if found.is_empty() {
                    break;
                }
                tracing::debug!(
                    "Retrieved {} series from page {} (adult={})",
                    found.len(),
                    page,
                    adult
                );
                entries.extend(found.into_iter().filter(|e| seen.insert(e.key.clone())));

                if let Some(limit) = limit {
                    if entries.len() >= limit {
                        entries.truncate(limit);
                        return Ok(entries);
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Search endpoint first, then a title filter over part of the catalog
    pub(crate) async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> ConnectorResult<Vec<CatalogEntry>> {
        match self.search_api(query).await {
            Ok(found) if !found.is_empty() => {
                return Ok(rank(found, query, RankPolicy::KeepUnmatched, limit));
            }
            Ok(_) => tracing::info!(
                "OmegaScans search found nothing for '{}', filtering the catalog",
                query
            ),
            Err(e) => tracing::warn!(
                "OmegaScans search failed for '{}', filtering the catalog: {}",
                query,
                e
            ),
        }

        let pool = self.catalog(Some(LOCAL_SEARCH_POOL)).await?;
        Ok(rank(pool, query, RankPolicy::DropUnmatched, limit))
    }

    async fn search_api(&self, query: &str) -> ConnectorResult<Vec<CatalogEntry>> {
        let mut url = Url::parse(self.api_url())
            .map_err(|_| FetchError::InvalidUrl(self.api_url().to_string()))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.api_url().to_string()))?
            .pop_if_empty()
            .push("query")
            .push(query);

        let listing: SeriesPage = self.api(url.as_str()).await?;
        Ok(self.entries_from(listing, None))
    }

    /// Season listing first, then the flat chapter query
    pub(crate) async fn chapters(&self, series: &SeriesKey) -> ConnectorResult<Vec<Chapter>> {
        let SeriesKey::OmegaScans { id, slug } = series else {
            return Err(key_mismatch(SourceId::OmegaScans, series.source()));
        };

        let links = match self.season_chapters(slug).await {
            Ok(links) if !links.is_empty() => links,
            Ok(_) => self.queried_chapters(*id, slug).await?,
            Err(e) => {
                tracing::debug!("Season listing failed for {}, using chapter query: {}", slug, e);
                self.queried_chapters(*id, slug).await?
            }
        };

        Ok(order_chapters(links)
            .into_iter()
            .filter_map(|group| {
                let chapter_slug = last_segment(&group.primary.url)?;
                let number = group.primary.number;
                Some(Chapter {
                    key: ChapterKey::OmegaScans {
                        series_slug: slug.clone(),
                        chapter_slug,
                    },
                    title: group
                        .primary
                        .title
                        .unwrap_or_else(|| format!("Chapter {}", number)),
                    number,
                    url: group.primary.url,
                    series: series.clone(),
                    fallback_urls: group.fallback_urls,
                })
            })
            .collect())
    }

    async fn season_chapters(&self, slug: &str) -> ConnectorResult<Vec<RawChapterLink>> {
        let url = format!("{}/series/{}", self.api_url(), slug);
        let listing: SeasonListing = self.api(&url).await?;
        let multi_season = listing.seasons.len() > 1;

        Ok(listing
            .seasons
            .into_iter()
            .flat_map(|season| {
                let prefix = if multi_season {
                    format!("S{} ", season.index)
                } else {
                    String::new()
                };
                let index = season.index;
                season
                    .chapters
                    .into_iter()
                    .map(move |chapter| (index, prefix.clone(), chapter))
            })
            .map(|(index, prefix, chapter)| self.chapter_link(slug, &prefix, chapter, index))
            .collect())
    }

    async fn queried_chapters(&self, id: u64, slug: &str) -> ConnectorResult<Vec<RawChapterLink>> {
        let url = format!(
            "{}/chapter/query?series_id={}&perPage=9999&page=1",
            self.api_url(),
            id
        );
        let page: ChapterPage = self.api(&url).await?;
        Ok(page
            .data
            .into_iter()
            .map(|chapter| self.chapter_link(slug, "", chapter, 0))
            .collect())
    }

    fn chapter_link(
        &self,
        slug: &str,
        prefix: &str,
        chapter: ApiChapter,
        season: u32,
    ) -> RawChapterLink {
        let url = format!("{}/{}", self.series_url(slug), chapter.chapter_slug);
        let link = match parse_chapter_number(&chapter.chapter_name)
            .and_then(|raw| RawChapterLink::new(raw, url.clone()))
        {
            Some(link) => link,
            None => {
                tracing::debug!("No chapter number in '{}'", chapter.chapter_name);
                RawChapterLink::unnumbered(url)
            }
        };

        let title = format!(
            "{}{} {}",
            prefix,
            chapter.chapter_name.trim(),
            chapter.chapter_title.as_deref().unwrap_or("").trim()
        );
        link.in_season(season).with_title(title.trim())
    }

    pub(crate) async fn pages(&self, chapter: &Chapter) -> ConnectorResult<Vec<PageRef>> {
        let ChapterKey::OmegaScans {
            series_slug,
            chapter_slug,
        } = &chapter.key
        else {
            return Err(key_mismatch(SourceId::OmegaScans, chapter.key.source()));
        };

        let url = format!("{}/chapter/{}/{}", self.api_url(), series_slug, chapter_slug);
        let response: ChapterResponse = self.api(&url).await?;
        image_pages(response, &chapter.title, self.api_url())
    }

    /// API record first; the HTML series page when the API has nothing
    pub(crate) async fn details(&self, series: &SeriesKey) -> ConnectorResult<SeriesDetails> {
        let SeriesKey::OmegaScans { id, slug } = series else {
            return Err(key_mismatch(SourceId::OmegaScans, series.source()));
        };

        let api_url = format!("{}/query/{}", self.api_url(), id);
        match self.api::<DetailsResponse>(&api_url).await {
            Ok(DetailsResponse { data: Some(details) }) => {
                return Ok(self.details_from_api(details));
            }
            Ok(_) => tracing::debug!("OmegaScans API has no details for {}", series),
            Err(e) => {
                tracing::warn!("OmegaScans details API failed for {}, scraping: {}", series, e)
            }
        }

        let page_url = self.series_url(slug);
        let html = self.client.get_text(&page_url).await?;
        Ok(parse_details_page(&html, &page_url))
    }

    fn details_from_api(&self, details: ApiDetails) -> SeriesDetails {
        SeriesDetails {
            description: details.description.filter(|d| !d.trim().is_empty()),
            status: details.status.filter(|s| !s.trim().is_empty()),
            genres: details.genres.into_iter().map(Named::into_name).collect(),
            authors: details.authors.into_iter().map(Named::into_name).collect(),
            cover_url: details
                .thumbnail
                .as_deref()
                .and_then(|thumb| absolutize(thumb, self.base_url())),
        }
    }
}

fn chapter_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("chapter number pattern is valid"))
}

fn labelled_chapter_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)chapter\s*(\d+(?:\.\d+)?)").expect("labelled chapter pattern is valid")
    })
}

/// The number after "Chapter" when the word is present, else the first number
fn parse_chapter_number(name: &str) -> Option<&str> {
    labelled_chapter_number()
        .captures(name)
        .or_else(|| chapter_number().captures(name))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Collates numbered chapters per season; unnumbered ones are kept as
/// their own chapters, ahead of chapter 1 of their season
fn order_chapters(links: Vec<RawChapterLink>) -> Vec<ChapterGroup> {
    let (numbered, unnumbered): (Vec<_>, Vec<_>) = links
        .into_iter()
        .partition(|link| !link.raw_number.is_empty());

    let mut groups = collate(numbered);
    groups.extend(unnumbered.into_iter().map(|primary| ChapterGroup {
        primary,
        fallback_urls: Vec::new(),
    }));
    groups.sort_by_key(|group| (group.primary.season, group.primary.number));
    groups
}

/// Turns a chapter payload into page references
///
/// # Errors
///
/// * `Paywall` - the chapter is locked
/// * `UnsupportedContent` - the chapter is a text novel
/// * `Parse` - no images in the payload
fn image_pages(
    response: ChapterResponse,
    title: &str,
    api_url: &str,
) -> ConnectorResult<Vec<PageRef>> {
    if response.paywall.unwrap_or(false) {
        tracing::warn!("Chapter {} is paywalled", title);
        return Err(ConnectorError::Paywall(format!("{} requires a login or purchase", title)));
    }

    let info = response.chapter.unwrap_or_default();
    if info
        .chapter_type
        .as_deref()
        .is_some_and(|kind| kind.eq_ignore_ascii_case("novel"))
    {
        return Err(ConnectorError::UnsupportedContent(format!("{} is a novel chapter", title)));
    }

    let images = match response.data {
        Some(images) if !images.is_empty() => images,
        _ => info.chapter_data.map(|data| data.images).unwrap_or_default(),
    };
    if images.is_empty() {
        return Err(ConnectorError::parse(format!("no images listed for {}", title)));
    }

    let local = info.storage.as_deref() == Some("local");
    Ok(images
        .iter()
        .filter_map(ApiImage::location)
        .map(|location| {
            if let Some(rest) = location.strip_prefix("//") {
                format!("https://{}", rest)
            } else if local && !location.starts_with("http") {
                join_path(api_url, location)
            } else {
                location.to_string()
            }
        })
        .map(PageRef::new)
        .collect())
}

fn parse_details_page(html: &str, page_url: &str) -> SeriesDetails {
    let document = Html::parse_document(html);
    SeriesDetails {
        description: first_text(&document, DESCRIPTION_SELECTORS),
        cover_url: find_cover(&document, page_url, &COVER_RULES),
        ..SeriesDetails::default()
    }
}
