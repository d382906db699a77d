//! MangaHub: HTML listings, page images synthesized from a CDN pattern
//!
//! Chapter pages never list their images. Page `n` of chapter `c` lives at
//! `{cdn}/{slug}/{c}/{n}.jpg`, so the page count comes from the chapter page
//! markup when it is there and from CDN probing otherwise.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use super::listing::{parse_directory, parse_series_anchors};
use super::{
    all_texts, collate, element_text, find_cover, first_text, key_mismatch, rank, selector,
    ConnectorError, ConnectorResult, CoverRules, RankPolicy, RawChapterLink,
};
use crate::config::{HttpConfig, MangaHubConfig, ProbeConfig};
use crate::http::{header_map, FetchError, HttpClient};
use crate::model::{
    CatalogEntry, Chapter, ChapterKey, PageRef, SeriesDetails, SeriesKey, SourceId,
};
use crate::probe::{CdnProbe, PageCountResolver, PageUrlPattern};
use crate::url::absolutize;

const COVER_RULES: CoverRules<'static> = CoverRules {
    selectors: &[
        "div.detail-info-cover img",
        "img.manga-cover-img",
        "img.series-cover",
        r#"img[src*="cover"][src*="media"]"#,
        "div.manga-cover img",
        r#"img[alt*="cover" i]"#,
        "div.detail-info img:first-of-type",
    ],
    keywords: &["cover", "thumb", "poster", "mghcdn"],
    min_length: 10,
};

const DIRECTORY_LINKS: &str = "div.manga-list-1 ul li p.manga-list-1-item-title a";

/// Ways of reading the page count off a chapter page, tried in order
const PAGE_COUNT_STRATEGIES: [fn(&Html) -> Option<u32>; 5] = [
    count_from_page_select,
    count_from_pagination_links,
    count_from_reader_images,
    count_from_script,
    count_from_data_attributes,
];

#[derive(Debug)]
pub struct MangaHub {
    client: HttpClient,
    config: MangaHubConfig,
    resolver: PageCountResolver,
}

impl MangaHub {
    /// Builds the connector with the adult-content cookie and header installed
    pub fn new(
        config: &MangaHubConfig,
        http: &HttpConfig,
        probe: &ProbeConfig,
    ) -> Result<Self, FetchError> {
        let client = HttpClient::with_headers(
            http,
            header_map(&[("x-cookie", "isAdult=1".to_string())]),
        )?;
        client.add_cookie("isAdult=1; Path=/", &config.base_url)?;

        Ok(Self {
            client,
            config: config.clone(),
            resolver: PageCountResolver::new(probe.clone()),
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn series_url(&self, slug: &str) -> String {
        format!("{}/manga/{}", self.base_url(), slug)
    }

    fn slug<'k>(&self, key: &'k SeriesKey) -> ConnectorResult<&'k str> {
        match key {
            SeriesKey::MangaHub { slug } => Ok(slug),
            other => Err(key_mismatch(SourceId::MangaHub, other.source())),
        }
    }

    pub(crate) async fn catalog(&self, limit: Option<usize>) -> ConnectorResult<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.config.directory_pages {
            let url = format!("{}/directory/{}.htm", self.base_url(), page);
            let html = match self.client.get_text(&url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Failed to fetch directory page {}: {}", page, e);
                    break;
                }
            };

            let found = parse_directory(&html, self.base_url(), DIRECTORY_LINKS, mangahub_key);
            if found.is_empty() {
                break;
            }
            entries.extend(found.into_iter().filter(|e| seen.insert(e.url.clone())));
            if limit.is_some_and(|limit| entries.len() >= limit) {
                break;
            }
        }

        if entries.is_empty() {
            tracing::info!("MangaHub directory is empty, falling back to a generic search");
            entries = self.search("manga", limit).await?;
        }

        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub(crate) async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> ConnectorResult<Vec<CatalogEntry>> {
        let terms = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let url = Url::parse_with_params(
            &format!("{}/search", self.base_url()),
            &[("q", terms.as_str())],
        )
        .map_err(|_| FetchError::InvalidUrl(self.base_url().to_string()))?;
        let html = self.client.get_text(url.as_str()).await?;

        let candidates = parse_series_anchors(&html, self.base_url(), mangahub_key);
        tracing::debug!("MangaHub search page yielded {} candidate(s)", candidates.len());
        Ok(rank(candidates, query, RankPolicy::DropUnmatched, limit))
    }

    pub(crate) async fn chapters(&self, series: &SeriesKey) -> ConnectorResult<Vec<Chapter>> {
        let slug = self.slug(series)?;
        let html = self.client.get_text(&self.series_url(slug)).await?;

        let links = parse_chapter_links(&html, self.base_url(), slug);
        Ok(collate(links)
            .into_iter()
            .map(|group| {
                let number = group.primary.number;
                Chapter {
                    key: ChapterKey::MangaHub {
                        slug: slug.to_string(),
                        number: number.to_string(),
                    },
                    title: format!("Chapter {}", number),
                    number,
                    url: group.primary.url,
                    series: series.clone(),
                    fallback_urls: group.fallback_urls,
                }
            })
            .collect())
    }

    /// Page count: chapter markup, then CDN probing per domain, then the fallback
    pub(crate) async fn pages(&self, chapter: &Chapter) -> ConnectorResult<Vec<PageRef>> {
        let ChapterKey::MangaHub { slug, number } = &chapter.key else {
            return Err(key_mismatch(SourceId::MangaHub, chapter.key.source()));
        };
        if self.config.cdn_domains.is_empty() {
            return Err(ConnectorError::parse("no CDN domains configured"));
        }

        let hint = match self.client.get_text(&chapter.url).await {
            Ok(html) => page_count_hint(&html),
            Err(e) => {
                tracing::debug!("Chapter page unavailable, probing the CDN instead: {}", e);
                None
            }
        };

        let patterns: Vec<PageUrlPattern> = self
            .config
            .cdn_domains
            .iter()
            .map(|cdn| PageUrlPattern::chapter_images(cdn, slug, number))
            .collect();
        let probes: Vec<CdnProbe<'_>> = patterns
            .iter()
            .map(|pattern| CdnProbe::new(&self.client, pattern.clone()))
            .collect();

        let (primary, count) = self.resolver.resolve_with_mirrors(hint, &probes).await;
        tracing::info!(
            "Using CDN {} for {} ({} pages)",
            self.config.cdn_domains[primary],
            chapter.title,
            count
        );

        Ok((1..=count)
            .map(|page| {
                let fallbacks = patterns
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != primary)
                    .map(|(_, pattern)| pattern.url(page))
                    .collect();
                PageRef::with_fallbacks(patterns[primary].url(page), fallbacks)
            })
            .collect())
    }

    pub(crate) async fn details(&self, series: &SeriesKey) -> ConnectorResult<SeriesDetails> {
        let url = self.series_url(self.slug(series)?);
        let html = self.client.get_text(&url).await?;
        Ok(parse_details(&html, &url))
    }
}

fn mangahub_key(slug: String) -> SeriesKey {
    SeriesKey::MangaHub { slug }
}

fn chapter_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/chapter-(\d+(?:\.\d+)?)").expect("chapter pattern is valid"))
}

fn page_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"page=(\d+)").expect("page parameter pattern is valid"))
}

fn script_page_count() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:totalPages|pageCount|pages)["\s:=]+(\d+)"#)
            .expect("script page count pattern is valid")
    })
}

/// Chapter anchors of one series, in document order
fn parse_chapter_links(html: &str, base_url: &str, slug: &str) -> Vec<RawChapterLink> {
    let document = Html::parse_document(html);
    let Ok(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&anchors)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            if !href.contains("/chapter/") || !href.contains(slug) {
                return None;
            }
            let raw = chapter_number().captures(href)?.get(1)?.as_str().to_string();
            let url = absolutize(href, base_url)?;
            let link = RawChapterLink::new(&raw, url)?;
            let text = element_text(anchor);
            Some(if text.is_empty() { link } else { link.with_title(text) })
        })
        .collect()
}

/// Page count advertised by a chapter page, if any strategy finds one
pub(crate) fn page_count_hint(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    PAGE_COUNT_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(&document).filter(|n| *n > 0))
}

fn count_from_page_select(document: &Html) -> Option<u32> {
    let select = selector(r#"select[name="page"], select.page-select, .page-select select"#).ok()?;
    let options = selector("option").ok()?;

    let dropdown = document.select(&select).next()?;
    let values: Vec<ElementRef<'_>> = dropdown.select(&options).collect();
    let last = values.last()?;
    last.value()
        .attr("value")
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| u32::try_from(values.len()).ok())
}

fn count_from_pagination_links(document: &Html) -> Option<u32> {
    let links = selector(r#"a[href*="page="], .page-link, .pagination a"#).ok()?;
    document
        .select(&links)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| page_param().captures(href)?.get(1)?.as_str().parse().ok())
        .max()
}

fn count_from_reader_images(document: &Html) -> Option<u32> {
    let images = selector("img[data-src], img[data-lazy], .chapter-image, .page-image").ok()?;
    u32::try_from(document.select(&images).count()).ok()
}

fn count_from_script(document: &Html) -> Option<u32> {
    let scripts = selector("script").ok()?;
    document.select(&scripts).find_map(|script| {
        let code: String = script.text().collect();
        script_page_count().captures(&code)?.get(1)?.as_str().parse().ok()
    })
}

fn count_from_data_attributes(document: &Html) -> Option<u32> {
    let tagged = selector("[data-pages], [data-total-pages], [data-image-count]").ok()?;
    let element = document.select(&tagged).next()?;
    ["data-pages", "data-total-pages", "data-image-count"]
        .iter()
        .find_map(|name| element.value().attr(name)?.trim().parse().ok())
}

fn parse_details(html: &str, page_url: &str) -> SeriesDetails {
    let document = Html::parse_document(html);
    SeriesDetails {
        description: first_text(&document, &["div.manga-content p", "div.detail-info .summary"]),
        status: first_text(
            &document,
            &[r#"[class*="status"] span"#, ".detail-info .status"],
        ),
        genres: all_texts(&document, ".detail-info .genres a, .manga-content .genres a"),
        authors: all_texts(&document, ".detail-info .author a, .manga-content .author a"),
        cover_url: find_cover(&document, page_url, &COVER_RULES),
    }
}
