//! FanFox: chapter images come from a paginated, packed-script API
//!
//! The chapter page declares `chapterid` and `imagecount`. Images are then
//! requested one API page at a time from `chapterfun.ashx`; every answer is
//! a packed script listing the previous and the current image.

use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use super::listing::{parse_directory, parse_series_anchors};
use super::{
    all_texts, collate, element_text, find_cover, first_text, key_mismatch, rank, selector,
    ConnectorError, ConnectorResult, CoverRules, RankPolicy, RawChapterLink,
};
use crate::config::{FanFoxConfig, HttpConfig, ProbeConfig};
use crate::extract::{extract_images, DEFAULT_CHAIN};
use crate::http::{header_map, FetchError, FetchedResponse, HttpClient};
use crate::model::{
    CatalogEntry, Chapter, ChapterKey, PageRef, SeriesDetails, SeriesKey, SourceId,
};
use crate::unpack::{select_page_images, unpack_image_urls};
use crate::url::absolutize;

const DIRECTORY_LINKS: &str =
    "ul.manga-list-1-list li p.manga-list-1-item-title a, div.manga-list-1 ul li p.manga-list-1-item-title a";

/// Directory pages walked by the catalog
const DIRECTORY_PAGES: u32 = 5;

const COVER_RULES: CoverRules<'static> = CoverRules {
    selectors: &["img.detail-info-cover-img", "div.detail-info-cover img"],
    keywords: &["cover", "mfcdn"],
    min_length: 10,
};

#[derive(Debug)]
pub struct FanFox {
    client: HttpClient,
    config: FanFoxConfig,
    sanity_ceiling: u32,
}

impl FanFox {
    pub fn new(
        config: &FanFoxConfig,
        http: &HttpConfig,
        probe: &ProbeConfig,
    ) -> Result<Self, FetchError> {
        let client = HttpClient::new(http)?;
        client.add_cookie("isAdult=1; Path=/", &config.base_url)?;

        Ok(Self {
            client,
            config: config.clone(),
            sanity_ceiling: probe.sanity_ceiling,
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn series_url(&self, slug: &str) -> String {
        format!("{}/manga/{}/", self.base_url(), slug)
    }

    fn slug<'k>(&self, key: &'k SeriesKey) -> ConnectorResult<&'k str> {
        match key {
            SeriesKey::FanFox { slug } => Ok(slug),
            other => Err(key_mismatch(SourceId::FanFox, other.source())),
        }
    }

    pub(crate) async fn catalog(&self, limit: Option<usize>) -> ConnectorResult<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=DIRECTORY_PAGES {
            let url = format!("{}/directory/{}.htm", self.base_url(), page);
            let html = match self.client.get_text(&url).await {
                Ok(html) => html,
                Err(e) if page == 1 => return Err(e.into()),
                Err(e) => {
                    tracing::debug!("FanFox directory ends at page {}: {}", page, e);
                    break;
                }
            };

            let found = parse_directory(&html, self.base_url(), DIRECTORY_LINKS, fanfox_key);
            if found.is_empty() {
                break;
            }
            entries.extend(found.into_iter().filter(|e| seen.insert(e.url.clone())));
            if limit.is_some_and(|limit| entries.len() >= limit) {
                break;
            }
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
            &[("title", terms.as_str())],
        )
        .map_err(|_| FetchError::InvalidUrl(self.base_url().to_string()))?;
        let html = self.client.get_text(url.as_str()).await?;

        let candidates = parse_series_anchors(&html, self.base_url(), fanfox_key);
        Ok(rank(candidates, query, RankPolicy::DropUnmatched, limit))
    }

    pub(crate) async fn chapters(&self, series: &SeriesKey) -> ConnectorResult<Vec<Chapter>> {
        let slug = self.slug(series)?;
        let html = self.client.get_text(&self.series_url(slug)).await?;

        let links = parse_chapter_links(&html, self.base_url(), slug);
        Ok(collate(links)
            .into_iter()
            .filter_map(|group| {
                let (path, _) = chapter_path(&group.primary.url, slug)?;
                let number = group.primary.number;
                Some(Chapter {
                    key: ChapterKey::FanFox {
                        slug: slug.to_string(),
                        path,
                    },
                    title: format!("Chapter {}", number),
                    number,
                    url: group.primary.url,
                    series: series.clone(),
                    fallback_urls: group.fallback_urls,
                })
            })
            .collect())
    }

    /// Walks `chapterfun.ashx` pages until `imagecount` images are known
    ///
    /// Stops early when a call adds nothing new or the sanity ceiling is
    /// reached. Chapter pages without a chapter id go through the image
    /// extraction chain instead.
    pub(crate) async fn pages(&self, chapter: &Chapter) -> ConnectorResult<Vec<PageRef>> {
        let ChapterKey::FanFox { slug, path } = &chapter.key else {
            return Err(key_mismatch(SourceId::FanFox, chapter.key.source()));
        };

        let chapter_page = self.client.fetch(&chapter.url, None).await?;
        let vars = ChapterVars::parse(&chapter_page.text());
        let Some(chapter_id) = vars.chapter_id else {
            tracing::debug!("No chapter id on {}, scanning the page itself", chapter.url);
            return self.extracted_pages(&chapter_page, &chapter.url);
        };

        let wanted = vars
            .image_count
            .filter(|n| *n > 0)
            .unwrap_or(self.sanity_ceiling)
            .min(self.sanity_ceiling) as usize;
        let headers = header_map(&[
            ("x-requested-with", "XMLHttpRequest".to_string()),
            ("referer", chapter.url.clone()),
        ]);
        let api_base = format!("{}/manga/{}/{}/chapterfun.ashx", self.base_url(), slug, path);

        let mut urls: Vec<String> = Vec::new();
        let mut call = 1u32;
        while urls.len() < wanted && call <= self.sanity_ceiling {
            let api_url = format!("{}?cid={}&page={}&key=", api_base, chapter_id, call);
            let response = match self.client.fetch(&api_url, Some(&headers)).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Image API call {} failed for {}: {}", call, chapter.title, e);
                    break;
                }
            };

            let found = match unpack_image_urls(&response.text()) {
                Ok(listed) => select_page_images(listed, call == 1),
                Err(e) => {
                    tracing::debug!("Image API call {} was not unpackable: {}", call, e);
                    extract_images(&response, &DEFAULT_CHAIN)
                        .map(|(_, urls)| urls.into_iter().take(1).collect())
                        .unwrap_or_default()
                }
            };

            let before = urls.len();
            for url in found {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
            if urls.len() == before {
                tracing::debug!("Image API call {} added nothing new, stopping", call);
                break;
            }
            call += 1;
        }

        urls.truncate(wanted);
        if urls.is_empty() {
            return Err(ConnectorError::parse(format!("no images resolved for {}", chapter.title)));
        }
        Ok(urls
            .into_iter()
            .map(|url| PageRef::new(url).referer(chapter.url.clone()))
            .collect())
    }

    fn extracted_pages(
        &self,
        page: &FetchedResponse,
        referer: &str,
    ) -> ConnectorResult<Vec<PageRef>> {
        let (strategy, urls) = extract_images(page, &DEFAULT_CHAIN)
            .ok_or_else(|| {
                ConnectorError::parse(format!("no chapter id or images on {}", referer))
            })?;
        tracing::debug!("Chapter images found via {}", strategy.name());
        Ok(urls
            .into_iter()
            .map(|url| PageRef::new(url).referer(referer))
            .collect())
    }

    pub(crate) async fn details(&self, series: &SeriesKey) -> ConnectorResult<SeriesDetails> {
        let url = self.series_url(self.slug(series)?);
        let html = self.client.get_text(&url).await?;
        Ok(parse_details(&html, &url))
    }
}

fn fanfox_key(slug: String) -> SeriesKey {
    SeriesKey::FanFox { slug }
}

fn chapter_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^c(\d+(?:\.\d+)?)$").expect("chapter segment pattern is valid"))
}

fn chapter_id_var() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"var\s+chapterid\s*=\s*(\d+)").expect("chapterid pattern is valid")
    })
}

fn image_count_var() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"var\s+imagecount\s*=\s*(\d+)").expect("imagecount pattern is valid")
    })
}

/// Script variables declared by a chapter reader page
#[derive(Debug, Default, PartialEq, Eq)]
struct ChapterVars {
    chapter_id: Option<u64>,
    image_count: Option<u32>,
}

impl ChapterVars {
    fn parse(html: &str) -> Self {
        Self {
            chapter_id: chapter_id_var()
                .captures(html)
                .and_then(|caps| caps[1].parse().ok()),
            image_count: image_count_var()
                .captures(html)
                .and_then(|caps| caps[1].parse().ok()),
        }
    }
}

/// Splits `.../manga/{slug}/v01/c003/1.html` into (`v01/c003`, `003`)
fn chapter_path(url: &str, slug: &str) -> Option<(String, String)> {
    let (_, rest) = url.split_once(&format!("/manga/{}/", slug))?;
    let segments: Vec<&str> = rest.split(['/', '?', '#']).collect();
    let index = segments
        .iter()
        .position(|segment| chapter_segment().is_match(segment))?;
    let number = chapter_segment().captures(segments[index])?[1].to_string();
    Some((segments[..=index].join("/"), number))
}

fn parse_chapter_links(html: &str, base_url: &str, slug: &str) -> Vec<RawChapterLink> {
    let document = Html::parse_document(html);
    let Ok(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&anchors)
        .filter_map(|anchor| {
            let url = absolutize(anchor.value().attr("href")?, base_url)?;
            let (_, raw) = chapter_path(&url, slug)?;
            let link = RawChapterLink::new(&raw, url)?;
            let text = element_text(anchor);
            Some(if text.is_empty() { link } else { link.with_title(text) })
        })
        .collect()
}

fn parse_details(html: &str, page_url: &str) -> SeriesDetails {
    let document = Html::parse_document(html);
    SeriesDetails {
        description: first_text(&document, &["p.fullcontent", "div.detail-info-right-content"]),
        status: first_text(&document, &["span.detail-info-right-title-tip"]),
        genres: all_texts(&document, "p.detail-info-right-tag-list a"),
        authors: all_texts(&document, "p.detail-info-right-say a"),
        cover_url: find_cover(&document, page_url, &COVER_RULES),
    }
}
