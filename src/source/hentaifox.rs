//! HentaiFox: gallery listings where every gallery is a single chapter

use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

use super::{
    all_texts, element_text, find_cover, first_text, key_mismatch, rank, selector,
    ConnectorResult, CoverRules, RankPolicy,
};
use crate::config::{HentaiFoxConfig, HttpConfig, ProbeConfig};
use crate::http::{FetchError, HttpClient};
use crate::model::{
    CatalogEntry, Chapter, ChapterKey, ChapterNumber, PageRef, SeriesDetails, SeriesKey, SourceId,
};
use crate::probe::{CdnProbe, PageCountResolver, PageUrlPattern};
use crate::url::absolutize;

/// Listing pages walked by the catalog
const CATALOG_PAGES: u32 = 10;

const COVER_RULES: CoverRules<'static> = CoverRules {
    selectors: &["div.cover img", "div.gallery_top img"],
    keywords: &["cover"],
    min_length: 10,
};

/// What a gallery page tells about its images
#[derive(Debug, Default, PartialEq)]
struct GalleryInfo {
    title: Option<String>,
    tags: Vec<String>,
    authors: Vec<String>,
    page_count: Option<u32>,
    /// Directory holding the page images, without trailing slash
    image_base: Option<String>,
    cover_url: Option<String>,
}

#[derive(Debug)]
pub struct HentaiFox {
    client: HttpClient,
    config: HentaiFoxConfig,
    resolver: PageCountResolver,
}

impl HentaiFox {
    pub fn new(
        config: &HentaiFoxConfig,
        http: &HttpConfig,
        probe: &ProbeConfig,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(http)?,
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

    fn gallery_url(&self, gallery_id: u64) -> String {
        format!("{}/gallery/{}/", self.base_url(), gallery_id)
    }

    fn gallery_id(&self, key: &SeriesKey) -> ConnectorResult<u64> {
        match key {
            SeriesKey::HentaiFox { gallery_id } => Ok(*gallery_id),
            other => Err(key_mismatch(SourceId::HentaiFox, other.source())),
        }
    }

    pub(crate) async fn catalog(&self, limit: Option<usize>) -> ConnectorResult<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=CATALOG_PAGES {
            let url = if page == 1 {
                format!("{}/", self.base_url())
            } else {
                format!("{}/pag/{}/", self.base_url(), page)
            };
            let html = match self.client.get_text(&url).await {
                Ok(html) => html,
                Err(e) if page == 1 => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("HentaiFox listing page {} failed: {}", page, e);
                    break;
                }
            };

            let found = parse_gallery_cards(&html, self.base_url());
            if found.is_empty() {
                break;
            }
            entries.extend(found.into_iter().filter(|e| seen.insert(e.key.clone())));
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
        let url = Url::parse_with_params(
            &format!("{}/search/", self.base_url()),
            &[("q", query), ("sort", "latest"), ("page", "1")],
        )
        .map_err(|_| FetchError::InvalidUrl(self.base_url().to_string()))?;

        let html = self.client.get_text(url.as_str()).await?;
        let cards = parse_gallery_cards(&html, self.base_url());
        Ok(rank(cards, query, RankPolicy::KeepUnmatched, limit))
    }

    /// A gallery is one chapter; fetching it confirms the gallery exists
    pub(crate) async fn chapters(&self, series: &SeriesKey) -> ConnectorResult<Vec<Chapter>> {
        let gallery_id = self.gallery_id(series)?;
        let url = self.gallery_url(gallery_id);
        self.client.get_text(&url).await?;

        Ok(vec![Chapter {
            key: ChapterKey::HentaiFox { gallery_id },
            title: "Complete Gallery".to_string(),
            number: ChapterNumber(1.0),
            url,
            series: series.clone(),
            fallback_urls: Vec::new(),
        }])
    }

    /// Page count from the gallery page, else probed against the image directory
    pub(crate) async fn pages(&self, chapter: &Chapter) -> ConnectorResult<Vec<PageRef>> {
        let ChapterKey::HentaiFox { gallery_id } = chapter.key else {
            return Err(key_mismatch(SourceId::HentaiFox, chapter.key.source()));
        };

        let gallery_url = self.gallery_url(gallery_id);
        let html = self.client.get_text(&gallery_url).await?;
        let info = parse_gallery(&html, &gallery_url);

        let image_base = info.image_base.unwrap_or_else(|| {
            format!(
                "{}/{}",
                self.config.image_base_url.trim_end_matches('/'),
                gallery_id
            )
        });
        let extension = self.predict_extension(&image_base).await;

        let pattern = PageUrlPattern::new(format!("{}/", image_base), extension);
        let count = self
            .resolver
            .resolve(info.page_count, &CdnProbe::new(&self.client, pattern.clone()))
            .await;

        Ok((1..=count)
            .map(|page| PageRef::new(pattern.url(page)).referer(gallery_url.clone()))
            .collect())
    }

    /// Full-size images are `.jpg` when page 1 exists as such, `.webp` otherwise
    async fn predict_extension(&self, image_base: &str) -> &'static str {
        if self.client.exists(&format!("{}/1.jpg", image_base)).await {
            ".jpg"
        } else {
            ".webp"
        }
    }

    pub(crate) async fn details(&self, series: &SeriesKey) -> ConnectorResult<SeriesDetails> {
        let url = self.gallery_url(self.gallery_id(series)?);
        let html = self.client.get_text(&url).await?;
        let info = parse_gallery(&html, &url);
        if let Some(title) = &info.title {
            tracing::debug!("Gallery {} is '{}'", url, title);
        }

        Ok(SeriesDetails {
            genres: info.tags,
            authors: info.authors,
            cover_url: info.cover_url,
            ..SeriesDetails::default()
        })
    }
}

fn gallery_href() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/gallery/(\d+)").expect("gallery pattern is valid"))
}

fn category_href() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/category/([^/]+)").expect("category pattern is valid"))
}

fn first_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").expect("number pattern is valid"))
}

/// Gallery cards of a listing or search page
///
/// Each card is `div.thumb > div.caption > h2.g_title > a`; the cover sits
/// in the thumb container and the category in `h3.g_cat`.
fn parse_gallery_cards(html: &str, base_url: &str) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    let (Ok(titles), Ok(link), Ok(cover), Ok(category)) = (
        selector("h2.g_title"),
        selector("a[href]"),
        selector("img[data-src]"),
        selector("h3.g_cat a[href]"),
    ) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for title in document.select(&titles) {
        let Some(anchor) = title.select(&link).next() else {
            continue;
        };
        let Some(gallery_id) = anchor
            .value()
            .attr("href")
            .and_then(|href| gallery_href().captures(href))
            .and_then(|caps| caps[1].parse::<u64>().ok())
        else {
            continue;
        };

        let mut containers = title
            .ancestors()
            .filter_map(ElementRef::wrap)
            .filter(|element| element.value().name() == "div");
        let caption = containers.next();
        let thumb = containers.next();

        let mut entry = CatalogEntry::new(
            SeriesKey::HentaiFox { gallery_id },
            element_text(title),
            format!("{}/gallery/{}/", base_url, gallery_id),
        );
        entry.adult = true;
        entry.cover_url = thumb
            .and_then(|thumb| thumb.select(&cover).next())
            .and_then(|img| img.value().attr("data-src"))
            .and_then(|src| absolutize(src, base_url));
        entry.genres = caption
            .and_then(|caption| caption.select(&category).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| category_href().captures(href))
            .map(|caps| vec![caps[1].to_string()])
            .unwrap_or_default();
        entries.push(entry);
    }
    entries
}

fn parse_gallery(html: &str, page_url: &str) -> GalleryInfo {
    let document = Html::parse_document(html);

    let page_count = first_text(&document, &["span.i_text.pages"])
        .and_then(|text| first_number().captures(&text)?[1].parse().ok());

    let image_base = selector("img[data-src]").ok().and_then(|images| {
        let src = document.select(&images).next()?.value().attr("data-src")?;
        let absolute = absolutize(src, page_url)?;
        let (base, _) = absolute.rsplit_once('/')?;
        Some(base.to_string())
    });

    GalleryInfo {
        title: first_text(&document, &["div.info h1"]),
        tags: all_texts(&document, "a.tag_btn")
            .into_iter()
            .map(|tag| tag.trim_end_matches(|c: char| c.is_ascii_digit()).trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        authors: all_texts(&document, "ul.artists a.tag_btn")
            .into_iter()
            .map(|author| author.trim_end_matches(|c: char| c.is_ascii_digit()).trim().to_string())
            .collect(),
        page_count,
        image_base,
        cover_url: find_cover(&document, page_url, &COVER_RULES),
    }
}
