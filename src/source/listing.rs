//! Listing and search page parsing shared by the `/manga/{slug}` sites

use scraper::{ElementRef, Html};

use super::{element_text, manga_slug, selector, title_from_slug};
use crate::model::{CatalogEntry, SeriesKey};
use crate::url::absolutize;

/// Directory cards: one title link per series
///
/// The link's `title` attribute wins over its (often truncated) text.
pub(crate) fn parse_directory(
    html: &str,
    base_url: &str,
    css: &str,
    key: impl Fn(String) -> SeriesKey,
) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    let Ok(links) = selector(css) else {
        return Vec::new();
    };

    document
        .select(&links)
        .filter_map(|link| {
            let url = absolutize(link.value().attr("href")?, base_url)?;
            let slug = manga_slug(&url)?;
            let title = link
                .value()
                .attr("title")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| element_text(link));
            let canonical = format!("{}/manga/{}", base_url, slug);
            Some(CatalogEntry::new(key(slug), title, canonical))
        })
        .collect()
}

/// Every `/manga/{slug}` anchor of a search page, in document order
///
/// Titles of two characters or less (icons, cover links) are replaced by
/// the slug in title case. Genre links next to the anchor become genres.
pub(crate) fn parse_series_anchors(
    html: &str,
    base_url: &str,
    key: impl Fn(String) -> SeriesKey,
) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    let (Ok(anchors), Ok(genre_links)) = (selector("a[href]"), selector(r#"a[href*="/genre/"]"#))
    else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains("/manga/") || href.trim_end_matches('/').ends_with("/manga") {
            continue;
        }
        let Some(slug) = absolutize(href, base_url).and_then(|url| manga_slug(&url)) else {
            continue;
        };

        let text = element_text(anchor);
        let title = if text.chars().count() > 2 {
            text
        } else {
            title_from_slug(&slug)
        };

        let genres = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| {
                parent
                    .select(&genre_links)
                    .map(element_text)
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let canonical = format!("{}/manga/{}", base_url, slug);
        let mut entry = CatalogEntry::new(key(slug), title, canonical);
        entry.genres = genres;
        entries.push(entry);
    }
    entries
}
