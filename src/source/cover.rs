//! Cover image discovery on series pages

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::url::absolutize;

/// URL fragments of assets that are never series covers
const NON_COVER_MARKERS: &[&str] = &["avatar", "logo", "icon", "badge", "favicon"];

/// Images scanned by the keyword fallback
const SCAN_LIMIT: usize = 100;

/// Where to look for a cover on one source's series page
#[derive(Debug, Clone, Copy)]
pub struct CoverRules<'a> {
    /// CSS selectors tried in order; the first usable match wins
    pub selectors: &'a [&'a str],
    /// Fallback scan accepts any image whose URL contains one of these
    pub keywords: &'a [&'a str],
    /// Shorter references are ignored as placeholders
    pub min_length: usize,
}

/// Finds the cover image URL in a series page
pub fn find_cover(document: &Html, page_url: &str, rules: &CoverRules<'_>) -> Option<String> {
    for css in rules.selectors {
        let selector = match Selector::parse(css) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::debug!("Skipping cover selector '{}': {:?}", css, e);
                continue;
            }
        };

        if let Some(url) = document
            .select(&selector)
            .next()
            .and_then(|img| usable_cover(img, page_url, rules.min_length))
        {
            tracing::debug!("Found cover via selector '{}'", css);
            return Some(url);
        }
    }

    let images = Selector::parse("img").ok()?;
    document
        .select(&images)
        .take(SCAN_LIMIT)
        .filter(|img| {
            image_source(*img).is_some_and(|src| {
                let src = src.to_lowercase();
                rules.keywords.iter().any(|keyword| src.contains(keyword))
            })
        })
        .find_map(|img| usable_cover(img, page_url, rules.min_length))
}

fn image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    let element = img.value();
    element
        .attr("src")
        .filter(|src| !src.trim().is_empty() && !src.starts_with("data:"))
        .or_else(|| element.attr("data-src"))
        .or_else(|| element.attr("data-lazy-src"))
}

fn usable_cover(img: ElementRef<'_>, page_url: &str, min_length: usize) -> Option<String> {
    let src = image_source(img)?;
    if src.trim().len() < min_length {
        return None;
    }
    let url = normalize_cover_url(src, page_url)?;
    (!is_non_cover(&url)).then_some(url)
}

/// Resolves a cover reference, unwrapping Next.js `/_next/image?url=` proxies
pub fn normalize_cover_url(src: &str, page_url: &str) -> Option<String> {
    let absolute = absolutize(src, page_url)?;
    if !absolute.contains("/_next/image") {
        return Some(absolute);
    }

    let parsed = Url::parse(&absolute).ok()?;
    let inner = parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned());

    match inner {
        Some(inner) => absolutize(&inner, page_url),
        None => Some(absolute),
    }
}

/// Whether a URL points at an avatar, logo, icon or similar site asset
pub fn is_non_cover(url: &str) -> bool {
    let lower = url.to_lowercase();
    NON_COVER_MARKERS.iter().any(|marker| lower.contains(marker))
}
