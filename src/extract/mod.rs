//! Image extraction from fetched page responses
//!
//! A page URL does not always answer with the image itself. Some answer
//! with a packed script, others with an HTML reader page. Extraction is an
//! ordered chain of strategies; the first one that yields URLs wins.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

use crate::http::FetchedResponse;
use crate::unpack::{is_packed, unpack_image_urls};
use crate::url::absolutize;

/// URL fragments of images that are never page content
const REJECTED_MARKERS: &[&str] = &["thumb", "logo", "avatar", "icon", "banner"];

const LAZY_ATTRIBUTES: &[&str] = &["data-src", "data-lazy-src", "data-original"];

/// One way of finding page images in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The response is the image
    DirectImage,
    /// The response is a packed script listing the images
    PackedScript,
    /// `<img src>` tags and CDN image URLs in the markup
    HtmlImageTag,
    /// Lazy-loading attributes such as `data-src`
    LazyAttribute,
}

pub const DEFAULT_CHAIN: [ExtractionStrategy; 4] = [
    ExtractionStrategy::DirectImage,
    ExtractionStrategy::PackedScript,
    ExtractionStrategy::HtmlImageTag,
    ExtractionStrategy::LazyAttribute,
];

impl ExtractionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::DirectImage => "direct-image",
            ExtractionStrategy::PackedScript => "packed-script",
            ExtractionStrategy::HtmlImageTag => "html-image-tag",
            ExtractionStrategy::LazyAttribute => "lazy-attribute",
        }
    }

    /// Image URLs found by this strategy, best candidate first
    pub fn apply(&self, page: &FetchedResponse) -> Option<Vec<String>> {
        let urls = match self {
            ExtractionStrategy::DirectImage => {
                if page.is_image() {
                    vec![page.final_url.clone()]
                } else {
                    Vec::new()
                }
            }
            ExtractionStrategy::PackedScript => packed_script_images(&page.text()),
            ExtractionStrategy::HtmlImageTag => html_image_tags(&page.text(), &page.final_url),
            ExtractionStrategy::LazyAttribute => lazy_attribute_images(&page.text(), &page.final_url),
        };
        (!urls.is_empty()).then_some(urls)
    }
}

/// Runs the chain and returns the first successful strategy with its URLs
pub fn extract_images(
    page: &FetchedResponse,
    chain: &[ExtractionStrategy],
) -> Option<(ExtractionStrategy, Vec<String>)> {
    chain.iter().find_map(|strategy| {
        strategy.apply(page).map(|urls| {
            tracing::debug!(
                "Extracted {} image URL(s) from {} via {}",
                urls.len(),
                page.final_url,
                strategy.name()
            );
            (*strategy, urls)
        })
    })
}

/// A packed response lists `[previous, current]`; the current page comes first here
fn packed_script_images(text: &str) -> Vec<String> {
    if !is_packed(text) {
        return Vec::new();
    }
    match unpack_image_urls(text) {
        Ok(mut urls) => {
            urls.reverse();
            urls
        }
        Err(e) => {
            tracing::debug!("Packed script did not yield images: {}", e);
            Vec::new()
        }
    }
}

fn cdn_image_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:https?:)?//[^"'\s<>]*cdn[^"'\s<>]*\.(?:jpg|jpeg|png|webp|gif)"#)
            .expect("cdn image pattern is valid")
    })
}

fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    [".jpg", ".jpeg", ".png", ".webp", ".gif"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

fn is_rejected(url: &str) -> bool {
    let lower = url.to_lowercase();
    REJECTED_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}

fn html_image_tags(text: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(text);
    let mut cdn = Vec::new();
    let mut other = Vec::new();

    if let Ok(images) = Selector::parse("img[src]") {
        for img in document.select(&images) {
            let Some(url) = img
                .value()
                .attr("src")
                .and_then(|src| absolutize(src, page_url))
            else {
                continue;
            };
            if !has_image_extension(&url) || is_rejected(&url) {
                continue;
            }
            if url.contains("cdn") {
                push_unique(&mut cdn, url);
            } else {
                push_unique(&mut other, url);
            }
        }
    }

    // Image arrays embedded in inline scripts
    for found in cdn_image_url().find_iter(text) {
        if let Some(url) = absolutize(found.as_str(), page_url) {
            if !is_rejected(&url) {
                push_unique(&mut cdn, url);
            }
        }
    }

    for url in other {
        push_unique(&mut cdn, url);
    }
    cdn
}

fn lazy_attribute_images(text: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(text);
    let Ok(elements) = Selector::parse("img, picture, source") else {
        return Vec::new();
    };

    let mut urls = Vec::new();
    for element in document.select(&elements) {
        for attribute in LAZY_ATTRIBUTES {
            if let Some(url) = element
                .value()
                .attr(attribute)
                .and_then(|src| absolutize(src, page_url))
            {
                if has_image_extension(&url) && !is_rejected(&url) {
                    push_unique(&mut urls, url);
                }
            }
        }
    }
    urls
}
