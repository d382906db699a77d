use regex::Regex;
use std::sync::OnceLock;

use super::{unpack, UnpackError};
use crate::url::normalize_image_url;

fn pix_var() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"var\s+pix\s*=\s*["']([^"']+)["']"#).expect("pix pattern is valid")
    })
}

fn pvalue_array() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"pvalue\s*=\s*\[([^\]]+)\]").expect("pvalue pattern is valid")
    })
}

fn image_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["']([^"']+\.(?:jpg|jpeg|png|webp|gif)[^"']*)["']"#)
            .expect("image path pattern is valid")
    })
}

/// Builds absolute image URLs from an unpacked image script
///
/// The script declares the CDN prefix as `var pix="..."` and the relative
/// image paths as `pvalue=[...]`.
pub fn extract_image_urls(unpacked: &str) -> Result<Vec<String>, UnpackError> {
    let base = pix_var()
        .captures(unpacked)
        .map(|caps| caps[1].to_string())
        .ok_or(UnpackError::MissingImageTable)?;
    let table = pvalue_array()
        .captures(unpacked)
        .map(|caps| caps[1].to_string())
        .ok_or(UnpackError::MissingImageTable)?;

    let urls: Vec<String> = image_path()
        .captures_iter(&table)
        .filter_map(|caps| normalize_image_url(&format!("{}{}", base, &caps[1])))
        .collect();

    if urls.is_empty() {
        return Err(UnpackError::MissingImageTable);
    }
    Ok(urls)
}

/// Unpacks an image-API response and returns every image URL it lists
pub fn unpack_image_urls(script: &str) -> Result<Vec<String>, UnpackError> {
    let unpacked = unpack(script)?;
    extract_image_urls(&unpacked)
}

/// Applies the pagination selection policy to one API response
///
/// Each response lists the previous and the current page. The first call of
/// a chapter keeps both, later calls keep only the current one. Responses
/// with a single image are kept as they are.
pub fn select_page_images(urls: Vec<String>, first_call: bool) -> Vec<String> {
    if urls.len() < 2 {
        return urls;
    }
    if first_call {
        urls.into_iter().take(2).collect()
    } else {
        urls.into_iter().skip(1).take(1).collect()
    }
}
