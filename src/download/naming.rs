//! File names for downloaded series, chapters and pages

use crate::model::Chapter;

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that are invalid in file names with `_`
///
/// Leading and trailing dots and whitespace are trimmed. An empty result
/// becomes `untitled`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Number of decimal digits in `n` (at least 1)
pub fn digit_count(n: usize) -> usize {
    n.max(1).to_string().len()
}

/// `Chapter 007 - The Title.cbz`
///
/// The integer part of the chapter number is zero-padded to `width`; a
/// fractional part is kept as is.
pub fn chapter_archive_name(chapter: &Chapter, width: usize) -> String {
    let rendered = chapter.number.to_string();
    let number = match rendered.split_once('.') {
        Some((whole, fraction)) => format!("{:0>width$}.{}", whole, fraction, width = width),
        None => format!("{:0>width$}", rendered, width = width),
    };
    format!(
        "Chapter {} - {}.cbz",
        number,
        sanitize_file_name(&chapter.title)
    )
}

/// `001.jpg`, padded to at least three digits
pub fn page_file_name(index: usize, total: usize, extension: &str) -> String {
    let width = digit_count(total).max(3);
    format!("{:0width$}.{}", index + 1, extension, width = width)
}

/// Image format from the leading bytes
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && &bytes[8..12] == b"avif" {
        Some("avif")
    } else {
        None
    }
}

/// File extension for a downloaded image
///
/// Content type first, then the magic bytes, then the URL; `jpg` otherwise.
pub fn image_extension(content_type: &str, url: &str, bytes: &[u8]) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();
    let from_type = match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        _ => None,
    };

    from_type
        .or_else(|| sniff_image(bytes))
        .or_else(|| url_extension(url))
        .unwrap_or("jpg")
}

fn url_extension(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next()?;
    let (_, ext) = path.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        "avif" => Some("avif"),
        _ => None,
    }
}
