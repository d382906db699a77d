//! Decoder for "packed" JavaScript
//!
//! One source answers its paginated image API with a packed script: a
//! self-invoking function receiving the packed code, a numeric base, a
//! word count and a `|`-delimited dictionary. Unpacking substitutes every
//! encoded token with its dictionary entry; the resulting code carries the
//! CDN prefix and the relative image paths.

mod images;
mod packer;

use thiserror::Error;

pub use images::{extract_image_urls, select_page_images, unpack_image_urls};
pub use packer::{decode_token, is_packed, unpack, PackedPayload};

/// Signals that a script could not be decoded into image URLs
///
/// Callers treat this as "try the next extraction strategy".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnpackError {
    #[error("no packed payload found")]
    NoPackerPayload,

    #[error("unsupported packer base {0}")]
    UnsupportedBase(u32),

    #[error("unpacked script has no image table")]
    MissingImageTable,
}
