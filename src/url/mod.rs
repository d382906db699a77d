//! URL handling helpers
//!
//! Scraped pages hand out relative links, protocol-relative CDN paths and
//! bare `host/path` references inside scripts. This module turns all of
//! them into absolute HTTPS URLs.

mod normalize;

pub use normalize::{absolutize, join_path, last_segment, normalize_image_url, strip_query};
