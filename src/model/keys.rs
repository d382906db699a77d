//! Typed series and chapter identifiers
//!
//! Each source needs different data to find a series again: OmegaScans
//! wants both its numeric id and the slug, the HTML sources only a slug.
//! The keys stay structured inside the crate and are rendered as compact
//! `source:...` tokens only for the CLI and the job store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::SourceId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("malformed key '{0}'")]
    Malformed(String),
}

/// Identifies one series on one source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SeriesKey {
    MangaHub { slug: String },
    OmegaScans { id: u64, slug: String },
    HentaiFox { gallery_id: u64 },
    FanFox { slug: String },
}

impl SeriesKey {
    pub fn source(&self) -> SourceId {
        match self {
            SeriesKey::MangaHub { .. } => SourceId::MangaHub,
            SeriesKey::OmegaScans { .. } => SourceId::OmegaScans,
            SeriesKey::HentaiFox { .. } => SourceId::HentaiFox,
            SeriesKey::FanFox { .. } => SourceId::FanFox,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::MangaHub { slug } => write!(f, "mangahub:{}", slug),
            SeriesKey::OmegaScans { id, slug } => write!(f, "omegascans:{}:{}", id, slug),
            SeriesKey::HentaiFox { gallery_id } => write!(f, "hentaifox:{}", gallery_id),
            SeriesKey::FanFox { slug } => write!(f, "fanfox:{}", slug),
        }
    }
}

impl FromStr for SeriesKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KeyError::Malformed(s.to_string());
        let (source, rest) = s.split_once(':').ok_or_else(malformed)?;
        if rest.is_empty() {
            return Err(malformed());
        }

        match source.parse::<SourceId>()? {
            SourceId::MangaHub => Ok(SeriesKey::MangaHub {
                slug: rest.to_string(),
            }),
            SourceId::FanFox => Ok(SeriesKey::FanFox {
                slug: rest.to_string(),
            }),
            SourceId::HentaiFox => Ok(SeriesKey::HentaiFox {
                gallery_id: rest.parse().map_err(|_| malformed())?,
            }),
            SourceId::OmegaScans => {
                let (id, slug) = rest.split_once(':').ok_or_else(malformed)?;
                if slug.is_empty() {
                    return Err(malformed());
                }
                Ok(SeriesKey::OmegaScans {
                    id: id.parse().map_err(|_| malformed())?,
                    slug: slug.to_string(),
                })
            }
        }
    }
}

/// Identifies one chapter; always carries enough to locate its series
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ChapterKey {
    MangaHub {
        slug: String,
        /// Normalized chapter number (`012` becomes `12`), as used in the CDN path
        number: String,
    },
    OmegaScans {
        series_slug: String,
        chapter_slug: String,
    },
    HentaiFox {
        gallery_id: u64,
    },
    FanFox {
        slug: String,
        /// Path below the series, e.g. `v01/c003`
        path: String,
    },
}

impl ChapterKey {
    pub fn source(&self) -> SourceId {
        match self {
            ChapterKey::MangaHub { .. } => SourceId::MangaHub,
            ChapterKey::OmegaScans { .. } => SourceId::OmegaScans,
            ChapterKey::HentaiFox { .. } => SourceId::HentaiFox,
            ChapterKey::FanFox { .. } => SourceId::FanFox,
        }
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterKey::MangaHub { slug, number } => write!(f, "mangahub:{}/{}", slug, number),
            ChapterKey::OmegaScans {
                series_slug,
                chapter_slug,
            } => write!(f, "omegascans:{}/{}", series_slug, chapter_slug),
            ChapterKey::HentaiFox { gallery_id } => write!(f, "hentaifox:{}", gallery_id),
            ChapterKey::FanFox { slug, path } => write!(f, "fanfox:{}/{}", slug, path),
        }
    }
}
