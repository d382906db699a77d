use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::KeyError;

/// Identifies one of the supported sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    MangaHub,
    OmegaScans,
    HentaiFox,
    FanFox,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::MangaHub,
        SourceId::OmegaScans,
        SourceId::HentaiFox,
        SourceId::FanFox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::MangaHub => "mangahub",
            SourceId::OmegaScans => "omegascans",
            SourceId::HentaiFox => "hentaifox",
            SourceId::FanFox => "fanfox",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::MangaHub => "MangaHub",
            SourceId::OmegaScans => "OmegaScans",
            SourceId::HentaiFox => "HentaiFox",
            SourceId::FanFox => "FanFox",
        }
    }

    /// Sources whose whole catalog is adult content
    pub fn is_adult_only(&self) -> bool {
        matches!(self, SourceId::HentaiFox)
    }

    /// Tie-break rank when merging results; lower wins
    pub fn priority(&self) -> u8 {
        match self {
            SourceId::OmegaScans => 1,
            SourceId::MangaHub | SourceId::HentaiFox => 2,
            SourceId::FanFox => 3,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mangahub" | "mangafox" => Ok(SourceId::MangaHub),
            "omegascans" => Ok(SourceId::OmegaScans),
            "hentaifox" => Ok(SourceId::HentaiFox),
            "fanfox" => Ok(SourceId::FanFox),
            other => Err(KeyError::UnknownSource(other.to_string())),
        }
    }
}
