use serde::Deserialize;

use crate::model::SourceId;

/// Desktop browser user agent sent by every connector
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Manga Conduit
///
/// Every section is optional; an empty file yields the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub probe: ProbeConfig,
    pub download: DownloadConfig,
    pub search: SearchConfig,
    pub sources: SourcesConfig,
}

/// Outbound HTTP behaviour shared by all connectors
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// User agent presented to every source
    pub user_agent: String,

    /// Minimum time between two requests issued by the same connector (milliseconds)
    pub request_delay_ms: u64,

    /// Whole-request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,

    /// First backoff delay; doubled on every further retry (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Timeout for existence probes (seconds)
    pub probe_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay_ms: 500,
            timeout_secs: 10,
            connect_timeout_secs: 5,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            probe_timeout_secs: 5,
        }
    }
}

/// Page-count discovery limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// First page probed by the exponential phase
    pub start_page: u32,

    /// Hard ceiling for the exponential phase
    pub ceiling: u32,

    /// Largest page count ever handed to a caller
    pub sanity_ceiling: u32,

    /// Page count used when discovery fails
    pub fallback_pages: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            ceiling: 1000,
            sanity_ceiling: 500,
            fallback_pages: 50,
        }
    }
}

/// Downloader output and job tracking
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloadConfig {
    /// Directory receiving one sub-directory per series
    pub output_dir: String,

    /// SQLite database holding job state
    pub database_path: String,

    /// Consecutive page failures after which a chapter is abandoned
    pub max_consecutive_failures: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: "./downloads/manga".to_string(),
            database_path: "./manga-conduit.db".to_string(),
            max_consecutive_failures: 5,
        }
    }
}

/// Fan-out search behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Results requested from each source
    pub limit_per_source: usize,

    /// Cap on merged cross-source results
    pub merged_limit: usize,

    /// Search cache lifetime; 0 disables caching (seconds)
    pub cache_ttl_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit_per_source: 30,
            merged_limit: 50,
            cache_ttl_secs: 3600,
        }
    }
}

/// Per-source settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub mangahub: MangaHubConfig,
    pub omegascans: OmegaScansConfig,
    pub hentaifox: HentaiFoxConfig,
    pub fanfox: FanFoxConfig,
}

impl SourcesConfig {
    pub fn is_enabled(&self, id: SourceId) -> bool {
        match id {
            SourceId::MangaHub => self.mangahub.enabled,
            SourceId::OmegaScans => self.omegascans.enabled,
            SourceId::HentaiFox => self.hentaifox.enabled,
            SourceId::FanFox => self.fanfox.enabled,
        }
    }

    /// Enabled sources in `SourceId` order
    pub fn enabled(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.is_enabled(*id))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MangaHubConfig {
    pub enabled: bool,
    pub base_url: String,

    /// Image CDN domains, primary first
    pub cdn_domains: Vec<String>,

    /// Directory pages walked by the catalog listing
    pub directory_pages: u32,
}

impl Default for MangaHubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://mangahub.us".to_string(),
            cdn_domains: vec![
                "https://imgx.mghcdn.com".to_string(),
                "https://img.mghcdn.com".to_string(),
                "https://img1.mghcdn.com".to_string(),
            ],
            directory_pages: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OmegaScansConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_url: String,

    /// Catalog pages walked per adult flag
    pub catalog_pages: u32,
}

impl Default for OmegaScansConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://omegascans.org".to_string(),
            api_url: "https://api.omegascans.org".to_string(),
            catalog_pages: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HentaiFoxConfig {
    pub enabled: bool,
    pub base_url: String,
    pub image_base_url: String,
}

impl Default for HentaiFoxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://hentaifox.com".to_string(),
            image_base_url: "https://i.hentaifox.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FanFoxConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for FanFoxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://fanfox.net".to_string(),
        }
    }
}
