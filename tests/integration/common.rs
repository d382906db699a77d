//! Shared fixtures for the integration tests

use manga_conduit::config::Config;
use manga_conduit::model::SourceId;
use wiremock::{Request, Respond, ResponseTemplate};

/// Smallest byte sequence recognised as a JPEG
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// A configuration with no delays, fast retries and only `enabled` sources on
pub fn test_config(enabled: &[SourceId]) -> Config {
    let mut config = Config::default();
    config.http.request_delay_ms = 0;
    config.http.retry_base_delay_ms = 1;
    config.http.max_retries = 1;
    config.search.cache_ttl_secs = 0;

    config.sources.mangahub.enabled = enabled.contains(&SourceId::MangaHub);
    config.sources.omegascans.enabled = enabled.contains(&SourceId::OmegaScans);
    config.sources.hentaifox.enabled = enabled.contains(&SourceId::HentaiFox);
    config.sources.fanfox.enabled = enabled.contains(&SourceId::FanFox);
    config
}

/// Points MangaHub at `base`, with one CDN per name under it
pub fn use_mangahub(config: &mut Config, base: &str, cdns: &[&str]) {
    config.sources.mangahub.base_url = base.to_string();
    config.sources.mangahub.cdn_domains =
        cdns.iter().map(|cdn| format!("{}/{}", base, cdn)).collect();
    config.sources.mangahub.directory_pages = 1;
}

/// Serves `{n}.jpg` (or any extension) for pages `1..=pages`, 404 beyond
///
/// Answers HEAD and GET alike, like an image CDN.
pub struct PageImages {
    pub pages: u32,
}

impl Respond for PageImages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let page = request
            .url
            .path()
            .rsplit('/')
            .next()
            .and_then(|name| name.split('.').next())
            .and_then(|number| number.parse::<u32>().ok());

        match page {
            Some(n) if n >= 1 && n <= self.pages => ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(JPEG.to_vec()),
            _ => ResponseTemplate::new(404),
        }
    }
}
