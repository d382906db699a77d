use async_trait::async_trait;

use super::PageProbe;
use crate::http::HttpClient;

/// URL of page `n` is `{prefix}{n}{suffix}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrlPattern {
    prefix: String,
    suffix: String,
}

impl PageUrlPattern {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// `{cdn}/{series}/{chapter}/{page}.jpg`
    pub fn chapter_images(cdn: &str, series: &str, chapter: &str) -> Self {
        Self::new(
            format!("{}/{}/{}/", cdn.trim_end_matches('/'), series, chapter),
            ".jpg",
        )
    }

    pub fn url(&self, page: u32) -> String {
        format!("{}{}{}", self.prefix, page, self.suffix)
    }
}

/// Probes a URL pattern with HEAD requests
pub struct CdnProbe<'a> {
    client: &'a HttpClient,
    pattern: PageUrlPattern,
}

impl<'a> CdnProbe<'a> {
    pub fn new(client: &'a HttpClient, pattern: PageUrlPattern) -> Self {
        Self { client, pattern }
    }
}

#[async_trait]
impl PageProbe for CdnProbe<'_> {
    async fn exists(&self, page: u32) -> bool {
        self.client.exists(&self.pattern.url(page)).await
    }
}
