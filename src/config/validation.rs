use crate::config::types::{
    Config, DownloadConfig, HttpConfig, ProbeConfig, SearchConfig, SourcesConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_probe_config(&config.probe)?;
    validate_download_config(&config.download)?;
    validate_search_config(&config.search)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.probe_timeout_secs < 1 || config.connect_timeout_secs < 1
    {
        return Err(ConfigError::Validation(
            "timeouts must be at least 1 second".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 0 and 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

fn validate_probe_config(config: &ProbeConfig) -> Result<(), ConfigError> {
    if config.start_page < 1 {
        return Err(ConfigError::Validation(format!(
            "start-page must be >= 1, got {}",
            config.start_page
        )));
    }

    if config.ceiling < config.start_page {
        return Err(ConfigError::Validation(format!(
            "ceiling ({}) must not be below start-page ({})",
            config.ceiling, config.start_page
        )));
    }

    if config.sanity_ceiling < 1 {
        return Err(ConfigError::Validation(
            "sanity-ceiling must be >= 1".to_string(),
        ));
    }

    if config.fallback_pages < 1 || config.fallback_pages > config.sanity_ceiling {
        return Err(ConfigError::Validation(format!(
            "fallback-pages must be between 1 and sanity-ceiling ({}), got {}",
            config.sanity_ceiling, config.fallback_pages
        )));
    }

    Ok(())
}

fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-failures must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.limit_per_source < 1 || config.merged_limit < 1 {
        return Err(ConfigError::Validation(
            "search limits must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_sources(sources: &SourcesConfig) -> Result<(), ConfigError> {
    let mangahub = &sources.mangahub;
    if mangahub.enabled {
        validate_base_url("sources.mangahub.base-url", &mangahub.base_url)?;
        if mangahub.cdn_domains.is_empty() {
            return Err(ConfigError::Validation(
                "sources.mangahub.cdn-domains must list at least one domain".to_string(),
            ));
        }
        for domain in &mangahub.cdn_domains {
            validate_base_url("sources.mangahub.cdn-domains", domain)?;
        }
    }

    let omegascans = &sources.omegascans;
    if omegascans.enabled {
        validate_base_url("sources.omegascans.base-url", &omegascans.base_url)?;
        validate_base_url("sources.omegascans.api-url", &omegascans.api_url)?;
    }

    let hentaifox = &sources.hentaifox;
    if hentaifox.enabled {
        validate_base_url("sources.hentaifox.base-url", &hentaifox.base_url)?;
        validate_base_url("sources.hentaifox.image-base-url", &hentaifox.image_base_url)?;
    }

    if sources.fanfox.enabled {
        validate_base_url("sources.fanfox.base-url", &sources.fanfox.base_url)?;
    }

    Ok(())
}

/// Base URLs must be absolute http(s) URLs without a query
fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.query().is_some() {
        return Err(ConfigError::Validation(format!(
            "{} '{}' cannot carry a query string",
            field, value
        )));
    }

    Ok(())
}
