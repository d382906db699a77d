//! Manga Conduit: multi-source manga resolution and download pipeline
//!
//! This crate normalizes several manga/webtoon websites into one
//! catalog entry -> chapter list -> page image contract, and packages
//! downloaded chapters as CBZ archives.

pub mod config;
pub mod download;
pub mod extract;
pub mod http;
pub mod manager;
pub mod model;
pub mod probe;
pub mod source;
pub mod storage;
pub mod unpack;
pub mod url;

use thiserror::Error;

/// Main error type for Manga Conduit operations
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Fetch(#[from] http::FetchError),

    #[error("Connector error: {0}")]
    Connector(#[from] source::ConnectorError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source is disabled: {0}")]
    SourceDisabled(String),

    #[error(transparent)]
    InvalidKey(#[from] model::KeyError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Manga Conduit operations
pub type Result<T> = std::result::Result<T, ConduitError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use manager::{ConnectorManager, SearchOptions};
pub use model::{CatalogEntry, Chapter, ChapterKey, PageRef, SeriesDetails, SeriesKey, SourceId};
pub use source::{Connector, ConnectorError};
