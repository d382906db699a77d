//! Configuration module for Manga Conduit
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section falls back to built-in defaults, so the crate also runs without a file.
//!
//! # Example
//!
//! ```no_run
//! use manga_conduit::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("conduit.toml")).unwrap();
//! println!("Probe ceiling: {}", config.probe.ceiling);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DownloadConfig, FanFoxConfig, HentaiFoxConfig, HttpConfig, MangaHubConfig,
    OmegaScansConfig, ProbeConfig, SearchConfig, SourcesConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{load_config, load_or_default, parse_config};
pub use validation::validate;
