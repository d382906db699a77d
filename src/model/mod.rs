//! Source-independent data model shared by connectors, manager and downloader

mod entry;
mod keys;
mod source_id;

pub use entry::{CatalogEntry, Chapter, ChapterNumber, PageRef, SeriesDetails};
pub use keys::{ChapterKey, KeyError, SeriesKey};
pub use source_id::SourceId;
