//! Persisted download job state
//!
//! This module keeps the job table that backs download progress reporting:
//! - SQLite database initialization and schema management
//! - Job creation, listing and progress updates
//! - The cancellation flag polled by running downloads

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteJobStore;
pub use traits::{JobStore, StorageError, StorageResult};

use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::model::{SeriesKey, SourceId};

/// A job store shared between the CLI and background download tasks
pub type SharedJobStore = Arc<Mutex<SqliteJobStore>>;

/// Opens (or creates) the job database at `path`
pub fn open_job_store(path: &Path) -> StorageResult<SharedJobStore> {
    Ok(Arc::new(Mutex::new(SqliteJobStore::new(path)?)))
}

/// Data needed to enqueue a download
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub series: SeriesKey,
}

impl NewJob {
    pub fn new(title: impl Into<String>, series: SeriesKey) -> Self {
        Self {
            title: title.into(),
            series,
        }
    }
}

/// One row of the `jobs` table
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub source: SourceId,
    /// Token form of the series key (`mangahub:slug`, ...)
    pub series_key: String,
    pub status: JobStatus,
    /// 0 to 100
    pub progress: u8,
    pub message: Option<String>,
    pub error: Option<String>,
    pub destination: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Lifecycle of a download job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "downloading" => Some(Self::Downloading),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed, failed and cancelled jobs never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}
