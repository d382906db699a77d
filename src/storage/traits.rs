//! Job store trait and error types

use crate::storage::{JobRecord, JobStatus, NewJob};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Job {id} is already {status}")]
    JobFinished { id: i64, status: JobStatus },

    #[error("Invalid job row: {0}")]
    InvalidRow(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of download jobs
///
/// Progress and status updates on a finished job are rejected with
/// [`StorageError::JobFinished`], so a cancelled job cannot be revived by a
/// download task that has not noticed the cancellation yet.
pub trait JobStore {
    /// Inserts a queued job and returns its id
    fn create_job(&mut self, job: &NewJob) -> StorageResult<i64>;

    fn get_job(&self, id: i64) -> StorageResult<JobRecord>;

    /// Newest first; `status` filters when given
    fn list_jobs(&self, status: Option<JobStatus>) -> StorageResult<Vec<JobRecord>>;

    /// Records progress (clamped to 100) and a human readable message
    fn update_progress(&mut self, id: i64, progress: u8, message: &str) -> StorageResult<()>;

    /// Moves a job to `status`, recording the error for failed jobs
    fn set_status(&mut self, id: i64, status: JobStatus, error: Option<&str>)
        -> StorageResult<()>;

    /// Where the finished series directory ended up
    fn set_destination(&mut self, id: i64, destination: &str) -> StorageResult<()>;

    /// Flags a job as cancelled
    ///
    /// Returns false if the job had already finished.
    fn cancel(&mut self, id: i64) -> StorageResult<bool>;

    fn is_cancelled(&self, id: i64) -> StorageResult<bool>;
}
