//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the JobStore trait.

use crate::model::SourceId;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StorageError, StorageResult};
use crate::storage::{JobRecord, JobStatus, NewJob};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "id, title, source, series_key, status, progress, message, error,
     destination, created_at, updated_at";

/// SQLite job store
pub struct SqliteJobStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteJobStore").finish_non_exhaustive()
    }
}

impl SqliteJobStore {
    /// Opens or creates the database at `path`, creating parent directories
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn current_status(&self, id: i64) -> StorageResult<JobStatus> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM jobs WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or(StorageError::JobNotFound(id))?;
        JobStatus::from_db_string(&raw)
            .ok_or_else(|| StorageError::InvalidRow(format!("status '{}'", raw)))
    }

    fn ensure_active(&self, id: i64) -> StorageResult<()> {
        let status = self.current_status(id)?;
        if status.is_terminal() {
            return Err(StorageError::JobFinished { id, status });
        }
        Ok(())
    }
}

/// Columns as stored, before validation
struct JobRow {
    id: i64,
    title: String,
    source: String,
    series_key: String,
    status: String,
    progress: i64,
    message: Option<String>,
    error: Option<String>,
    destination: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            series_key: row.get(3)?,
            status: row.get(4)?,
            progress: row.get(5)?,
            message: row.get(6)?,
            error: row.get(7)?,
            destination: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_record(self) -> StorageResult<JobRecord> {
        let source: SourceId = self
            .source
            .parse()
            .map_err(|_| StorageError::InvalidRow(format!("source '{}'", self.source)))?;
        let status = JobStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::InvalidRow(format!("status '{}'", self.status)))?;

        Ok(JobRecord {
            id: self.id,
            title: self.title,
            source,
            series_key: self.series_key,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            message: self.message,
            error: self.error,
            destination: self.destination,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl JobStore for SqliteJobStore {
    fn create_job(&mut self, job: &NewJob) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (title, source, series_key, status, progress, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![
                job.title,
                job.series.source().as_str(),
                job.series.to_string(),
                JobStatus::Queued.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, id: i64) -> StorageResult<JobRecord> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![id],
                JobRow::read,
            )
            .optional()?
            .ok_or(StorageError::JobNotFound(id))?;
        row.into_record()
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> StorageResult<Vec<JobRecord>> {
        let rows = match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE status = ?1 ORDER BY id DESC",
                    JOB_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![status.to_db_string()], JobRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT {} FROM jobs ORDER BY id DESC", JOB_COLUMNS))?;
                let rows = stmt
                    .query_map([], JobRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        rows.into_iter().map(JobRow::into_record).collect()
    }

    fn update_progress(&mut self, id: i64, progress: u8, message: &str) -> StorageResult<()> {
        self.ensure_active(id)?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE jobs SET progress = ?1, message = ?2, updated_at = ?3 WHERE id = ?4",
            params![progress.min(100), message, now, id],
        )?;
        Ok(())
    }

    fn set_status(
        &mut self,
        id: i64,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.ensure_active(id)?;
        let now = Utc::now().to_rfc3339();
        if status == JobStatus::Completed {
            self.conn.execute(
                "UPDATE jobs SET status = ?1, progress = 100, error = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![status.to_db_string(), error, now, id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE jobs SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.to_db_string(), error, now, id],
            )?;
        }
        Ok(())
    }

    fn set_destination(&mut self, id: i64, destination: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE jobs SET destination = ?1, updated_at = ?2 WHERE id = ?3",
            params![destination, now, id],
        )?;
        if changed == 0 {
            return Err(StorageError::JobNotFound(id));
        }
        Ok(())
    }

    fn cancel(&mut self, id: i64) -> StorageResult<bool> {
        if self.current_status(id)?.is_terminal() {
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE jobs SET status = ?1, message = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                JobStatus::Cancelled.to_db_string(),
                "Cancelled by user",
                now,
                id
            ],
        )?;
        Ok(true)
    }

    fn is_cancelled(&self, id: i64) -> StorageResult<bool> {
        Ok(self.current_status(id)? == JobStatus::Cancelled)
    }
}
