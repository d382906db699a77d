//! Series downloads
//!
//! A [`Downloader`] runs one persisted job: list chapters, resolve each
//! chapter's pages, fetch the pages one after another through the source's
//! own HTTP session, and pack every chapter into a CBZ archive.
//!
//! Work happens in `{output}/.partial/job-{id}`. The series directory is
//! moved to `{output}/{title}` when the job finishes, merging into an
//! existing directory from an earlier download. The job's cancellation
//! flag is polled before every chapter and every page.

mod archive;
mod naming;

pub use archive::{write_cbz, ComicInfo, SeriesMetadata};
pub use naming::{
    chapter_archive_name, digit_count, image_extension, page_file_name, sanitize_file_name,
    sniff_image,
};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::DownloadConfig;
use crate::extract::{extract_images, DEFAULT_CHAIN};
use crate::http::{header_map, FetchedResponse, HttpClient};
use crate::manager::ConnectorManager;
use crate::model::{Chapter, PageRef, SeriesDetails, SeriesKey};
use crate::source::{Connector, ConnectorError};
use crate::storage::{JobStatus, JobStore, SharedJobStore, SqliteJobStore, StorageError};
use crate::Result;

/// What to download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub series: SeriesKey,
    pub title: String,
    /// Only these chapters; `None` downloads the full chapter list
    pub chapters: Option<Vec<Chapter>>,
}

impl DownloadRequest {
    pub fn new(series: SeriesKey, title: impl Into<String>) -> Self {
        Self {
            series,
            title: title.into(),
            chapters: None,
        }
    }
}

/// Why a chapter produced no archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// Paywalled on the source
    Locked,
    /// Not an image chapter (e.g. a novel)
    Unsupported,
    /// The connector found no pages
    NoPages,
    /// Pages were listed but no image could be fetched
    NoImages,
    /// Writing the CBZ failed
    Archive,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Locked => "locked",
            FailureReason::Unsupported => "unsupported",
            FailureReason::NoPages => "no-pages",
            FailureReason::NoImages => "no-images",
            FailureReason::Archive => "archive",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterFailure {
    pub chapter: String,
    pub reason: FailureReason,
}

/// Outcome of one job
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub job_id: i64,
    pub status: JobStatus,
    pub chapters_total: usize,
    pub chapters_downloaded: usize,
    pub failures: Vec<ChapterFailure>,
    /// Final archive locations
    pub archives: Vec<PathBuf>,
    pub destination: Option<PathBuf>,
}

impl DownloadReport {
    fn new(job_id: i64, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            chapters_total: 0,
            chapters_downloaded: 0,
            failures: Vec::new(),
            archives: Vec::new(),
            destination: None,
        }
    }
}

/// An image downloaded for one page
struct PageImage {
    bytes: Vec<u8>,
    extension: &'static str,
}

/// Runs download jobs against the connectors of a manager
pub struct Downloader {
    manager: Arc<ConnectorManager>,
    jobs: SharedJobStore,
    output_dir: PathBuf,
    max_consecutive_failures: u32,
}

impl Downloader {
    pub fn new(
        manager: Arc<ConnectorManager>,
        jobs: SharedJobStore,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            manager,
            jobs,
            output_dir: PathBuf::from(&config.output_dir),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs the job on a background task
    pub fn spawn(
        self: Arc<Self>,
        job_id: i64,
        request: DownloadRequest,
    ) -> JoinHandle<Result<DownloadReport>> {
        tokio::spawn(async move { self.run(job_id, request).await })
    }

    /// Downloads a series for an existing job
    ///
    /// The job ends `completed` when at least one chapter was archived,
    /// `failed` when none was, and `cancelled` when the flag was raised.
    pub async fn run(&self, job_id: i64, request: DownloadRequest) -> Result<DownloadReport> {
        let partial = self.partial_dir(job_id);
        let result = self.execute(job_id, &request, &partial).await;

        remove_dir_best_effort(&partial);

        if let Err(e) = &result {
            tracing::error!("Download job {} failed: {}", job_id, e);
            let message = e.to_string();
            if let Err(store_err) = self.with_jobs(|jobs| {
                jobs.set_status(job_id, JobStatus::Failed, Some(&message))
            }) {
                tracing::warn!("Could not mark job {} failed: {}", job_id, store_err);
            }
        }
        result
    }

    async fn execute(
        &self,
        job_id: i64,
        request: &DownloadRequest,
        partial: &Path,
    ) -> Result<DownloadReport> {
        let connector = self.manager.for_series(&request.series)?;
        if self.is_cancelled(job_id) {
            return Ok(self.cancelled(DownloadReport::new(job_id, JobStatus::Queued)));
        }
        self.with_jobs(|jobs| jobs.set_status(job_id, JobStatus::Downloading, None))?;
        tracing::info!(
            "Job {}: downloading '{}' from {}",
            job_id,
            request.title,
            connector.id().display_name()
        );

        let chapters = match &request.chapters {
            Some(chapters) => chapters.clone(),
            None => connector.list_chapters(&request.series).await,
        };
        if chapters.is_empty() {
            let report = DownloadReport::new(job_id, JobStatus::Failed);
            let recorded = self.finish_job(job_id, |jobs| {
                jobs.set_status(job_id, JobStatus::Failed, Some("No chapters found"))
            })?;
            return Ok(if recorded { report } else { self.cancelled(report) });
        }

        let series_name = sanitize_file_name(&request.title);
        let work_dir = partial.join(&series_name);
        std::fs::create_dir_all(&work_dir)?;

        let details = connector.get_details(&request.series).await;
        SeriesMetadata::new(&request.title, &request.series, &details).write(&work_dir)?;
        self.download_cover(&connector, &details, &work_dir).await;

        let mut report = DownloadReport::new(job_id, JobStatus::Downloading);
        report.chapters_total = chapters.len();
        let width = digit_count(chapters.len());
        let mut archive_names = Vec::new();

        for (index, chapter) in chapters.iter().enumerate() {
            if self.is_cancelled(job_id) {
                return Ok(self.cancelled(report));
            }

            let label = format!("Chapter {}/{}: {}", index + 1, chapters.len(), chapter.title);
            self.update_progress(job_id, index, chapters.len(), &label);

            let outcome = self
                .download_chapter(
                    job_id,
                    &connector,
                    chapter,
                    &request.title,
                    &details,
                    &work_dir,
                    width,
                )
                .await;
            match outcome {
                ChapterOutcome::Archived(name) => {
                    report.chapters_downloaded += 1;
                    archive_names.push(name);
                }
                ChapterOutcome::Failed(reason) => {
                    tracing::warn!(
                        "Job {}: {} skipped ({})",
                        job_id,
                        chapter.title,
                        reason.as_str()
                    );
                    report.failures.push(ChapterFailure {
                        chapter: chapter.title.clone(),
                        reason,
                    });
                }
                ChapterOutcome::Cancelled => return Ok(self.cancelled(report)),
            }
        }

        if report.chapters_downloaded == 0 {
            let recorded = self.finish_job(job_id, |jobs| {
                jobs.set_status(job_id, JobStatus::Failed, Some("No chapter could be downloaded"))
            })?;
            if !recorded {
                return Ok(self.cancelled(report));
            }
            report.status = JobStatus::Failed;
            return Ok(report);
        }

        let destination = self.output_dir.join(&series_name);
        move_into(&work_dir, &destination)?;
        report.archives = archive_names
            .iter()
            .map(|name| destination.join(name))
            .collect();

        let shown = destination.display().to_string();
        let summary = format!(
            "Downloaded {}/{} chapter(s)",
            report.chapters_downloaded, report.chapters_total
        );
        let recorded = self.finish_job(job_id, |jobs| {
            jobs.set_destination(job_id, &shown)?;
            jobs.update_progress(job_id, 100, &summary)?;
            jobs.set_status(job_id, JobStatus::Completed, None)
        })?;
        report.destination = Some(destination);
        if !recorded {
            // The archives are already in place; only the status is lost
            return Ok(self.cancelled(report));
        }

        tracing::info!(
            "Job {}: {} of {} chapter(s) saved to {}",
            job_id,
            report.chapters_downloaded,
            report.chapters_total,
            shown
        );
        report.status = JobStatus::Completed;
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn download_chapter(
        &self,
        job_id: i64,
        connector: &Connector,
        chapter: &Chapter,
        series_title: &str,
        details: &SeriesDetails,
        work_dir: &Path,
        width: usize,
    ) -> ChapterOutcome {
        let pages = match connector.list_pages(chapter).await {
            Ok(pages) if pages.is_empty() => {
                return ChapterOutcome::Failed(FailureReason::NoPages)
            }
            Ok(pages) => pages,
            Err(ConnectorError::Paywall(_)) => return ChapterOutcome::Failed(FailureReason::Locked),
            Err(ConnectorError::UnsupportedContent(_)) => {
                return ChapterOutcome::Failed(FailureReason::Unsupported)
            }
            Err(_) => return ChapterOutcome::Failed(FailureReason::NoPages),
        };

        let mut images = Vec::new();
        let mut consecutive_failures = 0;
        for (index, page) in pages.iter().enumerate() {
            if self.is_cancelled(job_id) {
                return ChapterOutcome::Cancelled;
            }

            match fetch_page_image(connector.client(), page).await {
                Some(image) => {
                    consecutive_failures = 0;
                    images.push(image);
                }
                None => {
                    consecutive_failures += 1;
                    tracing::warn!("Page {} of {} failed", index + 1, chapter.title);
                    if consecutive_failures >= self.max_consecutive_failures {
                        tracing::warn!(
                            "Stopping {} after {} consecutive failed page(s)",
                            chapter.title,
                            consecutive_failures
                        );
                        break;
                    }
                }
            }
        }

        if images.is_empty() {
            return ChapterOutcome::Failed(FailureReason::NoImages);
        }

        let total = images.len();
        let files: Vec<(String, Vec<u8>)> = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| (page_file_name(i, total, image.extension), image.bytes))
            .collect();

        let info = ComicInfo {
            series: series_title.to_string(),
            title: chapter.title.clone(),
            number: chapter.number.to_string(),
            page_count: total,
            web: chapter.url.clone(),
            genres: details.genres.clone(),
            writer: details.authors.first().cloned(),
        };

        let name = chapter_archive_name(chapter, width);
        match write_cbz(&work_dir.join(&name), &files, &info) {
            Ok(()) => {
                tracing::info!("Archived {} ({} page(s))", name, total);
                ChapterOutcome::Archived(name)
            }
            Err(e) => {
                tracing::error!("Failed to write {}: {}", name, e);
                ChapterOutcome::Failed(FailureReason::Archive)
            }
        }
    }

    /// Saves the cover as raw bytes; failures only log
    async fn download_cover(&self, connector: &Connector, details: &SeriesDetails, dir: &Path) {
        let Some(url) = details.cover_url.as_deref() else {
            return;
        };
        match connector.client().fetch(url, None).await {
            Ok(response) => match image_of(response) {
                Ok(image) => {
                    let path = dir.join(format!("cover.{}", image.extension));
                    if let Err(e) = std::fs::write(&path, &image.bytes) {
                        tracing::warn!("Failed to save cover: {}", e);
                    }
                }
                Err(_) => tracing::debug!("Cover at {} is not an image", url),
            },
            Err(e) => tracing::warn!("Failed to fetch cover {}: {}", url, e),
        }
    }

    fn cancelled(&self, mut report: DownloadReport) -> DownloadReport {
        tracing::info!("Job {} cancelled", report.job_id);
        report.status = JobStatus::Cancelled;
        report
    }

    fn partial_dir(&self, job_id: i64) -> PathBuf {
        self.output_dir.join(".partial").join(format!("job-{}", job_id))
    }

    fn is_cancelled(&self, job_id: i64) -> bool {
        self.with_jobs(|jobs| jobs.is_cancelled(job_id))
            .unwrap_or_else(|e| {
                tracing::warn!("Could not read cancellation flag of job {}: {}", job_id, e);
                false
            })
    }

    fn update_progress(&self, job_id: i64, done: usize, total: usize, message: &str) {
        let percent = (done * 100 / total.max(1)).min(100) as u8;
        if let Err(e) = self.with_jobs(|jobs| jobs.update_progress(job_id, percent, message)) {
            tracing::debug!("Progress update for job {} skipped: {}", job_id, e);
        }
    }

    /// Records the job's outcome; `false` when it was cancelled in the meantime
    fn finish_job(
        &self,
        job_id: i64,
        f: impl FnOnce(&mut SqliteJobStore) -> std::result::Result<(), StorageError>,
    ) -> Result<bool> {
        match self.with_jobs(f) {
            Ok(()) => Ok(true),
            Err(StorageError::JobFinished {
                status: JobStatus::Cancelled,
                ..
            }) => {
                tracing::info!("Job {} was cancelled before it could be recorded", job_id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn with_jobs<T>(
        &self,
        f: impl FnOnce(&mut SqliteJobStore) -> std::result::Result<T, StorageError>,
    ) -> std::result::Result<T, StorageError> {
        let mut jobs = self.jobs.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut jobs)
    }
}

enum ChapterOutcome {
    Archived(String),
    Failed(FailureReason),
    Cancelled,
}

/// Tries every candidate URL of a page in order
///
/// A response that is not an image goes through the extraction chain and
/// the first extracted URL that yields an image is used.
async fn fetch_page_image(client: &HttpClient, page: &PageRef) -> Option<PageImage> {
    let headers = page
        .referer
        .as_ref()
        .map(|referer| header_map(&[("referer", referer.clone())]));

    for candidate in page.candidates() {
        let response = match client.fetch(candidate, headers.as_ref()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Candidate {} failed: {}", candidate, e);
                continue;
            }
        };

        let response = match image_of(response) {
            Ok(image) => return Some(image),
            Err(response) => response,
        };

        let Some((strategy, urls)) = extract_images(&response, &DEFAULT_CHAIN) else {
            continue;
        };
        tracing::debug!(
            "{} returned markup; trying {} URL(s) from {}",
            candidate,
            urls.len(),
            strategy.name()
        );
        for url in urls.iter().filter(|url| url.as_str() != candidate) {
            if let Ok(response) = client.fetch(url, headers.as_ref()).await {
                if let Ok(image) = image_of(response) {
                    return Some(image);
                }
            }
        }
    }
    None
}

/// The response body as an image, judged by content type or magic bytes
///
/// Hands the response back when it is not an image.
fn image_of(response: FetchedResponse) -> std::result::Result<PageImage, FetchedResponse> {
    if !response.is_image() && sniff_image(&response.body).is_none() {
        return Err(response);
    }
    let extension = image_extension(&response.content_type, &response.final_url, &response.body);
    Ok(PageImage {
        bytes: response.body,
        extension,
    })
}

/// Moves the contents of `from` into `to`, replacing files of the same name
fn move_into(from: &Path, to: &Path) -> Result<()> {
    if !to.exists() {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(from, to)?;
        return Ok(());
    }

    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if target.is_file() {
            std::fs::remove_file(&target)?;
        }
        std::fs::rename(entry.path(), &target)?;
    }
    std::fs::remove_dir(from)?;
    Ok(())
}

fn remove_dir_best_effort(dir: &Path) {
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!("Failed to remove {}: {}", dir.display(), e);
        }
    }
}
