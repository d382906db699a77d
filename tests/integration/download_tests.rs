//! End-to-end downloads into a temporary directory

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use manga_conduit::download::{DownloadRequest, Downloader, FailureReason};
use manga_conduit::model::{Chapter, ChapterKey, ChapterNumber, SeriesKey, SourceId};
use manga_conduit::storage::{JobStatus, JobStore, NewJob, SharedJobStore, SqliteJobStore};
use manga_conduit::ConnectorManager;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::common::{test_config, use_mangahub, PageImages, JPEG};

const SERIES_PAGE: &str = r#"
    <div class="detail-info">
      <div class="detail-info-cover"><img src="/media/covers/example-title.jpg"></div>
      <div class="summary">A long journey.</div>
      <div class="genres"><a>Fantasy</a></div>
    </div>
    <ul>
      <li><a href="/chapter/example-title/chapter-2">Chapter 2</a></li>
      <li><a href="/chapter/example-title/chapter-1">Chapter 1</a></li>
    </ul>"#;

fn series() -> SeriesKey {
    SeriesKey::MangaHub {
        slug: "example-title".to_string(),
    }
}

fn reader_page(pages: u32) -> String {
    let options: String = (1..=pages)
        .map(|n| format!("<option value=\"{n}\">{n}</option>"))
        .collect();
    format!("<select name=\"page\">{}</select>", options)
}

struct Fixture {
    downloader: Arc<Downloader>,
    jobs: SharedJobStore,
    output: TempDir,
}

impl Fixture {
    fn new(server: &MockServer) -> Self {
        let output = tempfile::tempdir().unwrap();
        let mut config = test_config(&[SourceId::MangaHub]);
        use_mangahub(&mut config, &server.uri(), &["cdn"]);
        config.download.output_dir = output.path().display().to_string();

        let manager = Arc::new(ConnectorManager::from_config(&config).unwrap());
        let store = SqliteJobStore::open_in_memory().unwrap();
        let jobs: SharedJobStore = Arc::new(Mutex::new(store));
        let downloader = Arc::new(Downloader::new(
            manager,
            Arc::clone(&jobs),
            &config.download,
        ));

        Self {
            downloader,
            jobs,
            output,
        }
    }

    fn create_job(&self) -> i64 {
        self.jobs
            .lock()
            .unwrap()
            .create_job(&NewJob::new("Example Title", series()))
            .unwrap()
    }

    fn root(&self) -> &Path {
        self.output.path()
    }
}

async fn mount_series(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERIES_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/media/covers/example-title.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(JPEG.to_vec()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_archives_each_chapter() {
    let server = MockServer::start().await;
    mount_series(&server).await;

    Mock::given(method("GET"))
        .and(path("/chapter/example-title/chapter-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader_page(3)))
        .mount(&server)
        .await;

    // Chapter 2 advertises two pages but the CDN has none of them
    Mock::given(method("GET"))
        .and(path("/chapter/example-title/chapter-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader_page(2)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/cdn/example-title/1/\d+\.jpg$"))
        .respond_with(PageImages { pages: 3 })
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server);
    let job_id = fixture.create_job();

    let report = Arc::clone(&fixture.downloader)
        .spawn(job_id, DownloadRequest::new(series(), "Example Title"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.chapters_total, 2);
    assert_eq!(report.chapters_downloaded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].chapter, "Chapter 2");
    assert_eq!(report.failures[0].reason, FailureReason::NoImages);

    let destination = fixture.root().join("Example Title");
    assert_eq!(report.destination.as_deref(), Some(destination.as_path()));
    assert!(destination.join("series.json").is_file());
    assert!(destination.join("cover.jpg").is_file());

    let archive_path = destination.join("Chapter 1 - Chapter 1.cbz");
    assert_eq!(report.archives, vec![archive_path.clone()]);
    let mut archive = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["001.jpg", "002.jpg", "003.jpg", "ComicInfo.xml"]);
    assert!(archive.by_name("ComicInfo.xml").is_ok());

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(destination.join("series.json")).unwrap())
            .unwrap();
    assert_eq!(metadata["Name"], "Example Title");
    assert_eq!(metadata["Source"], "MangaHub");
    assert_eq!(metadata["Description"], "A long journey.");

    assert!(!fixture.root().join(".partial").join(format!("job-{}", job_id)).exists());

    let job = fixture.jobs.lock().unwrap().get_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.destination, Some(destination.display().to_string()));
}

#[tokio::test]
async fn test_selected_chapters_only() {
    let server = MockServer::start().await;
    mount_series(&server).await;

    Mock::given(method("GET"))
        .and(path("/chapter/example-title/chapter-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader_page(2)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/cdn/example-title/2/\d+\.jpg$"))
        .respond_with(PageImages { pages: 2 })
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chapter/example-title/chapter-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader_page(3)))
        .expect(0)
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server);
    let mut request = DownloadRequest::new(series(), "Example Title");
    request.chapters = Some(vec![Chapter {
        key: ChapterKey::MangaHub {
            slug: "example-title".to_string(),
            number: "2".to_string(),
        },
        title: "Chapter 2".to_string(),
        number: ChapterNumber(2.0),
        url: format!("{}/chapter/example-title/chapter-2", server.uri()),
        series: series(),
        fallback_urls: Vec::new(),
    }]);

    let job_id = fixture.create_job();
    let report = fixture.downloader.run(job_id, request).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.chapters_total, 1);
    assert!(fixture
        .root()
        .join("Example Title")
        .join("Chapter 2 - Chapter 2.cbz")
        .is_file());
}

#[tokio::test]
async fn test_series_without_chapters_fails_the_job() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server);
    let job_id = fixture.create_job();
    let report = fixture
        .downloader
        .run(job_id, DownloadRequest::new(series(), "Example Title"))
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Failed);
    assert!(!fixture.root().join("Example Title").exists());

    let job = fixture.jobs.lock().unwrap().get_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("No chapters found"));
}

#[tokio::test]
async fn test_cancelled_job_does_not_start() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERIES_PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server);
    let job_id = fixture.create_job();
    assert!(fixture.jobs.lock().unwrap().cancel(job_id).unwrap());

    let report = fixture
        .downloader
        .run(job_id, DownloadRequest::new(series(), "Example Title"))
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Cancelled);
    assert_eq!(report.chapters_downloaded, 0);
    assert!(!fixture.root().join("Example Title").exists());

    let job = fixture.jobs.lock().unwrap().get_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
}

/// Serves one JPEG page and cancels the job while doing so
struct CancellingImage {
    jobs: SharedJobStore,
    job_id: i64,
}

impl Respond for CancellingImage {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.jobs.lock().unwrap().cancel(self.job_id).unwrap();
        ResponseTemplate::new(200)
            .insert_header("content-type", "image/jpeg")
            .set_body_bytes(JPEG.to_vec())
    }
}

#[tokio::test]
async fn test_cancel_after_last_page_keeps_the_archives() {
    let server = MockServer::start().await;

    let series_page = r#"
        <div class="summary">A long journey.</div>
        <ul><li><a href="/chapter/example-title/chapter-1">Chapter 1</a></li></ul>"#;
    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string(series_page))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chapter/example-title/chapter-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader_page(1)))
        .mount(&server)
        .await;

    let fixture = Fixture::new(&server);
    let job_id = fixture.create_job();

    Mock::given(method("GET"))
        .and(path("/cdn/example-title/1/1.jpg"))
        .respond_with(CancellingImage {
            jobs: Arc::clone(&fixture.jobs),
            job_id,
        })
        .mount(&server)
        .await;

    let report = fixture
        .downloader
        .run(job_id, DownloadRequest::new(series(), "Example Title"))
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Cancelled);
    assert_eq!(report.chapters_downloaded, 1);
    assert!(fixture
        .root()
        .join("Example Title")
        .join("Chapter 1 - Chapter 1.cbz")
        .is_file());

    let job = fixture.jobs.lock().unwrap().get_job(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
}
