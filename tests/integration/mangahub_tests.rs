//! MangaHub connector against a mock site and CDN

use manga_conduit::model::{Chapter, ChapterKey, ChapterNumber, SeriesKey, SourceId};
use manga_conduit::Connector;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{test_config, use_mangahub, PageImages};

async fn connector(server: &MockServer, cdns: &[&str]) -> Connector {
    let mut config = test_config(&[SourceId::MangaHub]);
    use_mangahub(&mut config, &server.uri(), cdns);
    Connector::from_config(SourceId::MangaHub, &config).unwrap()
}

fn series() -> SeriesKey {
    SeriesKey::MangaHub {
        slug: "example-title".to_string(),
    }
}

fn chapter_one(server: &MockServer) -> Chapter {
    Chapter {
        key: ChapterKey::MangaHub {
            slug: "example-title".to_string(),
            number: "1".to_string(),
        },
        title: "Chapter 1".to_string(),
        number: ChapterNumber(1.0),
        url: format!("{}/chapter/example-title/chapter-1", server.uri()),
        series: series(),
        fallback_urls: Vec::new(),
    }
}

#[tokio::test]
async fn test_search_orders_by_relevance_and_drops_non_matches() {
    let server = MockServer::start().await;
    let html = r#"
        <html><body>
          <div class="item"><a href="/manga/example-title-side-story">Example Title Side Story</a></div>
          <div class="item"><a href="/manga/example-title">Example Title</a>
            <a href="/genre/action">Action</a></div>
          <div class="item"><a href="/manga/unrelated">Unrelated Series</a></div>
        </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let results = connector(&server, &["cdn"]).await.search("Example Title", None).await;

    let titles: Vec<&str> = results.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Example Title", "Example Title Side Story"]);
    assert_eq!(results[0].key, series());
    assert_eq!(results[0].url, format!("{}/manga/example-title", server.uri()));
    assert_eq!(results[0].genres, vec!["Action"]);
}

#[tokio::test]
async fn test_search_query_is_url_encoded() {
    let server = MockServer::start().await;
    let html = r#"<div class="item"><a href="/manga/tom-and-jerry">Tom & Jerry</a></div>"#;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Tom & Jerry"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let results = connector(&server, &["cdn"]).await.search("Tom & Jerry", None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].key,
        SeriesKey::MangaHub {
            slug: "tom-and-jerry".to_string()
        }
    );
}

#[tokio::test]
async fn test_search_failure_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let results = connector(&server, &["cdn"]).await.search("anything", None).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_chapters_are_sorted_with_fallbacks() {
    let server = MockServer::start().await;
    let html = r#"
        <html><body>
          <div class="latest"><a href="/chapter/example-title/chapter-10.5?from=latest">Newest</a></div>
          <ul>
            <li><a href="/chapter/example-title/chapter-2">Chapter 2</a></li>
            <li><a href="/chapter/example-title/chapter-10.5">Chapter 10.5</a></li>
            <li><a href="/chapter/example-title/chapter-1">Chapter 1</a></li>
            <li><a href="/chapter/another-series/chapter-3">Elsewhere</a></li>
          </ul>
        </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let chapters = connector(&server, &["cdn"]).await.list_chapters(&series()).await;

    let numbers: Vec<f64> = chapters.iter().map(|c| c.number.value()).collect();
    assert_eq!(numbers, vec![1.0, 2.0, 10.5]);

    let last = &chapters[2];
    assert_eq!(
        last.url,
        format!("{}/chapter/example-title/chapter-10.5", server.uri())
    );
    assert_eq!(last.fallback_urls.len(), 1);
    assert!(last.fallback_urls[0].ends_with("?from=latest"));
    assert_eq!(
        last.key,
        ChapterKey::MangaHub {
            slug: "example-title".to_string(),
            number: "10.5".to_string()
        }
    );
    assert_eq!(last.series, series());
}

#[tokio::test]
async fn test_pages_probe_the_next_cdn_when_the_first_is_dead() {
    let server = MockServer::start().await;

    // No chapter page and nothing on cdn1: every request there is a 404
    Mock::given(method("HEAD"))
        .and(path_regex(r"^/cdn2/example-title/1/\d+\.jpg$"))
        .respond_with(PageImages { pages: 23 })
        .mount(&server)
        .await;

    let pages = connector(&server, &["cdn1", "cdn2"])
        .await
        .list_pages(&chapter_one(&server))
        .await
        .unwrap();

    assert_eq!(pages.len(), 23);
    assert_eq!(
        pages[0].url,
        format!("{}/cdn2/example-title/1/1.jpg", server.uri())
    );
    assert_eq!(
        pages[0].fallbacks,
        vec![format!("{}/cdn1/example-title/1/1.jpg", server.uri())]
    );
    assert!(pages[22].url.ends_with("/cdn2/example-title/1/23.jpg"));
}

#[tokio::test]
async fn test_page_count_from_chapter_page_skips_probing() {
    let server = MockServer::start().await;
    let html = r#"
        <select name="page">
          <option value="1">1</option>
          <option value="2">2</option>
          <option value="12">12</option>
        </select>"#;

    Mock::given(method("GET"))
        .and(path("/chapter/example-title/chapter-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .respond_with(PageImages { pages: 40 })
        .expect(0)
        .mount(&server)
        .await;

    let pages = connector(&server, &["cdn"])
        .await
        .list_pages(&chapter_one(&server))
        .await
        .unwrap();

    assert_eq!(pages.len(), 12);
    assert!(pages[11].url.ends_with("/cdn/example-title/1/12.jpg"));
}

#[tokio::test]
async fn test_unknown_page_count_falls_back_to_fifty() {
    let server = MockServer::start().await;

    let pages = connector(&server, &["cdn"])
        .await
        .list_pages(&chapter_one(&server))
        .await
        .unwrap();

    assert_eq!(pages.len(), 50);
}

#[tokio::test]
async fn test_details_from_series_page() {
    let server = MockServer::start().await;
    let html = r#"
        <div class="detail-info">
          <div class="detail-info-cover"><img src="/media/covers/example-title.jpg"></div>
          <div class="summary">A long journey.</div>
          <div class="status"><span>Completed</span></div>
          <div class="genres"><a>Fantasy</a></div>
        </div>"#;

    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let details = connector(&server, &["cdn"]).await.get_details(&series()).await;

    assert_eq!(details.description.as_deref(), Some("A long journey."));
    assert_eq!(details.status.as_deref(), Some("Completed"));
    assert_eq!(details.genres, vec!["Fantasy"]);
    assert_eq!(
        details.cover_url,
        Some(format!("{}/media/covers/example-title.jpg", server.uri()))
    );
}

#[tokio::test]
async fn test_zero_padded_chapter_links_use_the_normalized_number() {
    let server = MockServer::start().await;
    let html = r#"<a href="/chapter/example-title/chapter-012">Chapter 12</a>"#;

    Mock::given(method("GET"))
        .and(path("/manga/example-title"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let chapters = connector(&server, &["cdn"]).await.list_chapters(&series()).await;

    assert_eq!(chapters.len(), 1);
    assert_eq!(
        chapters[0].key,
        ChapterKey::MangaHub {
            slug: "example-title".to_string(),
            number: "12".to_string()
        }
    );
    assert_eq!(chapters[0].title, "Chapter 12");
}
