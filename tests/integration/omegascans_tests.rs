//! OmegaScans connector against a mock JSON API

use manga_conduit::model::{Chapter, ChapterKey, ChapterNumber, SeriesKey, SourceId};
use manga_conduit::{Connector, ConnectorError};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::test_config;

fn connector(server: &MockServer) -> Connector {
    let mut config = test_config(&[SourceId::OmegaScans]);
    config.sources.omegascans.base_url = server.uri();
    config.sources.omegascans.api_url = format!("{}/api", server.uri());
    config.sources.omegascans.catalog_pages = 1;
    Connector::from_config(SourceId::OmegaScans, &config).unwrap()
}

fn series() -> SeriesKey {
    SeriesKey::OmegaScans {
        id: 7,
        slug: "example-title".to_string(),
    }
}

fn chapter(server: &MockServer, chapter_slug: &str) -> Chapter {
    Chapter {
        key: ChapterKey::OmegaScans {
            series_slug: "example-title".to_string(),
            chapter_slug: chapter_slug.to_string(),
        },
        title: "Chapter 1".to_string(),
        number: ChapterNumber(1.0),
        url: format!("{}/series/example-title/{}", server.uri(), chapter_slug),
        series: series(),
        fallback_urls: Vec::new(),
    }
}

fn json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn test_search_endpoint_results_are_ranked() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/query/.+$"))
        .respond_with(json(serde_json::json!({
            "data": [
                {"id": 8, "title": "Another Story", "series_slug": "another-story", "adult": true},
                {
                    "id": 7,
                    "title": "Example Title",
                    "series_slug": "example-title",
                    "thumbnail": "https://media.omegascans.org/file/example.jpg",
                    "adult": false
                },
                {"title": "Malformed entry without id"}
            ]
        })))
        .mount(&server)
        .await;

    let results = connector(&server).search("Example Title", None).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].key, series());
    assert_eq!(
        results[0].url,
        format!("{}/series/example-title", server.uri())
    );
    assert_eq!(
        results[0].cover_url.as_deref(),
        Some("https://media.omegascans.org/file/example.jpg")
    );
    assert!(!results[0].adult);

    // The API already filtered, so the non-matching hit stays, last
    assert_eq!(results[1].title, "Another Story");
    assert!(results[1].adult);
}

#[tokio::test]
async fn test_empty_search_filters_the_catalog() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/query/.+$"))
        .respond_with(json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("adult", "true"))
        .respond_with(json(serde_json::json!({
            "data": [{"id": 1, "title": "Night Knight", "series_slug": "night-knight"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("adult", "false"))
        .respond_with(json(serde_json::json!({
            "data": [
                {"id": 2, "title": "The Knight Returns", "series_slug": "the-knight-returns"},
                {"id": 3, "title": "Cooking Club", "series_slug": "cooking-club"}
            ]
        })))
        .mount(&server)
        .await;

    let results = connector(&server).search("knight", None).await;

    let titles: Vec<&str> = results.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Night Knight"));
    assert!(titles.contains(&"The Knight Returns"));
    assert!(results.iter().find(|e| e.title == "Night Knight").unwrap().adult);
}

#[tokio::test]
async fn test_catalog_respects_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(json(serde_json::json!({
            "data": [
                {"id": 1, "title": "One", "series_slug": "one"},
                {"id": 2, "title": "Two", "series_slug": "two"},
                {"id": 3, "title": "Three", "series_slug": "three"}
            ]
        })))
        .mount(&server)
        .await;

    let entries = connector(&server).list_catalog(Some(2)).await;
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_season_chapters_are_prefixed_and_sorted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/series/example-title"))
        .respond_with(json(serde_json::json!({
            "seasons": [
                {
                    "index": 1,
                    "chapters": [
                        {"chapter_name": "Chapter 2", "chapter_title": "The Return", "chapter_slug": "chapter-2"},
                        {"chapter_name": "Chapter 1", "chapter_title": null, "chapter_slug": "chapter-1"}
                    ]
                },
                {
                    "index": 2,
                    "chapters": [
                        {"chapter_name": "Chapter 3", "chapter_slug": "chapter-3"},
                        {"chapter_name": "Prologue", "chapter_slug": "prologue"}
                    ]
                }
            ]
        })))
        .mount(&server)
        .await;

    let chapters = connector(&server).list_chapters(&series()).await;

    let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "S1 Chapter 1",
            "S1 Chapter 2 The Return",
            "S2 Prologue",
            "S2 Chapter 3"
        ]
    );
    assert_eq!(
        chapters[0].url,
        format!("{}/series/example-title/chapter-1", server.uri())
    );
    assert_eq!(
        chapters[2].key,
        ChapterKey::OmegaScans {
            series_slug: "example-title".to_string(),
            chapter_slug: "prologue".to_string()
        }
    );
    assert_eq!(
        chapters[3].key,
        ChapterKey::OmegaScans {
            series_slug: "example-title".to_string(),
            chapter_slug: "chapter-3".to_string()
        }
    );
}

#[tokio::test]
async fn test_seasons_restarting_numbering_keep_every_chapter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/series/example-title"))
        .respond_with(json(serde_json::json!({
            "seasons": [
                {
                    "index": 2,
                    "chapters": [
                        {"chapter_name": "Chapter 2", "chapter_slug": "s2-chapter-2"},
                        {"chapter_name": "Chapter 1", "chapter_slug": "s2-chapter-1"}
                    ]
                },
                {
                    "index": 1,
                    "chapters": [
                        {"chapter_name": "Chapter 2", "chapter_slug": "s1-chapter-2"},
                        {"chapter_name": "Chapter 1", "chapter_slug": "s1-chapter-1"}
                    ]
                }
            ]
        })))
        .mount(&server)
        .await;

    let chapters = connector(&server).list_chapters(&series()).await;

    let listed: Vec<(&str, &str)> = chapters
        .iter()
        .map(|c| (c.title.as_str(), c.url.rsplit('/').next().unwrap_or("")))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("S1 Chapter 1", "s1-chapter-1"),
            ("S1 Chapter 2", "s1-chapter-2"),
            ("S2 Chapter 1", "s2-chapter-1"),
            ("S2 Chapter 2", "s2-chapter-2"),
        ]
    );
    assert!(chapters.iter().all(|c| c.fallback_urls.is_empty()));
}

#[tokio::test]
async fn test_chapter_query_when_seasons_are_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chapter/query"))
        .and(query_param("series_id", "7"))
        .respond_with(json(serde_json::json!({
            "data": [
                {"chapter_name": "Chapter 5", "chapter_slug": "chapter-5"},
                {"chapter_name": "Chapter 4", "chapter_slug": "chapter-4"}
            ]
        })))
        .mount(&server)
        .await;

    let chapters = connector(&server).list_chapters(&series()).await;

    let numbers: Vec<f64> = chapters.iter().map(|c| c.number.value()).collect();
    assert_eq!(numbers, vec![4.0, 5.0]);
    assert_eq!(chapters[0].title, "Chapter 4");
}

#[tokio::test]
async fn test_pages_from_chapter_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chapter/example-title/chapter-1"))
        .respond_with(json(serde_json::json!({
            "chapter": {
                "chapter_type": "Comic",
                "chapter_data": {
                    "images": [
                        "https://media.omegascans.org/file/1.jpg",
                        "//media.omegascans.org/file/2.jpg"
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let pages = connector(&server)
        .list_pages(&chapter(&server, "chapter-1"))
        .await
        .unwrap();

    let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://media.omegascans.org/file/1.jpg",
            "https://media.omegascans.org/file/2.jpg"
        ]
    );
}

#[tokio::test]
async fn test_paywalled_chapter_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chapter/example-title/chapter-40"))
        .respond_with(json(serde_json::json!({"paywall": true})))
        .mount(&server)
        .await;

    let err = connector(&server)
        .list_pages(&chapter(&server, "chapter-40"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Paywall(_)));
}

#[tokio::test]
async fn test_novel_chapter_is_unsupported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chapter/example-title/chapter-2"))
        .respond_with(json(serde_json::json!({
            "chapter": {"chapter_type": "Novel"}
        })))
        .mount(&server)
        .await;

    let err = connector(&server)
        .list_pages(&chapter(&server, "chapter-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::UnsupportedContent(_)));
}

#[tokio::test]
async fn test_missing_chapter_degrades_to_no_pages() {
    let server = MockServer::start().await;

    let pages = connector(&server)
        .list_pages(&chapter(&server, "chapter-9"))
        .await
        .unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_details_from_api() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/query/7"))
        .respond_with(json(serde_json::json!({
            "data": {
                "description": "A knight returns.",
                "status": "Ongoing",
                "genres": [{"name": "Action"}, "Fantasy"],
                "authors": ["Kim"],
                "thumbnail": "/covers/example.jpg"
            }
        })))
        .mount(&server)
        .await;

    let details = connector(&server).get_details(&series()).await;

    assert_eq!(details.description.as_deref(), Some("A knight returns."));
    assert_eq!(details.status.as_deref(), Some("Ongoing"));
    assert_eq!(details.genres, vec!["Action", "Fantasy"]);
    assert_eq!(details.authors, vec!["Kim"]);
    assert_eq!(
        details.cover_url,
        Some(format!("{}/covers/example.jpg", server.uri()))
    );
}
