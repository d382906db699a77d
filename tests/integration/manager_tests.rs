//! Fan-out search across several mock sources

use manga_conduit::model::{SeriesKey, SourceId};
use manga_conduit::{ConnectorManager, SearchOptions};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{test_config, use_mangahub};

const MANGAHUB_RESULTS: &str = r#"
    <div class="item"><a href="/manga/example-title">Example Title</a>
      <a href="/genre/action">Action</a></div>
    <div class="item"><a href="/manga/example-title-after-dark">Example Title After Dark</a>
      <a href="/genre/mature">Mature</a></div>"#;

const FANFOX_RESULTS: &str = r#"
    <ul>
      <li><a href="/manga/example_title/">Example Title</a></li>
      <li><a href="/manga/example_title_side_story/">Example Title: Side Story</a></li>
    </ul>"#;

async fn mount_search(server: &MockServer, param: &str, body: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param(param, "Example Title"))
        .respond_with(body)
        .mount(server)
        .await;
}

/// MangaHub and FanFox on their own mock servers
fn manager(mangahub: &MockServer, fanfox: &MockServer, cache_ttl_secs: u64) -> ConnectorManager {
    let mut config = test_config(&[SourceId::MangaHub, SourceId::FanFox]);
    use_mangahub(&mut config, &mangahub.uri(), &["cdn"]);
    config.sources.fanfox.base_url = fanfox.uri();
    config.search.cache_ttl_secs = cache_ttl_secs;
    ConnectorManager::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_failing_source_does_not_affect_the_others() {
    let mangahub = MockServer::start().await;
    let fanfox = MockServer::start().await;
    mount_search(
        &mangahub,
        "q",
        ResponseTemplate::new(200).set_body_string(MANGAHUB_RESULTS),
    )
    .await;
    mount_search(&fanfox, "title", ResponseTemplate::new(503)).await;

    let results = manager(&mangahub, &fanfox, 0)
        .search("Example Title", &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, SourceId::MangaHub);
    assert_eq!(results[0].1.len(), 2);
    assert_eq!(results[1].0, SourceId::FanFox);
    assert!(results[1].1.is_empty());
}

#[tokio::test]
async fn test_results_follow_the_requested_source_order() {
    let mangahub = MockServer::start().await;
    let fanfox = MockServer::start().await;
    mount_search(
        &mangahub,
        "q",
        ResponseTemplate::new(200).set_body_string(MANGAHUB_RESULTS),
    )
    .await;
    mount_search(
        &fanfox,
        "title",
        ResponseTemplate::new(200).set_body_string(FANFOX_RESULTS),
    )
    .await;

    let options = SearchOptions {
        sources: Some(vec![SourceId::FanFox, SourceId::OmegaScans, SourceId::MangaHub]),
        ..SearchOptions::default()
    };
    let results = manager(&mangahub, &fanfox, 0)
        .search("Example Title", &options)
        .await;

    // OmegaScans is disabled and skipped
    let order: Vec<SourceId> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![SourceId::FanFox, SourceId::MangaHub]);
    assert_eq!(results[0].1.len(), 2);
}

#[tokio::test]
async fn test_merged_search_folds_duplicate_titles() {
    let mangahub = MockServer::start().await;
    let fanfox = MockServer::start().await;
    mount_search(
        &mangahub,
        "q",
        ResponseTemplate::new(200).set_body_string(MANGAHUB_RESULTS),
    )
    .await;
    mount_search(
        &fanfox,
        "title",
        ResponseTemplate::new(200).set_body_string(FANFOX_RESULTS),
    )
    .await;

    let merged = manager(&mangahub, &fanfox, 0)
        .search_merged("Example Title", &SearchOptions::default())
        .await;

    let titles: Vec<&str> = merged.iter().map(|s| s.entry.title.as_str()).collect();
    assert_eq!(titles.len(), 3);
    assert_eq!(titles[0], "Example Title");

    // Same title on both sites: MangaHub outranks FanFox
    assert_eq!(
        merged[0].entry.key,
        SeriesKey::MangaHub {
            slug: "example-title".to_string()
        }
    );
    assert_eq!(merged[0].relevance, 100);
    assert!(merged[1..].iter().all(|s| s.relevance == 50));
}

#[tokio::test]
async fn test_adult_filter_hides_adult_sources_and_entries() {
    let mangahub = MockServer::start().await;
    let fanfox = MockServer::start().await;
    mount_search(
        &mangahub,
        "q",
        ResponseTemplate::new(200).set_body_string(MANGAHUB_RESULTS),
    )
    .await;
    mount_search(
        &fanfox,
        "title",
        ResponseTemplate::new(200).set_body_string(FANFOX_RESULTS),
    )
    .await;

    let options = SearchOptions {
        sources: Some(vec![SourceId::MangaHub]),
        filter_adult: true,
        ..SearchOptions::default()
    };
    let results = manager(&mangahub, &fanfox, 0)
        .search("Example Title", &options)
        .await;

    assert_eq!(results.len(), 1);
    let titles: Vec<&str> = results[0].1.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Example Title"]);
}

#[tokio::test]
async fn test_repeated_search_is_served_from_cache() {
    let mangahub = MockServer::start().await;
    let fanfox = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANGAHUB_RESULTS))
        .expect(1)
        .mount(&mangahub)
        .await;

    let manager = manager(&mangahub, &fanfox, 300);
    let options = SearchOptions {
        sources: Some(vec![SourceId::MangaHub]),
        ..SearchOptions::default()
    };

    let first = manager.search("Example Title", &options).await;
    let second = manager.search("  example   TITLE ", &options).await;

    assert_eq!(first, second);
    assert_eq!(manager.cache().len(), 1);
}
