//! HentaiFox connector against a mock gallery site

use manga_conduit::model::{SeriesKey, SourceId};
use manga_conduit::Connector;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{test_config, PageImages};

fn connector(server: &MockServer) -> Connector {
    let mut config = test_config(&[SourceId::HentaiFox]);
    config.sources.hentaifox.base_url = server.uri();
    config.sources.hentaifox.image_base_url = format!("{}/img", server.uri());
    Connector::from_config(SourceId::HentaiFox, &config).unwrap()
}

fn gallery(gallery_id: u64) -> SeriesKey {
    SeriesKey::HentaiFox { gallery_id }
}

#[tokio::test]
async fn test_search_reads_gallery_cards() {
    let server = MockServer::start().await;
    let html = r#"
        <div class="thumb">
          <div class="inner_thumb"><a href="/gallery/149500/"><img data-src="/thumbs/149500.jpg"></a></div>
          <div class="caption">
            <h2 class="g_title"><a href="/gallery/149500/">Summer Example</a></h2>
            <h3 class="g_cat"><a href="/category/doujinshi/">Doujinshi</a></h3>
          </div>
        </div>
        <div class="thumb">
          <div class="caption"><h2 class="g_title"><a href="/gallery/149501/">Winter Tale</a></h2></div>
        </div>"#;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("q", "summer"))
        .and(query_param("sort", "latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let results = connector(&server).search("summer", None).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].key, gallery(149500));
    assert_eq!(results[0].title, "Summer Example");
    assert_eq!(results[0].genres, vec!["doujinshi"]);
    assert_eq!(
        results[0].cover_url,
        Some(format!("{}/thumbs/149500.jpg", server.uri()))
    );
    assert!(results.iter().all(|entry| entry.adult));
}

#[tokio::test]
async fn test_gallery_is_one_chapter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gallery/123/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let chapters = connector(&server).list_chapters(&gallery(123)).await;

    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].title, "Complete Gallery");
    assert_eq!(chapters[0].number.value(), 1.0);
    assert_eq!(chapters[0].url, format!("{}/gallery/123/", server.uri()));
}

#[tokio::test]
async fn test_missing_gallery_has_no_chapters() {
    let server = MockServer::start().await;
    let chapters = connector(&server).list_chapters(&gallery(404)).await;
    assert!(chapters.is_empty());
}

#[tokio::test]
async fn test_pages_are_probed_when_the_gallery_has_no_count() {
    let server = MockServer::start().await;

    let html = r#"<div class="info"><h1>Untitled</h1></div>"#;

    Mock::given(method("GET"))
        .and(path("/gallery/123/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    Mock::given(method("HEAD"))
        .and(path_regex(r"^/img/123/\d+\.jpg$"))
        .respond_with(PageImages { pages: 23 })
        .mount(&server)
        .await;

    let connector = connector(&server);
    let chapter = connector.list_chapters(&gallery(123)).await.remove(0);
    let pages = connector.list_pages(&chapter).await.unwrap();

    assert_eq!(pages.len(), 23);
    assert_eq!(pages[0].url, format!("{}/img/123/1.jpg", server.uri()));
    assert_eq!(pages[22].url, format!("{}/img/123/23.jpg", server.uri()));
    assert_eq!(
        pages[0].referer,
        Some(format!("{}/gallery/123/", server.uri()))
    );
}

#[tokio::test]
async fn test_stated_page_count_with_webp_images() {
    let server = MockServer::start().await;
    let html = r#"
        <div class="info">
          <h1>Twelve Pages</h1>
          <span class="i_text pages">Pages: 12</span>
        </div>"#;

    Mock::given(method("GET"))
        .and(path("/gallery/456/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let chapter = connector.list_chapters(&gallery(456)).await.remove(0);
    let pages = connector.list_pages(&chapter).await.unwrap();

    assert_eq!(pages.len(), 12);
    assert_eq!(pages[11].url, format!("{}/img/456/12.webp", server.uri()));
}
