//! FanFox connector: chapter listing and the paginated packed-script image API

use manga_conduit::model::{ChapterKey, SeriesKey, SourceId};
use manga_conduit::Connector;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::test_config;

const PAGE_ONE: &str = include_str!("../fixtures/chapterfun_page1.js");
const PAGE_TWO: &str = include_str!("../fixtures/chapterfun_page2.js");

fn connector(server: &MockServer) -> Connector {
    let mut config = test_config(&[SourceId::FanFox]);
    config.sources.fanfox.base_url = server.uri();
    Connector::from_config(SourceId::FanFox, &config).unwrap()
}

fn series() -> SeriesKey {
    SeriesKey::FanFox {
        slug: "berserk".to_string(),
    }
}

async fn mount_series_page(server: &MockServer) {
    let html = r#"
        <ul class="detail-main-list">
          <li><a href="/manga/berserk/v01/c002/1.html">Vol.01 Ch.002</a></li>
          <li><a href="/manga/berserk/v01/c001/1.html">Vol.01 Ch.001</a></li>
        </ul>
        <a href="/manga/other/c001/1.html">Other series</a>"#;

    Mock::given(method("GET"))
        .and(path("/manga/berserk/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_by_title() {
    let server = MockServer::start().await;
    let html = r#"
        <ul class="manga-list-4-list">
          <li><p class="manga-list-4-item-title"><a href="/manga/berserk/" title="Berserk">Berserk</a></p></li>
          <li><p class="manga-list-4-item-title"><a href="/manga/berserk_of_gluttony/">Berserk of Gluttony</a></p></li>
          <li><p class="manga-list-4-item-title"><a href="/manga/vagabond/">Vagabond</a></p></li>
        </ul>"#;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("title", "berserk"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let results = connector(&server).search("berserk", None).await;

    let titles: Vec<&str> = results.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Berserk", "Berserk of Gluttony"]);
    assert_eq!(results[0].key, series());
}

#[tokio::test]
async fn test_search_query_is_url_encoded() {
    let server = MockServer::start().await;
    let html = r#"<ul><li><a href="/manga/tom_jerry/">Tom & Jerry #1?</a></li></ul>"#;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("title", "Tom & Jerry #1?"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let results = connector(&server).search("Tom & Jerry #1?", None).await;

    let titles: Vec<&str> = results.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Tom & Jerry #1?"]);
}

#[tokio::test]
async fn test_chapters_keep_the_volume_path() {
    let server = MockServer::start().await;
    mount_series_page(&server).await;

    let chapters = connector(&server).list_chapters(&series()).await;

    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].number.value(), 1.0);
    assert_eq!(
        chapters[0].key,
        ChapterKey::FanFox {
            slug: "berserk".to_string(),
            path: "v01/c001".to_string()
        }
    );
    assert_eq!(
        chapters[1].url,
        format!("{}/manga/berserk/v01/c002/1.html", server.uri())
    );
}

#[tokio::test]
async fn test_pages_walk_the_image_api() {
    let server = MockServer::start().await;
    mount_series_page(&server).await;

    let reader = r#"
        <html><head><script type="text/javascript">
          var comicid = 246; var chapterid =12345; var imagepage=1; var imagecount=3;
        </script></head><body></body></html>"#;

    Mock::given(method("GET"))
        .and(path("/manga/berserk/v01/c001/1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader))
        .mount(&server)
        .await;

    for (page, body) in [("1", PAGE_ONE), ("2", PAGE_TWO)] {
        Mock::given(method("GET"))
            .and(path("/manga/berserk/v01/c001/chapterfun.ashx"))
            .and(query_param("cid", "12345"))
            .and(query_param("page", page))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let connector = connector(&server);
    let chapter = connector.list_chapters(&series()).await.remove(0);
    let pages = connector.list_pages(&chapter).await.unwrap();

    let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://zjcdn.mangafox.me/store/manga/246/compressed/q001.jpg",
            "https://zjcdn.mangafox.me/store/manga/246/compressed/q002.jpg",
            "https://zjcdn.mangafox.me/store/manga/246/compressed/q003.jpg",
        ]
    );
    assert!(pages
        .iter()
        .all(|page| page.referer.as_deref() == Some(chapter.url.as_str())));
}

#[tokio::test]
async fn test_reader_without_chapter_id_is_scanned_for_images() {
    let server = MockServer::start().await;
    mount_series_page(&server).await;

    let reader = r#"
        <div class="reader-main">
          <img src="https://zjcdn.mangafox.me/store/manga/246/compressed/q001.jpg">
        </div>"#;

    Mock::given(method("GET"))
        .and(path("/manga/berserk/v01/c001/1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reader))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let chapter = connector.list_chapters(&series()).await.remove(0);
    let pages = connector.list_pages(&chapter).await.unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(
        pages[0].url,
        "https://zjcdn.mangafox.me/store/manga/246/compressed/q001.jpg"
    );
    assert_eq!(pages[0].referer.as_deref(), Some(chapter.url.as_str()));
}
