use super::*;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>Releases</title>
        <link>https://example.com</link>
        <item>
            <title>Movie</title>
            <link>magnet:?xt=urn:btih:ABC&amp;dn=Movie</link>
        </item>
        <item>
            <title>Show</title>
            <enclosure url="magnet:?xt=urn:btih:DEF&amp;dn=Show" type="application/x-bittorrent"/>
        </item>
    </channel>
</rss>"#;

fn magnet(uri: &str) -> MagnetLink {
    MagnetLink::parse(uri).unwrap()
}

async fn serve_feed(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn fetch_links_parses_served_feed() {
    let server = serve_feed(200, SAMPLE_FEED).await;
    let source = FeedSource::new(format!("{}/rss", server.uri()), None).unwrap();

    let links = source.fetch_links().await.unwrap();

    assert_eq!(links.len(), 2);
    assert_eq!(links[0].as_str(), "magnet:?xt=urn:btih:ABC&dn=Movie");
    assert_eq!(links[1].as_str(), "magnet:?xt=urn:btih:DEF&dn=Show");
    assert_eq!(FeedSource::display_name(&links[0]).as_deref(), Some("Movie"));
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error_with_body() {
    let server = serve_feed(503, "feed offline").await;
    let source = FeedSource::new(format!("{}/rss", server.uri()), None).unwrap();

    match source.fetch_links().await {
        Err(Error::FeedFetch { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "feed offline");
        }
        other => panic!("expected FeedFetch, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_feed_is_a_transport_error() {
    let source = FeedSource::new("http://127.0.0.1:9/rss", None).unwrap();

    assert!(matches!(
        source.fetch_links().await,
        Err(Error::FeedTransport(_))
    ));
}

#[tokio::test]
async fn malformed_feed_is_a_parse_error() {
    let server = serve_feed(200, "<rss><channel><item></channel></rss>").await;
    let source = FeedSource::new(format!("{}/rss", server.uri()), None).unwrap();

    assert!(matches!(
        source.fetch_links().await,
        Err(Error::FeedParse(_))
    ));
}

#[tokio::test]
async fn filter_without_ledger_is_identity() {
    let source = FeedSource::new("https://example.com/rss", None).unwrap();
    let links = vec![magnet("magnet:?xt=urn:btih:A"), magnet("magnet:?xt=urn:btih:B")];

    let filtered = source.filter_undownloaded(links.clone()).await.unwrap();

    assert_eq!(filtered, links);
}

#[tokio::test]
async fn mark_without_ledger_is_a_no_op() {
    let source = FeedSource::new("https://example.com/rss", None).unwrap();

    source
        .mark_downloaded(&magnet("magnet:?xt=urn:btih:A"))
        .await
        .unwrap();

    assert!(source.ledger().is_none());
}

#[tokio::test]
async fn filter_with_missing_ledger_file_keeps_everything() {
    let dir = tempdir().unwrap();
    let source = FeedSource::new(
        "https://example.com/rss",
        Some(dir.path().join("history.txt")),
    )
    .unwrap();
    let links = vec![magnet("magnet:?xt=urn:btih:A")];

    let filtered = source.filter_undownloaded(links.clone()).await.unwrap();

    assert_eq!(filtered, links);
}

#[tokio::test]
async fn mark_then_filter_removes_the_link() {
    let dir = tempdir().unwrap();
    let source = FeedSource::new(
        "https://example.com/rss",
        Some(dir.path().join("history.txt")),
    )
    .unwrap();
    let link = magnet("magnet:?xt=urn:btih:A&dn=Movie");

    source.mark_downloaded(&link).await.unwrap();
    let filtered = source.filter_undownloaded(vec![link]).await.unwrap();

    assert!(filtered.is_empty());
}

#[tokio::test]
async fn filter_is_idempotent_without_intervening_marks() {
    let dir = tempdir().unwrap();
    let source = FeedSource::new(
        "https://example.com/rss",
        Some(dir.path().join("history.txt")),
    )
    .unwrap();
    source
        .mark_downloaded(&magnet("magnet:?xt=urn:btih:B"))
        .await
        .unwrap();
    let links = vec![
        magnet("magnet:?xt=urn:btih:A"),
        magnet("magnet:?xt=urn:btih:B"),
        magnet("magnet:?xt=urn:btih:C"),
    ];

    let first = source.filter_undownloaded(links.clone()).await.unwrap();
    let second = source.filter_undownloaded(links).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(MagnetLink::as_str).collect::<Vec<_>>(),
        vec!["magnet:?xt=urn:btih:A", "magnet:?xt=urn:btih:C"]
    );
}

#[tokio::test]
async fn marking_twice_records_once() {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("history.txt");
    let source = FeedSource::new("https://example.com/rss", Some(ledger_path.clone())).unwrap();
    let link = magnet("magnet:?xt=urn:btih:A");

    source.mark_downloaded(&link).await.unwrap();
    source.mark_downloaded(&link).await.unwrap();

    let on_disk = std::fs::read_to_string(ledger_path).unwrap();
    assert_eq!(on_disk, "magnet:?xt=urn:btih:A\n");
}
