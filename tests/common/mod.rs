//! Common test utilities for debrid-relay integration tests

use debrid_relay::{Config, MagnetLink, Result};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve `body` as the RSS feed at `/rss`
pub async fn mount_feed(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Feed with a single item whose `<link>` is `magnet`
pub fn single_item_feed(magnet: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>Releases</title>
        <link>https://example.com</link>
        <item>
            <title>Release</title>
            <link>{}</link>
        </item>
    </channel>
</rss>"#,
        magnet.replace('&', "&amp;")
    )
}

/// Mount a torrent that moves through `statuses` on successive polls
///
/// The last status repeats for every later poll. When it is `downloaded`, the torrent
/// carries one result link that unrestricts to `direct`.
pub async fn mount_torrent(
    server: &MockServer,
    hash: &str,
    torrent_id: &str,
    statuses: &[&str],
    direct: &str,
) {
    Mock::given(method("POST"))
        .and(path("/torrents/addMagnet"))
        .and(body_string_contains(format!("btih%3A{hash}")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": torrent_id,
            "uri": format!("{}/torrents/info/{torrent_id}", server.uri()),
        })))
        .mount(server)
        .await;

    let restricted = format!("https://real-debrid.com/d/{torrent_id}");
    let info_path = format!("/torrents/info/{torrent_id}");
    for (i, status) in statuses.iter().enumerate() {
        let downloaded = *status == "downloaded";
        let progress = if downloaded { 100 } else { 10 * i };
        let links = if downloaded {
            vec![restricted.clone()]
        } else {
            Vec::new()
        };
        let body = json!({
            "id": torrent_id,
            "filename": "Movie.mkv",
            "hash": hash.to_lowercase(),
            "bytes": 1024,
            "progress": progress,
            "status": status,
            "files": [{"id": 1, "path": "/Movie.mkv", "bytes": 1024, "selected": 1}],
            "links": links,
        });

        let mock = Mock::given(method("GET"))
            .and(path(info_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body));
        if i + 1 < statuses.len() {
            mock.up_to_n_times(1).mount(server).await;
        } else {
            mock.mount(server).await;
        }
    }

    Mock::given(method("POST"))
        .and(path("/unrestrict/link"))
        .and(body_string_contains(format!("d%2F{torrent_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("U{torrent_id}"),
            "filename": "Movie.mkv",
            "download": direct,
        })))
        .mount(server)
        .await;
}

/// Relay configuration pointing at mock servers, with fast polling and retries
pub fn test_config(feed: &MockServer, debrid: &MockServer) -> Config {
    let mut config = Config::new(format!("{}/rss", feed.uri()), "test-token");
    config.debrid.base_url = debrid.uri();
    config.debrid.poll_interval = Duration::from_millis(10);
    config.retry.max_attempts = 2;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(10);
    config
}

/// Download sink recording every accepted pair
#[derive(Default)]
pub struct CollectingSink {
    pairs: Mutex<Vec<(String, String)>>,
}

impl CollectingSink {
    /// Pairs accepted so far, as `(original, direct)` strings
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.pairs.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl debrid_relay::DownloadSink for CollectingSink {
    async fn submit(&self, original: &MagnetLink, direct: &Url) -> Result<()> {
        if let Ok(mut pairs) = self.pairs.lock() {
            pairs.push((original.to_string(), direct.to_string()));
        }
        Ok(())
    }
}
