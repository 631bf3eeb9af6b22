//! Real-Debrid REST client

use crate::config::{DebridConfig, RetryConfig};
use crate::error::{Error, RemoteApiError, Result};
use crate::magnet::MagnetLink;
use crate::retry::with_retry;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::DebridApi;
use super::types::{AddMagnetResponse, TorrentInfo, UnrestrictResponse};

/// Longest response body kept in an error, in characters
const MAX_ERROR_BODY: usize = 512;

/// Bearer-token authenticated client for the Real-Debrid REST API
///
/// Every call is wrapped in the configured retry policy. The client is cheap to clone
/// and holds no per-torrent state, so concurrent workers can share one instance.
#[derive(Clone)]
pub struct RealDebridClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    retry: RetryConfig,
}

impl RealDebridClient {
    /// Create a new client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &DebridConfig, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("debrid-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            retry,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request (rebuilt for every attempt) and return the successful response
    async fn send<B>(&self, build: B) -> std::result::Result<reqwest::Response, RemoteApiError>
    where
        B: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        with_retry(&self.retry, || {
            let request = build(&self.http).bearer_auth(&self.api_token);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| RemoteApiError::BadResponse(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(RemoteApiError::BadStatus {
                        status: status.as_u16(),
                        body: body.chars().take(MAX_ERROR_BODY).collect(),
                    });
                }
                Ok(response)
            }
        })
        .await
    }

    async fn send_json<T, B>(&self, build: B) -> std::result::Result<T, RemoteApiError>
    where
        T: DeserializeOwned,
        B: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        self.send(build)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RemoteApiError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl DebridApi for RealDebridClient {
    async fn submit(&self, magnet: &MagnetLink) -> std::result::Result<String, RemoteApiError> {
        let url = self.url("/torrents/addMagnet");
        let response: AddMagnetResponse = self
            .send_json(|http| http.post(&url).form(&[("magnet", magnet.as_str())]))
            .await?;

        debug!(torrent_id = %response.id, magnet = %magnet.label(), "Magnet submitted");
        Ok(response.id)
    }

    async fn poll(&self, torrent_id: &str) -> std::result::Result<TorrentInfo, RemoteApiError> {
        let url = self.url(&format!(
            "/torrents/info/{}",
            urlencoding::encode(torrent_id)
        ));
        let info: TorrentInfo = self.send_json(|http| http.get(&url)).await?;

        debug!(
            torrent_id,
            status = %info.status,
            progress = info.progress,
            "Torrent polled"
        );
        Ok(info)
    }

    async fn select_files(
        &self,
        torrent_id: &str,
        file_ids: &[u64],
    ) -> std::result::Result<(), RemoteApiError> {
        let url = self.url(&format!(
            "/torrents/selectFiles/{}",
            urlencoding::encode(torrent_id)
        ));
        let files = file_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        self.send(|http| http.post(&url).form(&[("files", files.as_str())]))
            .await?;

        debug!(torrent_id, files = %files, "Files selected");
        Ok(())
    }

    async fn unrestrict(&self, link: &str) -> std::result::Result<String, RemoteApiError> {
        let url = self.url("/unrestrict/link");
        let response: UnrestrictResponse = self
            .send_json(|http| http.post(&url).form(&[("link", link)]))
            .await?;

        debug!(link, download = %response.download, "Link unrestricted");
        Ok(response.download)
    }
}
