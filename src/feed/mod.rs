//! Feed source: fetches the RSS feed, extracts magnet links and owns the download ledger.

mod ledger;
mod parser;

pub use ledger::DownloadLedger;
pub use parser::extract_magnets;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::magnet::MagnetLink;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Longest feed error body kept for diagnostics, in characters
const MAX_ERROR_BODY: usize = 2048;

/// Reads magnet links from an RSS feed and tracks which ones were already handed off
pub struct FeedSource {
    /// HTTP client for fetching the feed
    http_client: reqwest::Client,

    /// Feed location
    feed_url: String,

    /// Download history (None = no history is kept)
    ledger: Option<DownloadLedger>,
}

impl FeedSource {
    /// Create a new feed source
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(feed_url: impl Into<String>, ledger_path: Option<PathBuf>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("debrid-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            feed_url: feed_url.into(),
            ledger: ledger_path.map(DownloadLedger::new),
        })
    }

    /// Create a feed source from the relay configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.feed_url.clone(), config.ledger_path.clone())
    }

    /// The configured ledger, if any
    pub fn ledger(&self) -> Option<&DownloadLedger> {
        self.ledger.as_ref()
    }

    /// Download the feed and return its distinct magnet links in document order
    ///
    /// # Errors
    /// - [`Error::FeedTransport`] if no HTTP response was received
    /// - [`Error::FeedFetch`] on a non-2xx status, with the status code and body
    /// - [`Error::FeedParse`] if the body is not well-formed XML
    pub async fn fetch_links(&self) -> Result<Vec<MagnetLink>> {
        debug!(url = %self.feed_url, "Fetching feed");

        let response = self
            .http_client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(Error::FeedTransport)?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FeedFetch {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let content = response.text().await.map_err(Error::FeedTransport)?;
        let links = extract_magnets(&content)?;

        info!(url = %self.feed_url, count = links.len(), "Fetched magnet links from feed");
        Ok(links)
    }

    /// Keep only the links whose URI is not recorded in the ledger
    ///
    /// Returns the input unchanged when no ledger is configured. A missing ledger file
    /// counts as an empty history.
    pub async fn filter_undownloaded(&self, links: Vec<MagnetLink>) -> Result<Vec<MagnetLink>> {
        let Some(ledger) = &self.ledger else {
            return Ok(links);
        };

        let downloaded = ledger.load().await?;
        let total = links.len();
        let remaining: Vec<MagnetLink> = links
            .into_iter()
            .filter(|link| !downloaded.contains(link.as_str()))
            .collect();

        debug!(
            total,
            already_downloaded = total - remaining.len(),
            "Filtered feed links against ledger"
        );
        Ok(remaining)
    }

    /// Record a link as downloaded; a no-op when no ledger is configured
    ///
    /// Call this only after the direct URL was accepted downstream.
    pub async fn mark_downloaded(&self, link: &MagnetLink) -> Result<()> {
        if let Some(ledger) = &self.ledger
            && ledger.insert(link.as_str()).await?
        {
            info!(magnet = %link.label(), "Marked as downloaded");
        }
        Ok(())
    }

    /// The `dn` display name of a magnet link, if any
    pub fn display_name(link: &MagnetLink) -> Option<String> {
        link.display_name()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
