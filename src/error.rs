//! Error types for debrid-relay
//!
//! This module provides the error taxonomy for the relay pipeline:
//! - Run-level errors (configuration, feed fetch/parse, ledger I/O) that abort a run
//! - Per-link errors (remote API failures, terminal torrent statuses) that only fail one link
//! - HTTP status classification for the remote debrid API

use crate::debrid::TorrentStatus;
use thiserror::Error;

/// Result type alias for debrid-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for debrid-relay
///
/// Each variant includes enough context to diagnose the failure from a log line alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "debrid.api_token")
        key: Option<String>,
    },

    /// The feed server answered with a non-2xx status
    #[error("feed returned HTTP {status}: {body}")]
    FeedFetch {
        /// HTTP status code returned by the feed server
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// No HTTP response was received from the feed server (DNS, connect, TLS, timeout)
    #[error("feed transport error: {0}")]
    FeedTransport(#[source] reqwest::Error),

    /// The feed body is not well-formed XML
    #[error("feed parse error: {0}")]
    FeedParse(String),

    /// Remote debrid API call failed
    #[error("remote API error: {0}")]
    Remote(#[from] RemoteApiError),

    /// The remote service reported a terminal failure status for a torrent
    #[error("torrent {id} failed remotely with status {status}")]
    TorrentDownloadFailed {
        /// Remote torrent identifier
        id: String,
        /// The terminal status reported by the service
        status: TorrentStatus,
    },

    /// I/O error (ledger file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true if this error should abort the whole run rather than a single link.
    ///
    /// Remote API failures and terminal torrent statuses are scoped to the link being
    /// processed; everything else (configuration, feed, ledger) is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Remote(_) | Error::TorrentDownloadFailed { .. }
        )
    }
}

/// Errors returned by the remote debrid REST API client
#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// The transport produced no HTTP response at all
    #[error("no HTTP response from remote service: {0}")]
    BadResponse(String),

    /// The service answered with a non-2xx status
    #[error("{}", describe_status(*status, body))]
    BadStatus {
        /// HTTP status code
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// A 2xx response whose body could not be decoded
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl RemoteApiError {
    /// HTTP status code, if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteApiError::BadStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The bearer token was rejected (HTTP 401)
    pub fn is_invalid_credential(&self) -> bool {
        self.status() == Some(401)
    }

    /// The account is not allowed to use this endpoint (HTTP 403)
    pub fn is_account_unauthorized(&self) -> bool {
        self.status() == Some(403)
    }
}

fn describe_status(status: u16, body: &str) -> String {
    match status {
        401 => format!("HTTP 401: invalid API token ({body})"),
        403 => format!("HTTP 403: account not authorized, check premium status ({body})"),
        _ => format!("HTTP {status}: {body}"),
    }
}

impl From<reqwest::Error> for RemoteApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteApiError::Decode(e.to_string())
        } else {
            RemoteApiError::BadResponse(e.to_string())
        }
    }
}
