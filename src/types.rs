//! Core types and events for debrid-relay

use crate::magnet::MagnetLink;
use serde::Serialize;
use url::Url;

/// A resolved download: the magnet it came from and the direct URL to fetch
///
/// Handed to the consumer, which submits `direct` downstream and then marks `original`
/// as downloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingResult {
    /// The magnet link from the feed
    pub original: MagnetLink,
    /// Publicly fetchable URL produced by unrestricting a result link
    pub direct: Url,
}

/// Why a link finished without producing any result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The torrent asked for a file selection but listed no files
    NoFiles,
    /// The torrent finished but returned no result links
    NoLinks,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoFiles => write!(f, "torrent has no files to select"),
            SkipReason::NoLinks => write!(f, "torrent finished without result links"),
        }
    }
}

/// How a single link's run ended, when it did not fail
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The torrent completed and `emitted` direct URLs were produced
    Resolved {
        /// Remote torrent identifier
        torrent_id: String,
        /// Number of pending results sent to the consumer
        emitted: usize,
    },
    /// The link was dropped without a result and without an error
    Skipped {
        /// Remote torrent identifier
        torrent_id: String,
        /// Why nothing was produced
        reason: SkipReason,
    },
}

/// Counters for one scheduler run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Links handed to the scheduler
    pub total: usize,
    /// Links that completed with results
    pub resolved: usize,
    /// Links skipped without results
    pub skipped: usize,
    /// Links that failed
    pub failed: usize,
    /// Pending results emitted across all links
    pub emitted: usize,
}

/// Events emitted during a relay run
///
/// Delivered over a broadcast channel; see `DebridRelay::subscribe`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The feed was fetched and filtered against the ledger
    FeedFetched {
        /// Magnet links found in the feed
        total: usize,
        /// Links not yet recorded in the ledger
        new: usize,
    },

    /// A link started resolving
    LinkStarted {
        /// Magnet URI
        magnet: String,
    },

    /// A link completed and produced results
    LinkResolved {
        /// Magnet URI
        magnet: String,
        /// Remote torrent identifier
        torrent_id: String,
        /// Number of direct URLs produced
        emitted: usize,
    },

    /// A link ended without results and without error
    LinkSkipped {
        /// Magnet URI
        magnet: String,
        /// Why nothing was produced
        reason: SkipReason,
    },

    /// A link failed
    LinkFailed {
        /// Magnet URI
        magnet: String,
        /// Error message
        error: String,
    },

    /// A direct URL was accepted downstream and the link was recorded
    Submitted {
        /// Magnet URI
        magnet: String,
        /// Direct download URL
        direct: String,
    },

    /// Downstream submission of a direct URL failed
    SubmitFailed {
        /// Magnet URI
        magnet: String,
        /// Direct download URL
        direct: String,
        /// Error message
        error: String,
    },

    /// Every link of the run reached a terminal state
    RunFinished {
        /// Counters for the run
        summary: RunSummary,
    },
}
