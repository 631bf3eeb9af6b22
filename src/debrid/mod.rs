//! Remote debrid service access
//!
//! [`DebridApi`] is the seam between the orchestration state machine and the HTTP
//! client. The production implementation is [`RealDebridClient`]; tests drive the
//! state machine through scripted implementations of the trait.

mod client;
mod types;

pub use client::RealDebridClient;
pub use types::{TorrentFile, TorrentInfo, TorrentStatus};

use crate::error::RemoteApiError;
use crate::magnet::MagnetLink;

/// The four remote operations a magnet link goes through
///
/// Implementations hold no per-torrent state; the torrent identifier is passed explicitly.
#[async_trait::async_trait]
pub trait DebridApi: Send + Sync {
    /// Submit a magnet link, returning the remote torrent identifier
    ///
    /// Resubmitting the same magnet is safe: the service deduplicates by info hash.
    async fn submit(&self, magnet: &MagnetLink) -> Result<String, RemoteApiError>;

    /// Fetch the current state of a torrent
    async fn poll(&self, torrent_id: &str) -> Result<TorrentInfo, RemoteApiError>;

    /// Choose which files of the torrent to download
    ///
    /// Only valid while the torrent is waiting for file selection.
    async fn select_files(&self, torrent_id: &str, file_ids: &[u64])
    -> Result<(), RemoteApiError>;

    /// Convert a restricted result link into a direct download URL
    async fn unrestrict(&self, link: &str) -> Result<String, RemoteApiError>;
}
