//! Debrid orchestration: drives one magnet link through the remote service
//!
//! ```text
//! submit ──> poll ──┬── queued/downloading/converting/... ──> sleep, poll again
//!                   ├── waiting_files_selection ──> select largest file ──> poll again
//!                   ├── downloaded ──> unrestrict every result link ──> emit ──> done
//!                   └── magnet_error/error/virus/dead ──> TorrentDownloadFailed
//! ```

use crate::debrid::{DebridApi, TorrentFile, TorrentStatus};
use crate::error::{Error, RemoteApiError, Result};
use crate::magnet::MagnetLink;
use crate::types::{LinkOutcome, PendingResult, SkipReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Resolves magnet links into direct download URLs through a [`DebridApi`]
#[derive(Clone)]
pub struct DebridOrchestrator {
    api: Arc<dyn DebridApi>,
    poll_interval: Duration,
}

impl DebridOrchestrator {
    /// Create an orchestrator polling the remote service every `poll_interval`
    pub fn new(api: Arc<dyn DebridApi>, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }

    /// Drive `link` to a terminal state, sending each direct URL to `results` as soon as it exists
    ///
    /// Remote calls are sequential. A torrent that asks for a selection with no files, or
    /// finishes without result links, ends as [`LinkOutcome::Skipped`] rather than an error.
    ///
    /// # Errors
    /// - [`Error::Remote`] if a remote call fails after its retries
    /// - [`Error::TorrentDownloadFailed`] if the service reports a terminal failure status
    pub async fn resolve(
        &self,
        link: &MagnetLink,
        results: &mpsc::Sender<PendingResult>,
    ) -> Result<LinkOutcome> {
        let torrent_id = self.api.submit(link).await?;
        info!(magnet = %link, torrent_id = %torrent_id, "Magnet submitted to debrid service");

        let mut last_status = None;
        loop {
            let info = self.api.poll(&torrent_id).await?;
            if last_status != Some(info.status) {
                debug!(
                    torrent_id = %torrent_id,
                    status = %info.status,
                    progress = info.progress,
                    "Torrent status changed"
                );
                last_status = Some(info.status);
            }

            match info.status {
                TorrentStatus::MagnetConversion
                | TorrentStatus::Queued
                | TorrentStatus::Downloading
                | TorrentStatus::Compressing
                | TorrentStatus::Uploading => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                status @ (TorrentStatus::MagnetError
                | TorrentStatus::Error
                | TorrentStatus::Virus
                | TorrentStatus::Dead) => {
                    return Err(Error::TorrentDownloadFailed {
                        id: torrent_id,
                        status,
                    });
                }
                TorrentStatus::AwaitingFileSelection => {
                    let Some(file) = select_largest_file(&info.files) else {
                        warn!(
                            magnet = %link,
                            torrent_id = %torrent_id,
                            "Torrent has no files to select, skipping"
                        );
                        return Ok(LinkOutcome::Skipped {
                            torrent_id,
                            reason: SkipReason::NoFiles,
                        });
                    };

                    info!(
                        torrent_id = %torrent_id,
                        file_id = file.id,
                        path = %file.path,
                        bytes = file.bytes,
                        "Selecting largest file"
                    );
                    self.api.select_files(&torrent_id, &[file.id]).await?;
                    tokio::time::sleep(self.poll_interval).await;
                }
                TorrentStatus::Downloaded => {
                    if info.links.is_empty() {
                        warn!(
                            magnet = %link,
                            torrent_id = %torrent_id,
                            "Torrent finished without result links, skipping"
                        );
                        return Ok(LinkOutcome::Skipped {
                            torrent_id,
                            reason: SkipReason::NoLinks,
                        });
                    }

                    let emitted = self.unrestrict_all(link, &info.links, results).await?;
                    info!(
                        magnet = %link,
                        torrent_id = %torrent_id,
                        emitted,
                        "Torrent resolved"
                    );
                    return Ok(LinkOutcome::Resolved {
                        torrent_id,
                        emitted,
                    });
                }
            }
        }
    }

    async fn unrestrict_all(
        &self,
        link: &MagnetLink,
        restricted: &[String],
        results: &mpsc::Sender<PendingResult>,
    ) -> Result<usize> {
        let mut emitted = 0;
        for restricted_link in restricted {
            let direct = self.api.unrestrict(restricted_link).await?;
            let direct = Url::parse(&direct).map_err(|e| {
                RemoteApiError::Decode(format!("invalid direct URL {direct:?}: {e}"))
            })?;

            debug!(magnet = %link, direct = %direct, "Emitting direct download URL");
            results
                .send(PendingResult {
                    original: link.clone(),
                    direct,
                })
                .await
                .map_err(|_| Error::Other("result consumer is gone".to_string()))?;
            emitted += 1;
        }
        Ok(emitted)
    }
}

/// Pick the single largest file; on equal sizes the first one listed wins
pub fn select_largest_file(files: &[TorrentFile]) -> Option<&TorrentFile> {
    files.iter().fold(None, |best: Option<&TorrentFile>, file| match best {
        Some(current) if current.bytes >= file.bytes => Some(current),
        _ => Some(file),
    })
}
