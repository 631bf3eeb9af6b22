//! Wire types of the debrid REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Remote lifecycle status of a torrent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// The magnet could not be converted into a torrent
    MagnetError,
    /// The service is fetching torrent metadata from the swarm
    MagnetConversion,
    /// Metadata is known; the service waits for a file selection
    #[serde(rename = "waiting_files_selection")]
    AwaitingFileSelection,
    /// Queued for download on the service side
    Queued,
    /// Downloading on the service side
    Downloading,
    /// Finished; result links are available
    Downloaded,
    /// Generic remote failure
    Error,
    /// The content was flagged as malware
    Virus,
    /// The service is packing the result
    Compressing,
    /// The service is moving the result to its hosters
    Uploading,
    /// The torrent has no seeds and was given up
    Dead,
}

impl TorrentStatus {
    /// The wire name of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::MagnetError => "magnet_error",
            TorrentStatus::MagnetConversion => "magnet_conversion",
            TorrentStatus::AwaitingFileSelection => "waiting_files_selection",
            TorrentStatus::Queued => "queued",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Downloaded => "downloaded",
            TorrentStatus::Error => "error",
            TorrentStatus::Virus => "virus",
            TorrentStatus::Compressing => "compressing",
            TorrentStatus::Uploading => "uploading",
            TorrentStatus::Dead => "dead",
        }
    }
}

impl std::fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file inside a remote torrent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// File identifier used for selection
    pub id: u64,
    /// Path of the file inside the torrent
    #[serde(default)]
    pub path: String,
    /// Size in bytes
    #[serde(default)]
    pub bytes: u64,
    /// Whether the file is selected for download
    #[serde(default, deserialize_with = "bool_from_int")]
    pub selected: bool,
}

/// Snapshot of a remote torrent as returned by one poll
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Remote torrent identifier
    pub id: String,
    /// Torrent name
    #[serde(default)]
    pub filename: String,
    /// Info hash
    #[serde(default)]
    pub hash: String,
    /// Size of the selected files in bytes
    #[serde(default)]
    pub bytes: u64,
    /// Remote download progress, 0 to 100
    #[serde(default)]
    pub progress: f64,
    /// Current status
    pub status: TorrentStatus,
    /// When the torrent was added
    #[serde(default)]
    pub added: Option<DateTime<Utc>>,
    /// When the remote download finished
    #[serde(default)]
    pub ended: Option<DateTime<Utc>>,
    /// Constituent files
    #[serde(default)]
    pub files: Vec<TorrentFile>,
    /// Restricted result links, available once downloaded
    #[serde(default)]
    pub links: Vec<String>,
}

/// Response to a magnet submission
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AddMagnetResponse {
    pub id: String,
}

/// Response to a link unrestriction
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct UnrestrictResponse {
    pub download: String,
}

fn bool_from_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrBool {
        Int(i64),
        Bool(bool),
    }

    Ok(match IntOrBool::deserialize(deserializer)? {
        IntOrBool::Int(n) => n != 0,
        IntOrBool::Bool(b) => b,
    })
}
