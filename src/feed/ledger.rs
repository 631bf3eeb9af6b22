//! Download ledger: the persisted set of magnet URIs already handed off
//!
//! The file is newline-delimited, one URI per line. Writes go to a sibling temporary
//! file that is then renamed over the ledger, so a crash mid-write leaves either the
//! old or the new contents, never a torn file.

use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Persisted set of processed magnet URIs
#[derive(Debug)]
pub struct DownloadLedger {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl DownloadLedger {
    /// Create a ledger backed by `path`; the file does not need to exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the set of recorded URIs (empty if the file does not exist)
    pub async fn load(&self) -> Result<HashSet<String>> {
        Ok(self.read_entries().await?.into_iter().collect())
    }

    /// Returns true if `uri` has been recorded
    pub async fn contains(&self, uri: &str) -> Result<bool> {
        Ok(self.load().await?.contains(uri))
    }

    /// Record `uri` and persist the ledger
    ///
    /// Returns `false` without touching the file if the URI was already recorded.
    pub async fn insert(&self, uri: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        if entries.iter().any(|entry| entry == uri) {
            debug!(ledger = %self.path.display(), "URI already recorded in ledger");
            return Ok(false);
        }
        entries.push(uri.to_string());
        self.write_atomically(&entries).await?;

        debug!(
            ledger = %self.path.display(),
            entries = entries.len(),
            "Recorded URI in ledger"
        );
        Ok(true)
    }

    /// Read entries in file order, skipping blank lines and repeated URIs
    async fn read_entries(&self) -> Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut seen = HashSet::new();
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| seen.insert(*line))
            .map(str::to_string)
            .collect())
    }

    async fn write_atomically(&self, entries: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.temp_path();
        let mut contents = entries.join("\n");
        contents.push('\n');

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let ledger = DownloadLedger::new(dir.path().join("history.txt"));

        assert!(ledger.load().await.unwrap().is_empty());
        assert!(!ledger.contains("magnet:?xt=urn:btih:A").await.unwrap());
    }

    #[tokio::test]
    async fn insert_persists_newline_delimited_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        let ledger = DownloadLedger::new(&path);

        assert!(ledger.insert("magnet:?xt=urn:btih:A").await.unwrap());
        assert!(ledger.insert("magnet:?xt=urn:btih:B").await.unwrap());

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "magnet:?xt=urn:btih:A\nmagnet:?xt=urn:btih:B\n");
        assert!(
            !dir.path().join("history.txt.tmp").exists(),
            "temporary file should be renamed away"
        );
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        let ledger = DownloadLedger::new(&path);

        assert!(ledger.insert("magnet:?xt=urn:btih:A").await.unwrap());
        assert!(!ledger.insert("magnet:?xt=urn:btih:A").await.unwrap());

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk.lines().count(), 1);
    }

    #[tokio::test]
    async fn hand_edited_file_with_blanks_crlf_and_duplicates_is_tolerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        std::fs::write(
            &path,
            "magnet:?xt=urn:btih:A\r\n\r\nmagnet:?xt=urn:btih:A\nmagnet:?xt=urn:btih:B",
        )
        .unwrap();
        let ledger = DownloadLedger::new(&path);

        let entries = ledger.load().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains("magnet:?xt=urn:btih:A"));

        ledger.insert("magnet:?xt=urn:btih:C").await.unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            on_disk,
            "magnet:?xt=urn:btih:A\nmagnet:?xt=urn:btih:B\nmagnet:?xt=urn:btih:C\n"
        );
    }

    #[tokio::test]
    async fn parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("nested").join("history.txt");
        let ledger = DownloadLedger::new(&path);

        ledger.insert("magnet:?xt=urn:btih:A").await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn concurrent_inserts_do_not_lose_updates() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(DownloadLedger::new(dir.path().join("history.txt")));

        let mut handles = Vec::new();
        for i in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .insert(&format!("magnet:?xt=urn:btih:{i}"))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(ledger.load().await.unwrap().len(), 10);
    }
}
