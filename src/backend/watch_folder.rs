//! Watch-folder ("blackhole") backend
//!
//! Another program (a torrent client, a usenet client) writes completed downloads into
//! a folder. Every visible entry in that folder, file or directory, is reported as one
//! item. An entry is considered still in progress until its size and modification time
//! have stayed unchanged for the configured grace period.
//!
//! The folder is scanned on demand (each poll), not watched for events. Entries that
//! are hidden (leading `.`) are skipped.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BackendItem, BackendKind, BackendStatus, DownloadBackend, ValidationFailure};
use crate::config::WatchFolderBackendConfig;
use crate::error::{BackendError, Error, Result};
use crate::types::{BackendItemStatus, Protocol};

/// Size and modification time of an entry as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    size: u64,
    modified: Option<SystemTime>,
}

/// When an entry was last seen to change
#[derive(Debug, Clone, Copy)]
struct Observation {
    fingerprint: Fingerprint,
    changed_at: Instant,
}

/// Drop-folder scanner
pub struct WatchFolderBackend {
    config: WatchFolderBackendConfig,
    observations: Mutex<HashMap<String, Observation>>,
}

impl WatchFolderBackend {
    /// Create a backend for the configured folder
    pub fn new(config: WatchFolderBackendConfig) -> Self {
        Self {
            config,
            observations: Mutex::new(HashMap::new()),
        }
    }

    /// Deterministic download id for an entry name
    ///
    /// Stable across restarts so correlation with grab history survives.
    pub fn download_id_for(&self, file_name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_name.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        format!("{}_{}", self.config.name, &hash[..16])
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::Backend(BackendError::Io {
            backend: self.config.name.clone(),
            source,
        })
    }

    /// Record this scan's fingerprints and return, per entry, whether it is still settling
    ///
    /// Entries absent from this scan are pruned from the cache.
    fn observe(&self, scanned: &[(String, Fingerprint)], now: Instant) -> HashMap<String, bool> {
        let grace = self.config.scan_grace_period;
        let mut observations = match self.observations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        observations.retain(|name, _| scanned.iter().any(|(n, _)| n == name));

        let mut settling = HashMap::with_capacity(scanned.len());
        for (name, fingerprint) in scanned {
            let observation = observations
                .entry(name.clone())
                .or_insert(Observation {
                    fingerprint: *fingerprint,
                    changed_at: now,
                });
            if observation.fingerprint != *fingerprint {
                debug!(backend = %self.config.name, entry = %name, "watch folder entry changed");
                observation.fingerprint = *fingerprint;
                observation.changed_at = now;
            }
            let in_grace = now.saturating_duration_since(observation.changed_at) < grace;
            settling.insert(name.clone(), in_grace);
        }
        settling
    }

    fn to_item(&self, entry: ScannedEntry, settling: bool) -> BackendItem {
        BackendItem {
            download_id: self.download_id_for(&entry.name),
            title: entry.title,
            total_size: entry.fingerprint.size,
            remaining_size: 0,
            remaining_time: if settling { None } else { Some(Duration::ZERO) },
            status: if settling {
                BackendItemStatus::Downloading
            } else {
                BackendItemStatus::Completed
            },
            message: None,
            output_path: Some(entry.path),
            backend: self.identity(),
            category: None,
            can_move_files: !self.config.read_only,
            can_be_removed: self.config.remove_completed_downloads,
        }
    }
}

#[async_trait]
impl DownloadBackend for WatchFolderBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::WatchFolder
    }

    fn protocol(&self) -> Protocol {
        self.config.protocol
    }

    async fn list_items(&self) -> Result<Vec<BackendItem>> {
        let folder = self.config.watch_folder.clone();
        let scanned = tokio::task::spawn_blocking(move || scan_folder(&folder))
            .await
            .map_err(|e| Error::Other(format!("watch folder scan task failed: {e}")))?
            .map_err(|e| self.io_error(e))?;

        let fingerprints: Vec<(String, Fingerprint)> = scanned
            .iter()
            .map(|entry| (entry.name.clone(), entry.fingerprint))
            .collect();
        let settling = self.observe(&fingerprints, Instant::now());

        let items = scanned
            .into_iter()
            .map(|entry| {
                let in_grace = settling.get(&entry.name).copied().unwrap_or(true);
                self.to_item(entry, in_grace)
            })
            .collect::<Vec<_>>();

        debug!(backend = %self.config.name, count = items.len(), "watch folder scanned");
        Ok(items)
    }

    async fn remove_item(&self, item: &BackendItem, delete_data: bool) -> Result<()> {
        if !delete_data {
            return Err(Error::NotSupported(format!(
                "{}: watch folder items cannot be removed without deleting their data",
                self.config.name
            )));
        }

        let Some(path) = item.output_path.as_deref() else {
            warn!(
                backend = %self.config.name,
                download_id = %item.download_id,
                "watch folder item has no path, nothing to delete"
            );
            return Ok(());
        };

        match delete_entry(path).await {
            Ok(()) => {
                info!(
                    backend = %self.config.name,
                    download_id = %item.download_id,
                    "deleted {}",
                    path.display()
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    backend = %self.config.name,
                    download_id = %item.download_id,
                    "{} already gone",
                    path.display()
                );
                Ok(())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn mark_item_as_imported(&self, _item: &BackendItem) -> Result<()> {
        Err(Error::NotSupported(format!(
            "{}: watch folder backends cannot relabel items",
            self.config.name
        )))
    }

    async fn test(&self) -> Result<Vec<ValidationFailure>> {
        let folder = &self.config.watch_folder;
        let failure = match tokio::fs::metadata(folder).await {
            Ok(metadata) if metadata.is_dir() => None,
            Ok(_) => Some(format!("{} is not a directory", folder.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Some(format!("folder '{}' does not exist", folder.display()))
            }
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(failure
            .map(|message| ValidationFailure::new("watchFolder", message))
            .into_iter()
            .collect())
    }

    async fn status(&self) -> Result<BackendStatus> {
        Ok(BackendStatus {
            is_localhost: true,
            output_root_folders: vec![self.config.watch_folder.clone()],
        })
    }
}

#[derive(Debug)]
struct ScannedEntry {
    name: String,
    title: String,
    path: PathBuf,
    fingerprint: Fingerprint,
}

/// List visible entries of the folder with their total size and latest modification time
fn scan_folder(folder: &Path) -> std::io::Result<Vec<ScannedEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let is_dir = entry.file_type()?.is_dir();
        let fingerprint = match fingerprint(&path) {
            Ok(fp) => fp,
            // Entry vanished between listing and stat
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        entries.push(ScannedEntry {
            title: title_from_entry(&name, &path, is_dir),
            name,
            path,
            fingerprint,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn fingerprint(path: &Path) -> std::io::Result<Fingerprint> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_dir() {
        return Ok(Fingerprint {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }

    let mut total = Fingerprint {
        size: 0,
        modified: metadata.modified().ok(),
    };
    for child in std::fs::read_dir(path)? {
        let child = fingerprint(&child?.path())?;
        total.size += child.size;
        total.modified = total.modified.max(child.modified);
    }
    Ok(total)
}

async fn delete_entry(path: &Path) -> std::io::Result<()> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Files report their name without extension, directories their full name
fn title_from_entry(name: &str, path: &Path, is_dir: bool) -> String {
    if is_dir {
        return name.to_string();
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(dir: &Path, grace: Duration) -> WatchFolderBackend {
        WatchFolderBackend::new(WatchFolderBackendConfig {
            name: "blackhole".into(),
            watch_folder: dir.to_path_buf(),
            scan_grace_period: grace,
            read_only: false,
            remove_completed_downloads: true,
            protocol: Protocol::Torrent,
        })
    }

    #[tokio::test]
    async fn lists_visible_entries_and_skips_hidden_ones() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Artist - Album.flac"), b"1234").unwrap();
        std::fs::create_dir(dir.path().join("Artist - Other")).unwrap();
        std::fs::write(dir.path().join("Artist - Other").join("01.flac"), b"123456").unwrap();
        std::fs::write(dir.path().join(".partial"), b"x").unwrap();

        let items = backend(dir.path(), Duration::ZERO).list_items().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Artist - Album");
        assert_eq!(items[0].total_size, 4);
        assert_eq!(items[1].title, "Artist - Other");
        assert_eq!(items[1].total_size, 6, "directory size is the sum of its files");
        assert!(items.iter().all(|i| i.status == BackendItemStatus::Completed));
        assert!(items.iter().all(|i| i.can_move_files && i.can_be_removed));
    }

    #[tokio::test]
    async fn entries_within_grace_period_are_downloading() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fresh.flac"), b"1").unwrap();

        let items = backend(dir.path(), Duration::from_secs(3600))
            .list_items()
            .await
            .unwrap();

        assert_eq!(items[0].status, BackendItemStatus::Downloading);
        assert_eq!(items[0].remaining_time, None);
    }

    #[test]
    fn entries_complete_once_unchanged_for_grace_period() {
        let dir = TempDir::new().unwrap();
        let backend = backend(dir.path(), Duration::from_secs(30));
        let start = Instant::now();
        let scan = |size| {
            vec![(
                "settling.flac".to_string(),
                Fingerprint {
                    size,
                    modified: None,
                },
            )]
        };

        assert!(backend.observe(&scan(1), start)["settling.flac"]);
        assert!(!backend.observe(&scan(1), start + Duration::from_secs(31))["settling.flac"]);

        // A size change restarts the grace period
        assert!(backend.observe(&scan(2), start + Duration::from_secs(32))["settling.flac"]);

        // Vanished entries are forgotten and start over when they reappear
        assert!(backend.observe(&[], start + Duration::from_secs(70)).is_empty());
        assert!(backend.observe(&scan(2), start + Duration::from_secs(71))["settling.flac"]);
    }

    #[tokio::test]
    async fn test_reports_missing_or_non_directory_watch_folder() {
        let dir = TempDir::new().unwrap();
        assert!(backend(dir.path(), Duration::ZERO).test().await.unwrap().is_empty());

        let failures = backend(&dir.path().join("missing"), Duration::ZERO)
            .test()
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field.as_deref(), Some("watchFolder"));
        assert!(failures[0].message.contains("does not exist"));

        let file = dir.path().join("file.flac");
        std::fs::write(&file, b"1").unwrap();
        let failures = backend(&file, Duration::ZERO).test().await.unwrap();
        assert!(failures[0].message.contains("not a directory"));
    }

    #[test]
    fn download_id_is_deterministic_and_prefixed() {
        let dir = TempDir::new().unwrap();
        let backend = backend(dir.path(), Duration::ZERO);

        let id = backend.download_id_for("Artist - Album");
        assert_eq!(id, backend.download_id_for("Artist - Album"));
        assert_ne!(id, backend.download_id_for("Artist - Album 2"));
        assert!(id.starts_with("blackhole_"));
        assert_eq!(id.len(), "blackhole_".len() + 16);
    }

    #[tokio::test]
    async fn remove_without_deleting_data_is_not_supported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("keep.flac"), b"1").unwrap();
        let backend = backend(dir.path(), Duration::ZERO);
        let item = backend.list_items().await.unwrap().remove(0);

        let result = backend.remove_item(&item, false).await;

        assert!(matches!(result, Err(Error::NotSupported(_))));
        assert!(dir.path().join("keep.flac").exists(), "data must be untouched");
    }

    #[tokio::test]
    async fn remove_with_data_deletes_files_and_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.flac"), b"1").unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b").join("01.flac"), b"1").unwrap();
        let backend = backend(dir.path(), Duration::ZERO);

        for item in backend.list_items().await.unwrap() {
            backend.remove_item(&item, true).await.unwrap();
        }

        assert!(backend.list_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_of_already_deleted_entry_succeeds() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gone.flac"), b"1").unwrap();
        let backend = backend(dir.path(), Duration::ZERO);
        let item = backend.list_items().await.unwrap().remove(0);
        std::fs::remove_file(dir.path().join("gone.flac")).unwrap();

        backend.remove_item(&item, true).await.unwrap();
    }

    #[tokio::test]
    async fn mark_imported_is_not_supported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.flac"), b"1").unwrap();
        let backend = backend(dir.path(), Duration::ZERO);
        let item = backend.list_items().await.unwrap().remove(0);

        assert!(matches!(
            backend.mark_item_as_imported(&item).await,
            Err(Error::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn missing_folder_is_a_backend_io_error() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir.path().join("missing"), Duration::ZERO);

        match backend.list_items().await {
            Err(Error::Backend(BackendError::Io { backend, .. })) => assert_eq!(backend, "blackhole"),
            other => panic!("expected backend io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_reports_watch_folder_as_output_root() {
        let dir = TempDir::new().unwrap();
        let status = backend(dir.path(), Duration::ZERO).status().await.unwrap();
        assert!(status.is_localhost);
        assert_eq!(status.output_root_folders, vec![dir.path().to_path_buf()]);
    }
}
