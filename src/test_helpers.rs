//! Shared fixtures and fakes for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{
    BackendIdentity, BackendItem, BackendKind, BackendStatus, DownloadBackend, ValidationFailure,
};
use crate::blocklist::{BlocklistLedger, NewBlocklistEntry};
use crate::error::{BackendError, Error, Result};
use crate::tracked::{GrabHistory, GrabRecord};
use crate::types::{
    AlbumRef, ArtistRef, BackendItemStatus, Protocol, Quality, ReleaseInfo, RemoteAlbum,
};

/// A correlated release for `artist_id` covering `album_ids`
pub(crate) fn remote_album(artist_id: i64, album_ids: &[i64], title: &str) -> RemoteAlbum {
    RemoteAlbum {
        artist: ArtistRef {
            id: artist_id,
            name: format!("Artist {artist_id}"),
            sort_name: Some(format!("artist {artist_id}")),
        },
        albums: album_ids
            .iter()
            .map(|id| AlbumRef {
                id: *id,
                title: format!("Album {id}"),
                release_date: None,
            })
            .collect(),
        release: ReleaseInfo {
            title: title.to_string(),
            indexer: "Indexer".to_string(),
            protocol: Protocol::Torrent,
            size: 100,
            publish_date: None,
        },
        quality: Quality {
            id: 6,
            name: "FLAC".to_string(),
        },
    }
}

/// A downloading item: 100 bytes, 50 left, one minute to go
pub(crate) fn backend_item(backend: &str, download_id: &str, title: &str) -> BackendItem {
    BackendItem {
        download_id: download_id.to_string(),
        title: title.to_string(),
        total_size: 100,
        remaining_size: 50,
        remaining_time: Some(Duration::from_secs(60)),
        status: BackendItemStatus::Downloading,
        message: None,
        output_path: Some(PathBuf::from(format!("/downloads/{title}"))),
        backend: BackendIdentity {
            name: backend.to_string(),
            kind: BackendKind::Transmission,
            protocol: Protocol::Torrent,
        },
        category: Some("music".to_string()),
        can_move_files: false,
        can_be_removed: true,
    }
}

/// Grab record for a download id
pub(crate) fn grab(
    download_id: &str,
    backend: &str,
    remote_album: RemoteAlbum,
    grabbed_at: DateTime<Utc>,
) -> GrabRecord {
    GrabRecord {
        download_id: download_id.to_string(),
        backend: backend.to_string(),
        remote_album,
        grabbed_at,
    }
}

/// In-memory grab history
#[derive(Default)]
pub(crate) struct StaticGrabs {
    grabs: Mutex<HashMap<String, GrabRecord>>,
    fail: bool,
}

impl StaticGrabs {
    pub(crate) fn new(grabs: Vec<GrabRecord>) -> Self {
        Self {
            grabs: Mutex::new(
                grabs
                    .into_iter()
                    .map(|g| (g.download_id.clone(), g))
                    .collect(),
            ),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            grabs: Mutex::default(),
            fail: true,
        }
    }

    pub(crate) fn insert(&self, grab: GrabRecord) {
        self.grabs
            .lock()
            .unwrap()
            .insert(grab.download_id.clone(), grab);
    }
}

#[async_trait]
impl GrabHistory for StaticGrabs {
    async fn find_grab(&self, download_id: &str) -> Result<Option<GrabRecord>> {
        if self.fail {
            return Err(Error::Other("grab history offline".into()));
        }
        Ok(self.grabs.lock().unwrap().get(download_id).cloned())
    }
}

/// In-memory blocklist ledger
#[derive(Default)]
pub(crate) struct MemoryLedger {
    entries: Mutex<Vec<NewBlocklistEntry>>,
    fail: bool,
}

impl MemoryLedger {
    pub(crate) fn failing() -> Self {
        Self {
            entries: Mutex::default(),
            fail: true,
        }
    }

    pub(crate) fn entries(&self) -> Vec<NewBlocklistEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlocklistLedger for MemoryLedger {
    async fn block(&self, entry: NewBlocklistEntry) -> Result<i64> {
        if self.fail {
            return Err(Error::Other("blocklist offline".into()));
        }
        let mut entries = self.entries.lock().unwrap();
        entries.push(entry);
        Ok(entries.len() as i64)
    }
}

/// Call recorded by [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockCall {
    List,
    Remove {
        download_id: String,
        delete_data: bool,
    },
    MarkImported {
        download_id: String,
    },
}

/// How a [`MockBackend`] operation should end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockOutcome {
    Succeed,
    NotSupported,
    Fail,
}

/// Backend fake that serves a fixed item list and records every call
pub(crate) struct MockBackend {
    name: String,
    items: Mutex<Vec<BackendItem>>,
    calls: Mutex<Vec<MockCall>>,
    list: Mutex<MockOutcome>,
    remove: Mutex<MockOutcome>,
    mark_imported: Mutex<MockOutcome>,
    failures: Mutex<Vec<ValidationFailure>>,
}

impl MockBackend {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            items: Mutex::default(),
            calls: Mutex::default(),
            list: Mutex::new(MockOutcome::Succeed),
            remove: Mutex::new(MockOutcome::Succeed),
            mark_imported: Mutex::new(MockOutcome::Succeed),
            failures: Mutex::default(),
        })
    }

    pub(crate) fn set_items(&self, items: Vec<BackendItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub(crate) fn set_list_outcome(&self, outcome: MockOutcome) {
        *self.list.lock().unwrap() = outcome;
    }

    pub(crate) fn set_remove_outcome(&self, outcome: MockOutcome) {
        *self.remove.lock().unwrap() = outcome;
    }

    pub(crate) fn set_mark_imported_outcome(&self, outcome: MockOutcome) {
        *self.mark_imported.lock().unwrap() = outcome;
    }

    pub(crate) fn set_validation_failures(&self, failures: Vec<ValidationFailure>) {
        *self.failures.lock().unwrap() = failures;
    }

    pub(crate) fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn remove_calls(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Remove { .. }))
            .collect()
    }

    fn outcome(&self, outcome: MockOutcome, what: &str) -> Result<()> {
        match outcome {
            MockOutcome::Succeed => Ok(()),
            MockOutcome::NotSupported => Err(Error::NotSupported(format!("{}: {what}", self.name))),
            MockOutcome::Fail => Err(Error::Backend(BackendError::Rpc {
                backend: self.name.clone(),
                message: format!("{what} failed"),
            })),
        }
    }
}

#[async_trait]
impl DownloadBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Transmission
    }

    fn protocol(&self) -> Protocol {
        Protocol::Torrent
    }

    async fn list_items(&self) -> Result<Vec<BackendItem>> {
        self.calls.lock().unwrap().push(MockCall::List);
        let outcome = *self.list.lock().unwrap();
        self.outcome(outcome, "list")?;
        Ok(self.items.lock().unwrap().clone())
    }

    async fn remove_item(&self, item: &BackendItem, delete_data: bool) -> Result<()> {
        self.calls.lock().unwrap().push(MockCall::Remove {
            download_id: item.download_id.clone(),
            delete_data,
        });
        let outcome = *self.remove.lock().unwrap();
        self.outcome(outcome, "remove")?;
        self.items
            .lock()
            .unwrap()
            .retain(|i| i.download_id != item.download_id);
        Ok(())
    }

    async fn mark_item_as_imported(&self, item: &BackendItem) -> Result<()> {
        self.calls.lock().unwrap().push(MockCall::MarkImported {
            download_id: item.download_id.clone(),
        });
        let outcome = *self.mark_imported.lock().unwrap();
        self.outcome(outcome, "mark imported")
    }

    async fn status(&self) -> Result<BackendStatus> {
        Ok(BackendStatus {
            is_localhost: true,
            output_root_folders: vec![],
        })
    }

    async fn test(&self) -> Result<Vec<ValidationFailure>> {
        let outcome = *self.list.lock().unwrap();
        self.outcome(outcome, "test")?;
        Ok(self.failures.lock().unwrap().clone())
    }
}
