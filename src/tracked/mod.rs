//! Tracked download registry
//!
//! Keeps one [`TrackedDownload`] per item the backends report, correlated with the grab
//! that put it there. The registry is a computed view: the backends own the truth, and each
//! poll replaces that backend's downloads wholesale through [`TrackedDownloadRegistry::reconcile`].
//!
//! Readers take a cheap `Arc` clone of the current [`TrackedSnapshot`] and never wait on
//! backend I/O. Writers are serialized by an async mutex and publish a new snapshot by
//! swapping the `Arc`.
//!
//! Stopping tracking is a visibility barrier: once [`TrackedDownloadRegistry::stop_tracking`]
//! returns, the download is absent from every later snapshot, even if a backend keeps
//! reporting it. Such ids are remembered as *released* until the backend stops reporting them.
//!
//! Download ids are only unique within one backend, so downloads are keyed by
//! [`DownloadKey`]: the same torrent hash in two clients is two downloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::Result;
use crate::backend::BackendItem;
use crate::types::{
    AlbumRef, ArtistRef, Event, Protocol, Quality, QueueId, QueueIdAllocator, ReleaseReason,
    RemoteAlbum, TrackedDownloadState,
};

/// A release handed to a backend, as remembered by the acquisition side
#[derive(Debug, Clone, PartialEq)]
pub struct GrabRecord {
    /// Backend download id the release was submitted under
    pub download_id: String,
    /// Backend instance name
    pub backend: String,
    /// Correlated release
    pub remote_album: RemoteAlbum,
    /// When it was grabbed
    pub grabbed_at: DateTime<Utc>,
}

/// Lookup of grabs by backend download id
#[async_trait]
pub trait GrabHistory: Send + Sync {
    /// Find the grab recorded for a download id
    async fn find_grab(&self, download_id: &str) -> Result<Option<GrabRecord>>;
}

/// Identity of a tracked download
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadKey {
    /// Backend instance name
    pub backend: String,
    /// Backend download id
    pub download_id: String,
}

impl DownloadKey {
    /// Key for a download id reported by `backend`
    pub fn new(backend: impl Into<String>, download_id: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            download_id: download_id.into(),
        }
    }
}

/// A live backend item correlated with its grab
#[derive(Debug, Clone)]
pub struct TrackedDownload {
    /// Queue row id
    pub queue_id: QueueId,
    /// Backend download id
    pub download_id: String,
    /// Latest snapshot from the backend
    pub item: BackendItem,
    /// Correlated grab; `None` for downloads this application did not grab
    pub remote_album: Option<RemoteAlbum>,
    /// Processing state
    pub state: TrackedDownloadState,
    /// When the release was grabbed
    pub added: Option<DateTime<Utc>>,
    /// Snapshot time plus the backend's remaining time
    pub estimated_completion_time: Option<DateTime<Utc>>,
    /// Last poll that reported the item
    pub last_seen: DateTime<Utc>,
}

impl TrackedDownload {
    /// Backend instance name
    pub fn backend_name(&self) -> &str {
        &self.item.backend.name
    }

    /// Registry key of this download
    pub fn key(&self) -> DownloadKey {
        DownloadKey::new(self.backend_name(), self.download_id.as_str())
    }

    /// Matched artist, if correlated
    pub fn artist(&self) -> Option<&ArtistRef> {
        self.remote_album.as_ref().map(|r| &r.artist)
    }

    /// Matched albums (empty if not correlated)
    pub fn albums(&self) -> &[AlbumRef] {
        self.remote_album
            .as_ref()
            .map(|r| r.albums.as_slice())
            .unwrap_or_default()
    }

    /// Parsed quality, if correlated
    pub fn quality(&self) -> Option<&Quality> {
        self.remote_album.as_ref().map(|r| &r.quality)
    }

    /// Indexer the release came from, if correlated
    pub fn indexer(&self) -> Option<&str> {
        self.remote_album
            .as_ref()
            .map(|r| r.release.indexer.as_str())
            .filter(|i| !i.is_empty())
    }

    /// Protocol of the backend that holds the download
    pub fn protocol(&self) -> Protocol {
        self.item.backend.protocol
    }
}

/// Immutable view of every tracked download at one point in time
#[derive(Debug, Default)]
pub struct TrackedSnapshot {
    downloads: Vec<Arc<TrackedDownload>>,
}

impl TrackedSnapshot {
    /// Tracked downloads ordered by queue id
    pub fn downloads(&self) -> &[Arc<TrackedDownload>] {
        &self.downloads
    }

    /// Find by backend and backend download id
    pub fn find(&self, backend: &str, download_id: &str) -> Option<&Arc<TrackedDownload>> {
        self.downloads
            .iter()
            .find(|d| d.backend_name() == backend && d.download_id == download_id)
    }

    /// Find by queue row id
    pub fn find_by_queue_id(&self, id: QueueId) -> Option<&Arc<TrackedDownload>> {
        self.downloads.iter().find(|d| d.queue_id == id)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    downloads: HashMap<DownloadKey, Arc<TrackedDownload>>,
    released: HashMap<DownloadKey, ReleaseReason>,
}

/// Registry of tracked downloads
pub struct TrackedDownloadRegistry {
    snapshot: RwLock<Arc<TrackedSnapshot>>,
    state: Mutex<RegistryState>,
    ids: QueueIdAllocator,
    grace_window: Duration,
    event_tx: broadcast::Sender<Event>,
}

impl TrackedDownloadRegistry {
    /// Create an empty registry
    ///
    /// Downloads a backend stops reporting are kept for `grace_window` after they were last seen.
    pub fn new(
        ids: QueueIdAllocator,
        grace_window: Duration,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(TrackedSnapshot::default())),
            state: Mutex::new(RegistryState::default()),
            ids,
            grace_window,
            event_tx,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<TrackedSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Every tracked download in the current snapshot
    pub fn entries(&self) -> Vec<Arc<TrackedDownload>> {
        self.snapshot().downloads().to_vec()
    }

    /// Find by backend and backend download id
    pub fn find(&self, backend: &str, download_id: &str) -> Option<Arc<TrackedDownload>> {
        self.snapshot().find(backend, download_id).cloned()
    }

    /// Find by queue row id
    pub fn find_by_queue_id(&self, id: QueueId) -> Option<Arc<TrackedDownload>> {
        self.snapshot().find_by_queue_id(id).cloned()
    }

    fn publish(&self, state: &RegistryState) {
        let mut downloads: Vec<Arc<TrackedDownload>> = state.downloads.values().cloned().collect();
        downloads.sort_by_key(|d| d.queue_id);
        let next = Arc::new(TrackedSnapshot { downloads });
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Replace every tracked download of `backend` with what the backend just reported
    ///
    /// Queue ids, grab correlation and `added` survive across polls. New ids are correlated
    /// through `grabs`; a failed lookup leaves the download uncorrelated until the next poll.
    /// Downloads missing from `items` stay until they have not been seen for the grace window.
    /// Returns the number of downloads tracked for the backend afterwards.
    pub async fn reconcile(
        &self,
        backend: &str,
        items: Vec<BackendItem>,
        grabs: &dyn GrabHistory,
        now: DateTime<Utc>,
    ) -> usize {
        let mut state = self.state.lock().await;

        // Forget released ids the backend no longer reports
        state.released.retain(|key, _| {
            key.backend != backend || items.iter().any(|i| i.download_id == key.download_id)
        });

        let mut reported: HashMap<DownloadKey, Arc<TrackedDownload>> = HashMap::new();
        for item in items {
            let key = DownloadKey::new(backend, item.download_id.as_str());
            if state.released.contains_key(&key) {
                continue;
            }

            let previous = state.downloads.get(&key).cloned();

            let mut remote_album = previous.as_ref().and_then(|p| p.remote_album.clone());
            let mut added = previous.as_ref().and_then(|p| p.added);
            if remote_album.is_none() {
                match grabs.find_grab(&item.download_id).await {
                    Ok(Some(grab)) => {
                        debug!(
                            backend = %backend,
                            download_id = %item.download_id,
                            "correlated download with grab"
                        );
                        added = Some(grab.grabbed_at);
                        remote_album = Some(grab.remote_album);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(
                        backend = %backend,
                        download_id = %item.download_id,
                        error = %e,
                        "grab history lookup failed"
                    ),
                }
            }

            let state_for_item = match &previous {
                Some(p) if p.state == TrackedDownloadState::Ignored => TrackedDownloadState::Ignored,
                _ => TrackedDownloadState::from_backend_status(item.status),
            };
            let estimated_completion_time = item
                .remaining_time
                .and_then(|left| chrono::Duration::from_std(left).ok())
                .and_then(|left| now.checked_add_signed(left));

            let download = TrackedDownload {
                queue_id: previous
                    .as_ref()
                    .map(|p| p.queue_id)
                    .unwrap_or_else(|| self.ids.next_id()),
                download_id: item.download_id.clone(),
                remote_album,
                state: state_for_item,
                added,
                estimated_completion_time,
                last_seen: now,
                item,
            };
            reported.insert(key, Arc::new(download));
        }

        let grace = chrono::Duration::from_std(self.grace_window).unwrap_or(chrono::Duration::MAX);
        let mut dropped = Vec::new();
        state.downloads.retain(|key, download| {
            if key.backend != backend || reported.contains_key(key) {
                return true;
            }
            let keep = now.signed_duration_since(download.last_seen) <= grace;
            if !keep {
                dropped.push(key.download_id.clone());
            }
            keep
        });
        for id in &dropped {
            debug!(backend = %backend, download_id = %id, "download vanished from backend");
        }
        state.downloads.extend(reported);

        let tracked = state
            .downloads
            .keys()
            .filter(|key| key.backend == backend)
            .count();
        self.publish(&state);
        drop(state);

        self.event_tx
            .send(Event::QueueUpdated {
                backend: backend.to_string(),
                tracked,
            })
            .ok();
        tracked
    }

    /// Stop tracking downloads
    ///
    /// Idempotent. Stopped downloads are suppressed from later polls until their backend
    /// stops reporting them.
    pub async fn stop_tracking(&self, keys: &[DownloadKey]) {
        if keys.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;
        let mut stopped = Vec::new();
        for key in keys {
            if state.downloads.remove(key).is_none() {
                continue;
            }
            let reason = state
                .released
                .get(key)
                .copied()
                .unwrap_or(ReleaseReason::Removed);
            state.released.insert(key.clone(), reason);
            stopped.push(key.download_id.clone());
        }

        if stopped.is_empty() {
            return;
        }
        self.publish(&state);
        drop(state);

        info!(count = stopped.len(), "stopped tracking downloads");
        self.event_tx
            .send(Event::TrackingStopped {
                download_ids: stopped,
            })
            .ok();
    }

    /// Ignore a download: no further processing, and it will not come back once stop-tracked
    ///
    /// Returns `false` when the download is already ignored or released, or when it has no
    /// correlated artist and albums to ignore it for.
    pub async fn ignore(&self, download: &TrackedDownload) -> bool {
        let key = download.key();
        let mut state = self.state.lock().await;

        if state.released.contains_key(&key) {
            debug!(download_id = %download.download_id, "download already released");
            return false;
        }
        let Some(current) = state.downloads.get(&key).cloned() else {
            return false;
        };
        if current.state == TrackedDownloadState::Ignored {
            return false;
        }
        if current.artist().is_none() || current.albums().is_empty() {
            warn!(
                download_id = %download.download_id,
                "cannot ignore download without artist and albums"
            );
            return false;
        }

        state.released.insert(key.clone(), ReleaseReason::Ignored);
        let mut ignored = (*current).clone();
        ignored.state = TrackedDownloadState::Ignored;
        state.downloads.insert(key, Arc::new(ignored));
        self.publish(&state);
        drop(state);

        info!(download_id = %download.download_id, "download ignored");
        self.event_tx
            .send(Event::DownloadIgnored {
                download_id: download.download_id.clone(),
                title: download.item.title.clone(),
            })
            .ok();
        true
    }
}
