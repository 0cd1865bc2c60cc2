//! Pending release store
//!
//! Releases accepted for download but not yet handed to a backend. The store keeps an
//! in-memory snapshot for the queue view and persists every change to the database, so
//! pending releases survive a restart. Queue ids are process-local and handed out again
//! when the store is loaded.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::db::{Database, NewPendingRelease, StoredPendingRelease};
use crate::queue::QueueEntry;
use crate::types::{Event, PendingReason, QueueId, QueueIdAllocator, RemoteAlbum};
use crate::{Error, Result};

/// A release waiting to be grabbed
#[derive(Debug, Clone)]
pub struct PendingRelease {
    /// Queue row id
    pub queue_id: QueueId,
    /// Database row id
    pub storage_id: i64,
    /// Correlated release
    pub remote_album: RemoteAlbum,
    /// Why the release is held back
    pub reason: PendingReason,
    /// When the release was first held back
    pub added: DateTime<Utc>,
    /// When the delay expires, if it does
    pub release_at: Option<DateTime<Utc>>,
}

impl PendingRelease {
    fn from_stored(queue_id: QueueId, stored: StoredPendingRelease) -> Self {
        Self {
            queue_id,
            storage_id: stored.id,
            remote_album: stored.remote_album,
            reason: stored.reason,
            added: stored.added,
            release_at: stored.release_at,
        }
    }

    /// Whether `other` is a candidate for the same artist and album set
    pub fn same_albums(&self, other: &PendingRelease) -> bool {
        self.remote_album.artist.id == other.remote_album.artist.id
            && self.remote_album.album_ids() == other.remote_album.album_ids()
    }
}

/// A pending release as seen by one queue read
#[derive(Debug, Clone)]
pub struct PendingQueueItem {
    /// The stored release
    pub release: Arc<PendingRelease>,
    /// Time until the delay expires, floored at zero; `None` without a release time
    pub time_left: Option<Duration>,
    /// When the delay expires
    pub estimated_completion_time: Option<DateTime<Utc>>,
}

impl PendingQueueItem {
    /// Compute the time-dependent fields for `release` at `now`
    pub fn at(release: Arc<PendingRelease>, now: DateTime<Utc>) -> Self {
        let time_left = release.release_at.map(|at| {
            at.signed_duration_since(now)
                .to_std()
                .unwrap_or(Duration::ZERO)
        });
        let estimated_completion_time = release.release_at;
        Self {
            release,
            time_left,
            estimated_completion_time,
        }
    }
}

/// Store of pending releases
pub struct PendingReleaseStore {
    db: Arc<Database>,
    releases: RwLock<Arc<Vec<Arc<PendingRelease>>>>,
    write: Mutex<()>,
    ids: QueueIdAllocator,
    event_tx: broadcast::Sender<Event>,
}

impl PendingReleaseStore {
    /// Create an empty store; call [`load`](Self::load) to pick up persisted releases
    pub fn new(db: Arc<Database>, ids: QueueIdAllocator, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            db,
            releases: RwLock::new(Arc::new(Vec::new())),
            write: Mutex::new(()),
            ids,
            event_tx,
        }
    }

    fn current(&self) -> Arc<Vec<Arc<PendingRelease>>> {
        match self.releases.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn replace(&self, next: Vec<Arc<PendingRelease>>) {
        let next = Arc::new(next);
        match self.releases.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Replace the in-memory releases with what the database holds
    ///
    /// Returns the number of releases loaded.
    pub async fn load(&self) -> Result<usize> {
        let _guard = self.write.lock().await;
        let stored = self.db.list_pending_releases().await?;
        let releases: Vec<Arc<PendingRelease>> = stored
            .into_iter()
            .map(|s| Arc::new(PendingRelease::from_stored(self.ids.next_id(), s)))
            .collect();
        let count = releases.len();
        self.replace(releases);

        info!(count, "loaded pending releases");
        Ok(count)
    }

    /// Hold back a release
    pub async fn add(
        &self,
        remote_album: RemoteAlbum,
        reason: PendingReason,
        release_at: Option<DateTime<Utc>>,
    ) -> Result<Arc<PendingRelease>> {
        let _guard = self.write.lock().await;
        let new = NewPendingRelease {
            remote_album,
            reason,
            added: Utc::now(),
            release_at,
        };
        let storage_id = self.db.insert_pending_release(&new).await?;

        let release = Arc::new(PendingRelease {
            queue_id: self.ids.next_id(),
            storage_id,
            remote_album: new.remote_album,
            reason: new.reason,
            added: new.added,
            release_at: new.release_at,
        });
        let mut next = (*self.current()).clone();
        next.push(Arc::clone(&release));
        self.replace(next);

        info!(
            queue_id = %release.queue_id,
            title = %release.remote_album.release.title,
            reason = release.reason.as_str(),
            "release pending"
        );
        self.event_tx.send(Event::PendingReleasesUpdated).ok();
        Ok(release)
    }

    /// Every pending release in insertion order
    pub fn releases(&self) -> Vec<Arc<PendingRelease>> {
        self.current().to_vec()
    }

    /// Find a pending release by queue id
    pub fn find_pending_queue_item(&self, id: QueueId) -> Option<Arc<PendingRelease>> {
        self.current().iter().find(|r| r.queue_id == id).cloned()
    }

    /// Pending releases as queue entries, with time left computed at `now`
    pub fn get_pending_queue(&self, now: DateTime<Utc>) -> Vec<QueueEntry> {
        self.current()
            .iter()
            .map(|r| QueueEntry::Pending(PendingQueueItem::at(Arc::clone(r), now)))
            .collect()
    }

    /// Remove a pending release and every other candidate for the same artist and albums
    ///
    /// Returns the removed releases.
    pub async fn remove_pending_queue_items(&self, id: QueueId) -> Result<Vec<Arc<PendingRelease>>> {
        let _guard = self.write.lock().await;
        let current = self.current();
        let target = current
            .iter()
            .find(|r| r.queue_id == id)
            .cloned()
            .ok_or(Error::QueueItemNotFound { id })?;

        let (removed, kept): (Vec<_>, Vec<_>) =
            current.iter().cloned().partition(|r| r.same_albums(&target));
        let storage_ids: Vec<i64> = removed.iter().map(|r| r.storage_id).collect();
        let deleted = self.db.delete_pending_releases(&storage_ids).await?;
        self.replace(kept);

        debug!(queue_id = %id, rows = deleted, "removed pending releases");
        self.event_tx.send(Event::PendingReleasesUpdated).ok();
        Ok(removed)
    }
}
