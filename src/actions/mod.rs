//! Queue actions: removing, blocklisting, re-categorizing and ignoring queue rows
//!
//! A removal touches up to four collaborators (pending store, backend, blocklist ledger,
//! tracked registry) and none of them share a transaction. Steps run in a fixed order and
//! the first failing step aborts the rest; effects of earlier steps stay in place.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::backend::{BackendRegistry, DownloadBackend};
use crate::blocklist::{
    BlocklistLedger, MANUALLY_MARKED_AS_FAILED, NewBlocklistEntry, PENDING_RELEASE_BLOCKLISTED,
};
use crate::pending::{PendingRelease, PendingReleaseStore};
use crate::tracked::{TrackedDownload, TrackedDownloadRegistry};
use crate::types::{BlocklistSource, Event, QueueId};
use crate::{Error, Result};

/// What a removal does besides taking the row out of the queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RemovalOptions {
    /// Remove the download and its data from the backend
    pub remove_from_client: bool,
    /// Blocklist the release (pending) or mark the download as failed (tracked)
    pub blocklist: bool,
    /// After marking as failed, do not search for a replacement
    pub skip_redownload: bool,
    /// Leave the download in the backend but move it to the imported category
    pub change_category: bool,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            remove_from_client: true,
            blocklist: false,
            skip_redownload: false,
            change_category: false,
        }
    }
}

impl RemovalOptions {
    fn is_passive(&self) -> bool {
        !self.remove_from_client && !self.blocklist && !self.change_category
    }
}

/// A queue id that could not be removed in a bulk request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkFailure {
    /// Queue row id
    pub id: QueueId,
    /// Error message
    pub error: String,
}

/// Outcome of a bulk removal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkRemovalReport {
    /// Rows removed
    pub removed: Vec<QueueId>,
    /// Rows left alone because ignoring them was not possible
    pub skipped: Vec<QueueId>,
    /// Rows whose removal failed part-way
    pub failed: Vec<BulkFailure>,
}

enum Target {
    Pending(Arc<PendingRelease>),
    Tracked(Arc<TrackedDownload>),
}

/// Applies removal actions to queue rows
pub struct ActionCoordinator {
    pending: Arc<PendingReleaseStore>,
    tracked: Arc<TrackedDownloadRegistry>,
    backends: Arc<BackendRegistry>,
    blocklist: Arc<dyn BlocklistLedger>,
    event_tx: broadcast::Sender<Event>,
}

impl ActionCoordinator {
    /// Create a coordinator over the given stores and collaborators
    pub fn new(
        pending: Arc<PendingReleaseStore>,
        tracked: Arc<TrackedDownloadRegistry>,
        backends: Arc<BackendRegistry>,
        blocklist: Arc<dyn BlocklistLedger>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            pending,
            tracked,
            backends,
            blocklist,
            event_tx,
        }
    }

    /// Pending releases first, then tracked downloads
    fn lookup(&self, id: QueueId) -> Option<Target> {
        if let Some(release) = self.pending.find_pending_queue_item(id) {
            return Some(Target::Pending(release));
        }
        let queued = self.tracked.find_by_queue_id(id)?;
        self.tracked
            .find(queued.backend_name(), &queued.download_id)
            .map(Target::Tracked)
    }

    /// Remove one queue row
    ///
    /// Fails with [`Error::QueueItemNotFound`] when the id matches neither store. A tracked
    /// download is stop-tracked only when every requested step succeeded.
    pub async fn remove_queue_item(&self, id: QueueId, options: &RemovalOptions) -> Result<()> {
        match self.lookup(id).ok_or(Error::QueueItemNotFound { id })? {
            Target::Pending(release) => self.remove_pending(&release, options).await,
            Target::Tracked(download) => {
                if self.remove_tracked(&download, options).await? {
                    self.tracked.stop_tracking(&[download.key()]).await;
                }
                Ok(())
            }
        }
    }

    /// Remove several queue rows with the same options
    ///
    /// Unknown ids are skipped silently. Repeated ids, and ids naming the same backend
    /// download, are processed once. A failing row does not stop the others; every
    /// successfully removed tracked download is stop-tracked in one batch at the end.
    pub async fn remove_queue_items(
        &self,
        ids: &[QueueId],
        options: &RemovalOptions,
    ) -> BulkRemovalReport {
        let mut pending = Vec::new();
        let mut tracked = Vec::new();
        let mut seen_pending = HashSet::new();
        let mut seen_tracked = HashSet::new();

        for id in ids {
            match self.lookup(*id) {
                Some(Target::Pending(release)) => {
                    if seen_pending.insert(release.queue_id) {
                        pending.push(release);
                    }
                }
                Some(Target::Tracked(download)) => {
                    if seen_tracked.insert(download.key()) {
                        tracked.push(download);
                    }
                }
                None => debug!(queue_id = %id, "skipping unknown queue id"),
            }
        }

        let mut report = BulkRemovalReport::default();

        for release in pending {
            match self.remove_pending(&release, options).await {
                Ok(()) => report.removed.push(release.queue_id),
                Err(e) => {
                    warn!(queue_id = %release.queue_id, error = %e, "failed to remove pending release");
                    report.failed.push(BulkFailure {
                        id: release.queue_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut stop = Vec::new();
        for download in tracked {
            match self.remove_tracked(&download, options).await {
                Ok(true) => {
                    stop.push(download.key());
                    report.removed.push(download.queue_id);
                }
                Ok(false) => report.skipped.push(download.queue_id),
                Err(e) => {
                    warn!(
                        queue_id = %download.queue_id,
                        download_id = %download.download_id,
                        error = %e,
                        "failed to remove download"
                    );
                    report.failed.push(BulkFailure {
                        id: download.queue_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.tracked.stop_tracking(&stop).await;

        info!(
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "bulk queue removal finished"
        );
        report
    }

    async fn remove_pending(&self, release: &PendingRelease, options: &RemovalOptions) -> Result<()> {
        if options.blocklist {
            let entry = NewBlocklistEntry::from_remote_album(
                &release.remote_album,
                None,
                PENDING_RELEASE_BLOCKLISTED,
                BlocklistSource::PendingRelease,
                Utc::now(),
            );
            self.blocklist.block(entry).await?;
        }

        match self.pending.remove_pending_queue_items(release.queue_id).await {
            // Already removed together with another candidate for the same albums
            Ok(_) | Err(Error::QueueItemNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns whether the download should be stop-tracked
    async fn remove_tracked(
        &self,
        download: &TrackedDownload,
        options: &RemovalOptions,
    ) -> Result<bool> {
        if options.remove_from_client {
            let backend = self.backend_for(download)?;
            backend.remove_item(&download.item, true).await?;
            info!(
                backend = %backend.name(),
                download_id = %download.download_id,
                "removed download from backend"
            );
        } else if options.change_category {
            let backend = self.backend_for(download)?;
            backend.mark_item_as_imported(&download.item).await?;
        }

        if options.blocklist {
            self.mark_as_failed(download, options.skip_redownload).await?;
        }

        if options.is_passive() && !self.tracked.ignore(download).await {
            return Ok(false);
        }

        Ok(true)
    }

    fn backend_for(&self, download: &TrackedDownload) -> Result<Arc<dyn DownloadBackend>> {
        self.backends
            .get(download.backend_name())
            .ok_or_else(|| Error::BackendUnavailable {
                name: download.backend_name().to_string(),
            })
    }

    async fn mark_as_failed(&self, download: &TrackedDownload, skip_redownload: bool) -> Result<()> {
        let Some(remote_album) = &download.remote_album else {
            warn!(
                download_id = %download.download_id,
                "unable to mark as failed, no grab recorded for download"
            );
            return Ok(());
        };

        let entry = NewBlocklistEntry::from_remote_album(
            remote_album,
            Some(download.download_id.clone()),
            MANUALLY_MARKED_AS_FAILED,
            BlocklistSource::FailedDownload,
            Utc::now(),
        );
        self.blocklist.block(entry).await?;

        self.event_tx
            .send(Event::DownloadFailed {
                download_id: download.download_id.clone(),
                source_title: remote_album.release.title.clone(),
                message: MANUALLY_MARKED_AS_FAILED.to_string(),
                skip_redownload,
            })
            .ok();
        Ok(())
    }
}
