//! Queue reads, removals, pending releases and grab recording.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::actions::{BulkRemovalReport, RemovalOptions};
use crate::blocklist::BlocklistEntry;
use crate::error::Result;
use crate::pending::PendingRelease;
use crate::queue::{PagingSpec, QueueFilter, QueuePage, build_queue_page};
use crate::tracked::{GrabRecord, TrackedDownload};
use crate::types::{PendingReason, QueueId, RemoteAlbum};

use super::QueueManager;

impl QueueManager {
    /// Read one page of the merged queue
    pub fn get_queue(&self, paging: &PagingSpec, filter: &QueueFilter) -> QueuePage {
        let now = Utc::now();
        let tracked = self.tracked.snapshot();
        build_queue_page(
            paging,
            filter,
            tracked.downloads(),
            self.pending.get_pending_queue(now),
            &self.ranking,
        )
    }

    /// Every tracked download in the current snapshot
    pub fn tracked_downloads(&self) -> Vec<Arc<TrackedDownload>> {
        self.tracked.entries()
    }

    /// Every pending release
    pub fn pending_releases(&self) -> Vec<Arc<PendingRelease>> {
        self.pending.releases()
    }

    /// Remove one queue row
    ///
    /// # Errors
    ///
    /// - [`Error::QueueItemNotFound`](crate::Error::QueueItemNotFound) when the id matches
    ///   neither a pending release nor a tracked download
    /// - [`Error::BackendUnavailable`](crate::Error::BackendUnavailable) when the download's
    ///   backend is no longer configured
    /// - [`Error::NotSupported`](crate::Error::NotSupported) when the backend cannot
    ///   perform the requested step
    /// - backend and database errors from the individual steps
    pub async fn remove_queue_item(&self, id: QueueId, options: RemovalOptions) -> Result<()> {
        tracing::info!(
            queue_id = %id,
            remove_from_client = options.remove_from_client,
            blocklist = options.blocklist,
            change_category = options.change_category,
            "removing queue item"
        );
        self.actions.remove_queue_item(id, &options).await
    }

    /// Remove several queue rows; unknown ids are skipped
    pub async fn remove_queue_items(
        &self,
        ids: &[QueueId],
        options: RemovalOptions,
    ) -> BulkRemovalReport {
        self.actions.remove_queue_items(ids, &options).await
    }

    /// Hold back a release until `release_at` (or indefinitely)
    pub async fn add_pending_release(
        &self,
        remote_album: RemoteAlbum,
        reason: PendingReason,
        release_at: Option<DateTime<Utc>>,
    ) -> Result<Arc<PendingRelease>> {
        self.pending.add(remote_album, reason, release_at).await
    }

    /// Remember that `remote_album` was handed to `backend` as `download_id`
    ///
    /// The next poll of that backend correlates the download with the release.
    pub async fn record_grab(
        &self,
        backend: &str,
        download_id: &str,
        remote_album: RemoteAlbum,
    ) -> Result<()> {
        let grab = GrabRecord {
            download_id: download_id.to_string(),
            backend: backend.to_string(),
            remote_album,
            grabbed_at: Utc::now(),
        };
        self.db.record_grab(&grab).await?;
        tracing::debug!(backend, download_id, "grab recorded");
        Ok(())
    }

    /// Page through the blocklist, newest first
    ///
    /// Returns the entries and the total number of entries.
    pub async fn list_blocklist(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<BlocklistEntry>, i64)> {
        let entries = self.db.list_blocklist(limit, offset).await?;
        let total = self.db.count_blocklist().await?;
        Ok((entries, total))
    }
}
