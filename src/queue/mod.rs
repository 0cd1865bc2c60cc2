//! Queue merge and view engine
//!
//! Merges tracked downloads and pending releases into one filtered, sorted, paginated
//! view. The engine is pure: it reads `Arc` handles the stores hand it for one query and
//! never mutates them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::pending::PendingQueueItem;
use crate::tracked::TrackedDownload;
use crate::types::{AlbumRef, ArtistRef, Protocol, Quality, QueueId, QueueStatus};

mod sort;

pub use sort::{QualityRanking, SortDirection, SortKey};

/// One row of the download queue
#[derive(Debug, Clone)]
pub enum QueueEntry {
    /// A release waiting to be handed to a backend
    Pending(PendingQueueItem),
    /// A download a backend is working on
    Tracked(Arc<TrackedDownload>),
}

impl QueueEntry {
    /// Queue row id
    pub fn id(&self) -> QueueId {
        match self {
            QueueEntry::Pending(p) => p.release.queue_id,
            QueueEntry::Tracked(t) => t.queue_id,
        }
    }

    /// `pending` or `tracked`
    pub fn kind(&self) -> &'static str {
        match self {
            QueueEntry::Pending(_) => "pending",
            QueueEntry::Tracked(_) => "tracked",
        }
    }

    /// Release title, or the backend's title for tracked downloads
    pub fn title(&self) -> &str {
        match self {
            QueueEntry::Pending(p) => &p.release.remote_album.release.title,
            QueueEntry::Tracked(t) => &t.item.title,
        }
    }

    /// Matched artist
    pub fn artist(&self) -> Option<&ArtistRef> {
        match self {
            QueueEntry::Pending(p) => Some(&p.release.remote_album.artist),
            QueueEntry::Tracked(t) => t.artist(),
        }
    }

    /// Matched albums
    pub fn albums(&self) -> &[AlbumRef] {
        match self {
            QueueEntry::Pending(p) => &p.release.remote_album.albums,
            QueueEntry::Tracked(t) => t.albums(),
        }
    }

    /// First matched album
    pub fn album(&self) -> Option<&AlbumRef> {
        self.albums().first()
    }

    /// Parsed quality
    pub fn quality(&self) -> Option<&Quality> {
        match self {
            QueueEntry::Pending(p) => Some(&p.release.remote_album.quality),
            QueueEntry::Tracked(t) => t.quality(),
        }
    }

    /// Transfer protocol
    pub fn protocol(&self) -> Protocol {
        match self {
            QueueEntry::Pending(p) => p.release.remote_album.release.protocol,
            QueueEntry::Tracked(t) => t.protocol(),
        }
    }

    /// Indexer the release came from
    pub fn indexer(&self) -> Option<&str> {
        match self {
            QueueEntry::Pending(p) => Some(p.release.remote_album.release.indexer.as_str())
                .filter(|i| !i.is_empty()),
            QueueEntry::Tracked(t) => t.indexer(),
        }
    }

    /// Backend instance holding the download; pending releases have none yet
    pub fn download_client(&self) -> Option<&str> {
        match self {
            QueueEntry::Pending(_) => None,
            QueueEntry::Tracked(t) => Some(t.backend_name()),
        }
    }

    /// Backend download id; pending releases have none yet
    pub fn download_id(&self) -> Option<&str> {
        match self {
            QueueEntry::Pending(_) => None,
            QueueEntry::Tracked(t) => Some(&t.download_id),
        }
    }

    /// Unified status
    pub fn status(&self) -> QueueStatus {
        match self {
            QueueEntry::Pending(p) => p.release.reason.into(),
            QueueEntry::Tracked(t) => t.item.status.into(),
        }
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        match self {
            QueueEntry::Pending(p) => p.release.remote_album.release.size,
            QueueEntry::Tracked(t) => t.item.total_size,
        }
    }

    /// Bytes still to transfer; a pending release has transferred nothing
    pub fn size_left(&self) -> u64 {
        match self {
            QueueEntry::Pending(p) => p.release.remote_album.release.size,
            QueueEntry::Tracked(t) => t.item.remaining_size,
        }
    }

    /// Remaining time: until the delay expires, or until the backend finishes
    pub fn time_left(&self) -> Option<Duration> {
        match self {
            QueueEntry::Pending(p) => p.time_left,
            QueueEntry::Tracked(t) => t.item.remaining_time,
        }
    }

    /// Estimated completion time
    pub fn estimated_completion_time(&self) -> Option<DateTime<Utc>> {
        match self {
            QueueEntry::Pending(p) => p.estimated_completion_time,
            QueueEntry::Tracked(t) => t.estimated_completion_time,
        }
    }

    /// When the release was held back or grabbed
    pub fn added(&self) -> Option<DateTime<Utc>> {
        match self {
            QueueEntry::Pending(p) => Some(p.release.added),
            QueueEntry::Tracked(t) => t.added,
        }
    }

    /// Status message reported by the backend
    pub fn error_message(&self) -> Option<&str> {
        match self {
            QueueEntry::Pending(_) => None,
            QueueEntry::Tracked(t) => t.item.message.as_deref(),
        }
    }

    fn remaining_ratio(&self) -> Option<f64> {
        let size = self.size();
        (size > 0).then(|| self.size_left() as f64 / size as f64)
    }

    /// Progress used by the `progress` sort key; zero-size entries count as done
    pub fn progress(&self) -> f64 {
        self.remaining_ratio()
            .map(|ratio| 100.0 - ratio * 100.0)
            .unwrap_or(100.0)
    }

    /// Completion percentage used to break ties; zero-size entries count as 0%
    pub fn completion_percentage(&self) -> f64 {
        self.remaining_ratio()
            .map(|ratio| 100.0 - ratio * 100.0)
            .unwrap_or(0.0)
    }
}

/// Which entries a queue read returns
///
/// Empty sets mean no filtering on that field.
#[derive(Clone, Debug, Default)]
pub struct QueueFilter {
    /// Only entries for these artists
    pub artist_ids: HashSet<i64>,
    /// Only entries of this protocol
    pub protocol: Option<Protocol>,
    /// Only entries of these quality ids
    pub quality_ids: HashSet<i32>,
    /// Include tracked downloads that could not be matched to an artist
    pub include_unknown_artist_items: bool,
}

impl QueueFilter {
    fn matches(&self, entry: &QueueEntry) -> bool {
        if !self.artist_ids.is_empty()
            && !entry
                .artist()
                .is_some_and(|a| self.artist_ids.contains(&a.id))
        {
            return false;
        }
        if let Some(protocol) = self.protocol
            && entry.protocol() != protocol
        {
            return false;
        }
        if !self.quality_ids.is_empty()
            && !entry
                .quality()
                .is_some_and(|q| self.quality_ids.contains(&q.id))
        {
            return false;
        }
        true
    }
}

/// Page, page size and ordering of a queue read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagingSpec {
    /// 1-based page number
    pub page: usize,
    /// Records per page
    pub page_size: usize,
    /// Sort column
    pub sort_key: SortKey,
    /// Sort direction
    pub sort_direction: SortDirection,
}

impl Default for PagingSpec {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            sort_key: SortKey::TimeLeft,
            sort_direction: SortDirection::Ascending,
        }
    }
}

/// One page of the queue
#[derive(Clone, Debug)]
pub struct QueuePage {
    /// Page actually returned (may be lower than requested)
    pub page: usize,
    /// Records per page
    pub page_size: usize,
    /// Sort column
    pub sort_key: SortKey,
    /// Sort direction
    pub sort_direction: SortDirection,
    /// Number of entries matching the filter
    pub total_records: usize,
    /// Entries on this page
    pub records: Vec<QueueEntry>,
}

/// Paging metadata as returned over the wire
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Page returned
    pub page: usize,
    /// Records per page
    pub page_size: usize,
    /// Sort column
    pub sort_key: SortKey,
    /// Sort direction
    pub sort_direction: SortDirection,
    /// Number of entries matching the filter
    pub total_records: usize,
}

impl QueuePage {
    /// Paging metadata without the records
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page: self.page,
            page_size: self.page_size,
            sort_key: self.sort_key,
            sort_direction: self.sort_direction,
            total_records: self.total_records,
        }
    }
}

fn slice_page(entries: &[QueueEntry], page: usize, page_size: usize) -> Vec<QueueEntry> {
    entries
        .iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect()
}

/// Merge, filter, sort and paginate the queue
///
/// Tracked downloads without an artist are dropped unless the filter asks for them. A page
/// past the end is answered with the last page that has records.
pub fn build_queue_page(
    paging: &PagingSpec,
    filter: &QueueFilter,
    tracked: &[Arc<TrackedDownload>],
    pending: Vec<QueueEntry>,
    ranking: &QualityRanking,
) -> QueuePage {
    let page_size = paging.page_size.max(1);
    let mut page = paging.page.max(1);

    let mut entries: Vec<QueueEntry> = tracked
        .iter()
        .filter(|t| filter.include_unknown_artist_items || t.artist().is_some())
        .cloned()
        .map(QueueEntry::Tracked)
        .chain(pending)
        .filter(|e| filter.matches(e))
        .collect();

    entries.sort_by(|a, b| sort::compare(a, b, paging.sort_key, paging.sort_direction, ranking));

    let total_records = entries.len();
    let mut records = slice_page(&entries, page, page_size);
    if records.is_empty() && page > 1 {
        page = total_records.div_ceil(page_size).max(1);
        records = slice_page(&entries, page, page_size);
    }

    QueuePage {
        page,
        page_size,
        sort_key: paging.sort_key,
        sort_direction: paging.sort_direction,
        total_records,
        records,
    }
}
