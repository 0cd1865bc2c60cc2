//! Core types for grab-queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use utoipa::ToSchema;

/// Unique identifier for a row in the download queue
///
/// Pending releases and tracked downloads draw ids from one shared allocator,
/// so an id resolves in at most one of the two stores.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct QueueId(pub i64);

impl QueueId {
    /// Create a new QueueId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for QueueId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<QueueId> for i64 {
    fn from(id: QueueId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for QueueId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<QueueId> for i64 {
    fn eq(&self, other: &QueueId) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for QueueId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for QueueId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for QueueId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for QueueId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Hands out queue ids shared by pending releases and tracked downloads
///
/// Ids are process-local and monotonic; they are not persisted.
#[derive(Clone, Debug, Default)]
pub struct QueueIdAllocator(Arc<AtomicI64>);

impl QueueIdAllocator {
    /// Create an allocator whose first id is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id
    pub fn next_id(&self) -> QueueId {
        QueueId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Transfer protocol of a release or download
///
/// Variant order is the sort order used by the queue view.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Protocol could not be determined
    #[default]
    Unknown,
    /// NZB / usenet
    Usenet,
    /// BitTorrent
    Torrent,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Protocol::Unknown => "unknown",
            Protocol::Usenet => "usenet",
            Protocol::Torrent => "torrent",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Protocol::Unknown),
            "usenet" => Ok(Protocol::Usenet),
            "torrent" => Ok(Protocol::Torrent),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

/// Quality of a release (e.g. FLAC, MP3-320)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Quality {
    /// Quality definition id
    pub id: i32,
    /// Display name
    pub name: String,
}

/// Artist a release was matched to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtistRef {
    /// Library artist id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Name used for sorting ("Beatles, The")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
}

/// Album a release was matched to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    /// Library album id
    pub id: i64,
    /// Album title
    pub title: String,
    /// Original release date, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
}

/// Release as reported by an indexer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release title as published
    pub title: String,
    /// Indexer that published the release
    #[serde(default)]
    pub indexer: String,
    /// Transfer protocol
    #[serde(default)]
    pub protocol: Protocol,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Release publish date, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
}

/// A release correlated with library entities
///
/// Shared by pending releases, grab history records and blocklist entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAlbum {
    /// Matched artist
    pub artist: ArtistRef,
    /// Matched albums (one release may cover several)
    pub albums: Vec<AlbumRef>,
    /// Release details
    pub release: ReleaseInfo,
    /// Parsed quality
    pub quality: Quality,
}

impl RemoteAlbum {
    /// Album ids sorted ascending, used to compare album sets
    pub fn album_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.albums.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Status of an item as reported by its download backend
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendItemStatus {
    /// Waiting in the backend's own queue
    Queued,
    /// Paused in the backend
    Paused,
    /// Transferring
    Downloading,
    /// Finished transferring
    Completed,
    /// Failed in the backend
    Failed,
    /// Backend reports a problem but keeps the item
    Warning,
}

/// Why a release is waiting instead of being grabbed
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum PendingReason {
    /// Held back by a delay profile
    Delay,
    /// No download backend could accept it
    DownloadClientUnavailable,
    /// Preferred protocol failed, held for the fallback protocol
    Fallback,
}

impl PendingReason {
    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingReason::Delay => "delay",
            PendingReason::DownloadClientUnavailable => "downloadClientUnavailable",
            PendingReason::Fallback => "fallback",
        }
    }

    /// Parse the storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delay" => Some(PendingReason::Delay),
            "downloadClientUnavailable" => Some(PendingReason::DownloadClientUnavailable),
            "fallback" => Some(PendingReason::Fallback),
            _ => None,
        }
    }
}

/// Unified status of a queue row
///
/// Tracked downloads report their backend status, pending releases their reason.
/// Variant order is the natural order used when sorting by status.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum QueueStatus {
    /// Waiting in the backend's own queue
    Queued,
    /// Paused in the backend
    Paused,
    /// Transferring
    Downloading,
    /// Finished transferring
    Completed,
    /// Failed in the backend
    Failed,
    /// Backend reports a problem
    Warning,
    /// Pending: delay profile
    Delay,
    /// Pending: no backend could accept it
    DownloadClientUnavailable,
    /// Pending: waiting for fallback protocol
    Fallback,
}

impl From<BackendItemStatus> for QueueStatus {
    fn from(status: BackendItemStatus) -> Self {
        match status {
            BackendItemStatus::Queued => QueueStatus::Queued,
            BackendItemStatus::Paused => QueueStatus::Paused,
            BackendItemStatus::Downloading => QueueStatus::Downloading,
            BackendItemStatus::Completed => QueueStatus::Completed,
            BackendItemStatus::Failed => QueueStatus::Failed,
            BackendItemStatus::Warning => QueueStatus::Warning,
        }
    }
}

impl From<PendingReason> for QueueStatus {
    fn from(reason: PendingReason) -> Self {
        match reason {
            PendingReason::Delay => QueueStatus::Delay,
            PendingReason::DownloadClientUnavailable => QueueStatus::DownloadClientUnavailable,
            PendingReason::Fallback => QueueStatus::Fallback,
        }
    }
}

/// Lifecycle state of a tracked download on this side of the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TrackedDownloadState {
    /// Transferring in the backend
    Downloading,
    /// Finished, waiting for import
    ImportPending,
    /// Backend reported failure, waiting for the failure to be processed
    FailedPending,
    /// Ignored by the user; no further processing
    Ignored,
}

impl TrackedDownloadState {
    /// Initial state derived from the backend status
    pub fn from_backend_status(status: BackendItemStatus) -> Self {
        match status {
            BackendItemStatus::Completed => TrackedDownloadState::ImportPending,
            BackendItemStatus::Failed => TrackedDownloadState::FailedPending,
            _ => TrackedDownloadState::Downloading,
        }
    }
}

/// Where a blocklist entry came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlocklistSource {
    /// A pending release was blocklisted before it was grabbed
    PendingRelease,
    /// A grabbed download was marked as failed
    FailedDownload,
}

impl BlocklistSource {
    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            BlocklistSource::PendingRelease => "pending_release",
            BlocklistSource::FailedDownload => "failed_download",
        }
    }

    /// Parse the storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_release" => Some(BlocklistSource::PendingRelease),
            "failed_download" => Some(BlocklistSource::FailedDownload),
            _ => None,
        }
    }
}

/// Why a download stopped being tracked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// Explicitly removed from the queue
    Removed,
    /// Ignored by the user
    Ignored,
}

/// Event emitted when queue state changes
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A backend poll replaced that backend's tracked downloads
    QueueUpdated {
        /// Backend instance name
        backend: String,
        /// Number of downloads now tracked for the backend
        tracked: usize,
    },

    /// Pending releases were added or removed
    PendingReleasesUpdated,

    /// Downloads were removed from tracking
    TrackingStopped {
        /// External download ids
        download_ids: Vec<String>,
    },

    /// A download was ignored by the user
    DownloadIgnored {
        /// External download id
        download_id: String,
        /// Title as reported by the backend
        title: String,
    },

    /// A download was marked as failed by the user
    DownloadFailed {
        /// External download id
        download_id: String,
        /// Release title
        source_title: String,
        /// Failure message
        message: String,
        /// Whether the acquisition side should skip searching for a replacement
        skip_redownload: bool,
    },

    /// A backend could not be polled
    BackendUnavailable {
        /// Backend instance name
        backend: String,
        /// Error message
        error: String,
    },

    /// The manager is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn queue_id_parses_and_displays() {
        let id = QueueId::from_str(" 42 ").unwrap();
        assert_eq!(id, 42);
        assert_eq!(id.to_string(), "42");
        assert!(QueueId::from_str("abc").is_err());
    }

    #[test]
    fn allocator_clones_share_one_sequence() {
        let ids = QueueIdAllocator::new();
        let other = ids.clone();
        assert_eq!(ids.next_id(), QueueId(1));
        assert_eq!(other.next_id(), QueueId(2));
        assert_eq!(ids.next_id(), QueueId(3));
    }

    #[test]
    fn protocol_order_matches_view_sort_order() {
        assert!(Protocol::Unknown < Protocol::Usenet);
        assert!(Protocol::Usenet < Protocol::Torrent);
    }

    #[test]
    fn protocol_parse_is_case_insensitive() {
        assert_eq!(Protocol::from_str("Torrent").unwrap(), Protocol::Torrent);
        assert_eq!(Protocol::from_str("USENET").unwrap(), Protocol::Usenet);
        assert!(Protocol::from_str("ftp").is_err());
    }

    #[test]
    fn pending_reason_storage_names_round_trip() {
        for reason in [
            PendingReason::Delay,
            PendingReason::DownloadClientUnavailable,
            PendingReason::Fallback,
        ] {
            assert_eq!(PendingReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(PendingReason::parse("nope"), None);
    }

    #[test]
    fn backend_status_maps_to_initial_tracked_state() {
        assert_eq!(
            TrackedDownloadState::from_backend_status(BackendItemStatus::Completed),
            TrackedDownloadState::ImportPending
        );
        assert_eq!(
            TrackedDownloadState::from_backend_status(BackendItemStatus::Failed),
            TrackedDownloadState::FailedPending
        );
        assert_eq!(
            TrackedDownloadState::from_backend_status(BackendItemStatus::Warning),
            TrackedDownloadState::Downloading
        );
    }

    #[test]
    fn remote_album_ids_are_sorted_and_unique() {
        let remote = RemoteAlbum {
            artist: ArtistRef {
                id: 1,
                name: "Artist".into(),
                sort_name: None,
            },
            albums: vec![
                AlbumRef {
                    id: 9,
                    title: "B".into(),
                    release_date: None,
                },
                AlbumRef {
                    id: 3,
                    title: "A".into(),
                    release_date: None,
                },
                AlbumRef {
                    id: 9,
                    title: "B".into(),
                    release_date: None,
                },
            ],
            release: ReleaseInfo {
                title: "Artist - A".into(),
                indexer: "idx".into(),
                protocol: Protocol::Usenet,
                size: 10,
                publish_date: None,
            },
            quality: Quality {
                id: 6,
                name: "FLAC".into(),
            },
        };
        assert_eq!(remote.album_ids(), vec![3, 9]);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::TrackingStopped {
            download_ids: vec!["ABC".into()],
        })
        .unwrap();
        assert_eq!(json["type"], "tracking_stopped");
        assert_eq!(json["download_ids"][0], "ABC");
    }
}
