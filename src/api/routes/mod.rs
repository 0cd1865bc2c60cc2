//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`queue`] - Reading and removing queue rows
//! - [`blocklist`] - Blocklist listing
//! - [`system`] - Health, backend checks, events, OpenAPI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::ValidationFailure;
use crate::blocklist::BlocklistEntry;
use crate::queue::{PagingSpec, QueueEntry, QueueFilter, SortDirection, SortKey};
use crate::types::{AlbumRef, ArtistRef, Protocol, Quality, QueueId, QueueStatus};

mod blocklist;
mod queue;
mod system;

pub use blocklist::*;
pub use queue::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /queue
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueQuery {
    /// Page number, 1-based (default: 1)
    pub page: Option<usize>,
    /// Records per page (default: 10)
    pub page_size: Option<usize>,
    /// Sort column (default: timeleft)
    pub sort_key: Option<String>,
    /// `ascending` or `descending` (default: ascending)
    pub sort_direction: Option<String>,
    /// Keep rows that could not be matched to an artist
    pub include_unknown_artist_items: bool,
    /// Embed the matched artist in each record
    pub include_artist: bool,
    /// Embed the matched albums in each record
    pub include_album: bool,
    /// Comma separated artist ids
    pub artist_ids: Option<String>,
    /// `usenet` or `torrent`
    pub protocol: Option<String>,
    /// Comma separated quality ids
    pub quality: Option<String>,
}

impl QueueQuery {
    /// Paging and sorting requested by the query
    pub fn paging(&self) -> PagingSpec {
        let defaults = PagingSpec::default();
        PagingSpec {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            sort_key: self
                .sort_key
                .as_deref()
                .map(SortKey::parse)
                .unwrap_or_default(),
            sort_direction: self
                .sort_direction
                .as_deref()
                .map(SortDirection::parse)
                .unwrap_or_default(),
        }
    }

    /// Filter requested by the query
    ///
    /// Fails with a message naming the offending parameter.
    pub fn filter(&self) -> Result<QueueFilter, String> {
        let protocol = match self.protocol.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(p) => Some(Protocol::from_str(p)?),
        };

        Ok(QueueFilter {
            artist_ids: parse_list(self.artist_ids.as_deref(), "artistIds")?,
            protocol,
            quality_ids: parse_list(self.quality.as_deref(), "quality")?,
            include_unknown_artist_items: self.include_unknown_artist_items,
        })
    }
}

fn parse_list<T>(raw: Option<&str>, name: &str) -> Result<HashSet<T>, String>
where
    T: FromStr + Eq + Hash,
{
    let Some(raw) = raw else {
        return Ok(HashSet::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| format!("invalid value '{s}' in {name}"))
        })
        .collect()
}

/// Request body for DELETE /queue/bulk
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BulkRemoveRequest {
    /// Queue row ids to remove
    pub ids: Vec<QueueId>,
}

/// Query parameters for GET /blocklist
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct BlocklistQuery {
    /// Maximum number of entries to return (default: 50)
    pub limit: Option<i64>,
    /// Number of entries to skip (default: 0)
    pub offset: Option<i64>,
}

// ============================================================================
// Response Types
// ============================================================================

/// One queue row as returned over the wire
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueResource {
    /// Queue row id
    pub id: QueueId,
    /// `pending` or `tracked`
    pub kind: String,
    /// Release title
    pub title: String,
    /// Matched artist id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<i64>,
    /// Matched artist, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<ArtistRef>,
    /// Matched album ids
    pub album_ids: Vec<i64>,
    /// Matched albums, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub albums: Option<Vec<AlbumRef>>,
    /// Parsed quality
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    /// Transfer protocol
    pub protocol: Protocol,
    /// Indexer that published the release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer: Option<String>,
    /// Backend instance holding the download
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_client: Option<String>,
    /// Backend download id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    /// Queue status
    pub status: QueueStatus,
    /// Total size in bytes
    pub size: u64,
    /// Bytes left to transfer
    pub size_left: u64,
    /// Time left as `[d.]hh:mm:ss`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeleft: Option<String>,
    /// Estimated completion time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion_time: Option<DateTime<Utc>>,
    /// When the release was grabbed or held back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<DateTime<Utc>>,
    /// Backend error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Percentage complete
    pub progress: f64,
}

impl QueueResource {
    /// Project a queue entry, embedding artist and albums only when asked to
    pub fn from_entry(entry: &QueueEntry, include_artist: bool, include_album: bool) -> Self {
        let artist = entry.artist();
        Self {
            id: entry.id(),
            kind: entry.kind().to_string(),
            title: entry.title().to_string(),
            artist_id: artist.map(|a| a.id),
            artist: artist.filter(|_| include_artist).cloned(),
            album_ids: entry.albums().iter().map(|a| a.id).collect(),
            albums: include_album.then(|| entry.albums().to_vec()),
            quality: entry.quality().cloned(),
            protocol: entry.protocol(),
            indexer: entry.indexer().map(str::to_string),
            download_client: entry.download_client().map(str::to_string),
            download_id: entry.download_id().map(str::to_string),
            status: entry.status(),
            size: entry.size(),
            size_left: entry.size_left(),
            timeleft: entry.time_left().map(format_time_left),
            estimated_completion_time: entry.estimated_completion_time(),
            added: entry.added(),
            error_message: entry.error_message().map(str::to_string),
            progress: entry.progress(),
        }
    }
}

fn format_time_left(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let (h, m, s) = (rest / 3600, (rest % 3600) / 60, rest % 60);
    if days > 0 {
        format!("{days}.{h:02}:{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}")
    }
}

/// Response for GET /queue
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    /// Page returned
    pub page: usize,
    /// Records per page
    pub page_size: usize,
    /// Sort column
    pub sort_key: SortKey,
    /// Sort direction
    pub sort_direction: SortDirection,
    /// Number of rows matching the filter
    pub total_records: usize,
    /// Rows on this page
    pub records: Vec<QueueResource>,
}

/// Response for GET /blocklist
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BlocklistResponse {
    /// Entries, newest first
    pub items: Vec<BlocklistEntry>,
    /// Total number of entries
    pub total: i64,
    /// Limit applied
    pub limit: usize,
    /// Offset applied
    pub offset: usize,
}

/// Response for POST /backends/{name}/test
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BackendTestResponse {
    /// Backend instance name
    pub name: String,
    /// Whether no problems were found
    pub valid: bool,
    /// Problems found
    pub failures: Vec<ValidationFailure>,
}
