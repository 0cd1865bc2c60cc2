//! Blocklist ledger contract
//!
//! Blocklisted releases are never grabbed again. Entries are append-only; the queue
//! only ever writes them, the acquisition side reads them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::Result;
use crate::types::{BlocklistSource, Protocol, Quality, RemoteAlbum};

/// Message recorded when a pending release is blocklisted by the user
pub const PENDING_RELEASE_BLOCKLISTED: &str = "Pending release manually blocklisted";

/// Message recorded when a download is marked as failed by the user
pub const MANUALLY_MARKED_AS_FAILED: &str = "Manually marked as failed";

/// Blocklist entry to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlocklistEntry {
    /// Artist the release was matched to
    pub artist_id: i64,
    /// Albums the release was matched to
    pub album_ids: Vec<i64>,
    /// Release title as published
    pub source_title: String,
    /// Parsed quality
    pub quality: Quality,
    /// Transfer protocol
    pub protocol: Protocol,
    /// Indexer that published the release
    pub indexer: Option<String>,
    /// Backend download id, when the release had been grabbed
    pub download_id: Option<String>,
    /// Why it was blocklisted
    pub message: String,
    /// What kind of queue item it came from
    pub source: BlocklistSource,
    /// When it was blocklisted
    pub date: DateTime<Utc>,
}

impl NewBlocklistEntry {
    /// Build an entry from a correlated release
    pub fn from_remote_album(
        remote_album: &RemoteAlbum,
        download_id: Option<String>,
        message: impl Into<String>,
        source: BlocklistSource,
        date: DateTime<Utc>,
    ) -> Self {
        let indexer = Some(remote_album.release.indexer.clone()).filter(|i| !i.is_empty());
        Self {
            artist_id: remote_album.artist.id,
            album_ids: remote_album.album_ids(),
            source_title: remote_album.release.title.clone(),
            quality: remote_album.quality.clone(),
            protocol: remote_album.release.protocol,
            indexer,
            download_id,
            message: message.into(),
            source,
            date,
        }
    }
}

/// Recorded blocklist entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistEntry {
    /// Row id
    pub id: i64,
    /// Artist the release was matched to
    pub artist_id: i64,
    /// Albums the release was matched to
    pub album_ids: Vec<i64>,
    /// Release title as published
    pub source_title: String,
    /// Parsed quality
    pub quality: Quality,
    /// Transfer protocol
    pub protocol: Protocol,
    /// Indexer that published the release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer: Option<String>,
    /// Backend download id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    /// Why it was blocklisted
    pub message: String,
    /// What kind of queue item it came from
    pub source: BlocklistSource,
    /// When it was blocklisted
    pub date: DateTime<Utc>,
}

/// Sink for blocklist entries
#[async_trait]
pub trait BlocklistLedger: Send + Sync {
    /// Record an entry, returning its id
    async fn block(&self, entry: NewBlocklistEntry) -> Result<i64>;
}
