//! Database layer for grab-queue
//!
//! Handles SQLite persistence for pending releases, the blocklist and grab history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`pending`] - Pending release storage
//! - [`blocklist`] - Append-only blocklist ledger
//! - [`grabs`] - Grab history used to correlate backend items

use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

use crate::error::DatabaseError;
use crate::types::{PendingReason, RemoteAlbum};
use crate::{Error, Result};

mod blocklist;
mod grabs;
mod migrations;
mod pending;

/// New pending release to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewPendingRelease {
    /// Correlated release
    pub remote_album: RemoteAlbum,
    /// Why the release is held back
    pub reason: PendingReason,
    /// When the release was first held back
    pub added: DateTime<Utc>,
    /// When the delay expires, if it does
    pub release_at: Option<DateTime<Utc>>,
}

/// Pending release as stored in the database
#[derive(Debug, Clone)]
pub struct StoredPendingRelease {
    /// Database row id
    pub id: i64,
    /// Correlated release
    pub remote_album: RemoteAlbum,
    /// Why the release is held back
    pub reason: PendingReason,
    /// When the release was first held back
    pub added: DateTime<Utc>,
    /// When the delay expires, if it does
    pub release_at: Option<DateTime<Utc>>,
}

/// Raw pending release row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct PendingReleaseRow {
    pub id: i64,
    pub remote_album: String,
    pub reason: String,
    pub added_at: i64,
    pub release_at: Option<i64>,
}

impl TryFrom<PendingReleaseRow> for StoredPendingRelease {
    type Error = Error;

    fn try_from(row: PendingReleaseRow) -> Result<Self> {
        let remote_album: RemoteAlbum = serde_json::from_str(&row.remote_album).map_err(|e| {
            Error::Database(DatabaseError::CorruptRow {
                table: "pending_releases",
                reason: format!("remote_album: {e}"),
            })
        })?;
        let reason = PendingReason::parse(&row.reason).ok_or_else(|| {
            Error::Database(DatabaseError::CorruptRow {
                table: "pending_releases",
                reason: format!("unknown reason '{}'", row.reason),
            })
        })?;

        Ok(Self {
            id: row.id,
            remote_album,
            reason,
            added: timestamp_to_datetime("pending_releases", row.added_at)?,
            release_at: row
                .release_at
                .map(|ts| timestamp_to_datetime("pending_releases", ts))
                .transpose()?,
        })
    }
}

/// Raw blocklist row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct BlocklistRow {
    pub id: i64,
    pub artist_id: i64,
    pub album_ids: String,
    pub source_title: String,
    pub quality_id: i32,
    pub quality_name: String,
    pub protocol: String,
    pub indexer: Option<String>,
    pub download_id: Option<String>,
    pub message: String,
    pub source: String,
    pub created_at: i64,
}

/// Raw grab history row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct GrabRow {
    pub download_id: String,
    pub backend: String,
    pub remote_album: String,
    pub grabbed_at: i64,
}

/// Database handle for grab-queue
pub struct Database {
    pool: SqlitePool,
}

/// Convert a stored unix timestamp, reporting out-of-range values as corrupt rows
pub(crate) fn timestamp_to_datetime(table: &'static str, secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        Error::Database(DatabaseError::CorruptRow {
            table,
            reason: format!("timestamp {secs} out of range"),
        })
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
