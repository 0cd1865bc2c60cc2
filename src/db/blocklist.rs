//! Blocklist ledger storage.

use async_trait::async_trait;

use crate::blocklist::{BlocklistEntry, BlocklistLedger, NewBlocklistEntry};
use crate::error::DatabaseError;
use crate::types::{BlocklistSource, Quality};
use crate::{Error, Result};

use super::{BlocklistRow, Database, timestamp_to_datetime};

impl Database {
    /// Append an entry to the blocklist, returning its id
    pub async fn insert_blocklist(&self, entry: &NewBlocklistEntry) -> Result<i64> {
        let album_ids = serde_json::to_string(&entry.album_ids)?;

        let result = sqlx::query(
            r#"
            INSERT INTO blocklist (
                artist_id, album_ids, source_title, quality_id, quality_name, protocol,
                indexer, download_id, message, source, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.artist_id)
        .bind(album_ids)
        .bind(&entry.source_title)
        .bind(entry.quality.id)
        .bind(&entry.quality.name)
        .bind(entry.protocol.to_string())
        .bind(&entry.indexer)
        .bind(&entry.download_id)
        .bind(&entry.message)
        .bind(entry.source.as_str())
        .bind(entry.date.timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// List blocklist entries, newest first
    pub async fn list_blocklist(&self, limit: usize, offset: usize) -> Result<Vec<BlocklistEntry>> {
        let rows = sqlx::query_as::<_, BlocklistRow>(
            r#"
            SELECT id, artist_id, album_ids, source_title, quality_id, quality_name, protocol,
                   indexer, download_id, message, source, created_at
            FROM blocklist
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        rows.into_iter().map(BlocklistEntry::try_from).collect()
    }

    /// Count blocklist entries
    pub async fn count_blocklist(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blocklist")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Sqlx)
    }

    /// Whether a release title has been blocklisted
    pub async fn is_blocklisted(&self, source_title: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM blocklist WHERE source_title = ? COLLATE NOCASE",
        )
        .bind(source_title)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(count > 0)
    }
}

#[async_trait]
impl BlocklistLedger for Database {
    async fn block(&self, entry: NewBlocklistEntry) -> Result<i64> {
        let id = self.insert_blocklist(&entry).await?;
        tracing::info!(
            blocklist_id = id,
            source_title = %entry.source_title,
            message = %entry.message,
            "release blocklisted"
        );
        Ok(id)
    }
}

impl TryFrom<BlocklistRow> for BlocklistEntry {
    type Error = Error;

    fn try_from(row: BlocklistRow) -> Result<Self> {
        let corrupt = |reason: String| {
            Error::Database(DatabaseError::CorruptRow {
                table: "blocklist",
                reason,
            })
        };

        let album_ids: Vec<i64> =
            serde_json::from_str(&row.album_ids).map_err(|e| corrupt(format!("album_ids: {e}")))?;
        let protocol = row.protocol.parse().map_err(corrupt)?;
        let source = BlocklistSource::parse(&row.source)
            .ok_or_else(|| corrupt(format!("unknown source '{}'", row.source)))?;

        Ok(Self {
            id: row.id,
            artist_id: row.artist_id,
            album_ids,
            source_title: row.source_title,
            quality: Quality {
                id: row.quality_id,
                name: row.quality_name,
            },
            protocol,
            indexer: row.indexer,
            download_id: row.download_id,
            message: row.message,
            source,
            date: timestamp_to_datetime("blocklist", row.created_at)?,
        })
    }
}
