//! Grab history used to correlate backend items with library entities.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::tracked::{GrabHistory, GrabRecord};
use crate::{Error, Result};

use super::{Database, GrabRow, timestamp_to_datetime};

impl Database {
    /// Record that a release was handed to a backend
    ///
    /// Re-grabbing under the same download id replaces the earlier record.
    pub async fn record_grab(&self, grab: &GrabRecord) -> Result<()> {
        let remote_album = serde_json::to_string(&grab.remote_album)?;

        sqlx::query(
            r#"
            INSERT INTO grab_history (download_id, backend, remote_album, grabbed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(download_id) DO UPDATE SET
                backend = excluded.backend,
                remote_album = excluded.remote_album,
                grabbed_at = excluded.grabbed_at
            "#,
        )
        .bind(&grab.download_id)
        .bind(&grab.backend)
        .bind(remote_album)
        .bind(grab.grabbed_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(())
    }

    /// Look up the grab for a backend download id (case-insensitive)
    pub async fn find_grab_record(&self, download_id: &str) -> Result<Option<GrabRecord>> {
        let row = sqlx::query_as::<_, GrabRow>(
            r#"
            SELECT download_id, backend, remote_album, grabbed_at
            FROM grab_history
            WHERE download_id = ?
            "#,
        )
        .bind(download_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        row.map(GrabRecord::try_from).transpose()
    }
}

#[async_trait]
impl GrabHistory for Database {
    async fn find_grab(&self, download_id: &str) -> Result<Option<GrabRecord>> {
        self.find_grab_record(download_id).await
    }
}

impl TryFrom<GrabRow> for GrabRecord {
    type Error = Error;

    fn try_from(row: GrabRow) -> Result<Self> {
        let remote_album = serde_json::from_str(&row.remote_album).map_err(|e| {
            Error::Database(DatabaseError::CorruptRow {
                table: "grab_history",
                reason: format!("remote_album: {e}"),
            })
        })?;

        Ok(Self {
            download_id: row.download_id,
            backend: row.backend,
            remote_album,
            grabbed_at: timestamp_to_datetime("grab_history", row.grabbed_at)?,
        })
    }
}
