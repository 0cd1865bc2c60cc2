//! Pending release storage.

use crate::{Error, Result};

use super::{Database, NewPendingRelease, PendingReleaseRow, StoredPendingRelease};

impl Database {
    /// Insert a pending release, returning its row id
    pub async fn insert_pending_release(&self, release: &NewPendingRelease) -> Result<i64> {
        let remote_album = serde_json::to_string(&release.remote_album)?;
        let album_ids = release
            .remote_album
            .album_ids()
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let result = sqlx::query(
            r#"
            INSERT INTO pending_releases (
                artist_id, album_ids, title, remote_album, reason, added_at, release_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(release.remote_album.artist.id)
        .bind(album_ids)
        .bind(&release.remote_album.release.title)
        .bind(remote_album)
        .bind(release.reason.as_str())
        .bind(release.added.timestamp())
        .bind(release.release_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// List every stored pending release, oldest first
    pub async fn list_pending_releases(&self) -> Result<Vec<StoredPendingRelease>> {
        let rows = sqlx::query_as::<_, PendingReleaseRow>(
            r#"
            SELECT id, remote_album, reason, added_at, release_at
            FROM pending_releases
            ORDER BY added_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        let mut releases = Vec::with_capacity(rows.len());
        for row in rows {
            match StoredPendingRelease::try_from(row) {
                Ok(release) => releases.push(release),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable pending release"),
            }
        }
        Ok(releases)
    }

    /// Delete pending releases by row id, returning the number of rows removed
    pub async fn delete_pending_releases(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;
        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM pending_releases WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Sqlx)?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(Error::Sqlx)?;

        Ok(removed)
    }
}
