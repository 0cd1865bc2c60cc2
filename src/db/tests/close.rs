use super::sample_album;
use crate::db::*;
use crate::types::PendingReason;
use tempfile::NamedTempFile;

/// Verify that listing pending releases after closing the pool returns an error
/// rather than hanging or panicking.
#[tokio::test]
async fn test_list_pending_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let release = NewPendingRelease {
        remote_album: sample_album(1, &[10], "Test"),
        reason: PendingReason::Delay,
        added: Utc::now(),
        release_at: None,
    };
    db.insert_pending_release(&release).await.unwrap();

    assert_eq!(db.list_pending_releases().await.unwrap().len(), 1);

    // Close the pool (but keep the Database struct alive)
    db.pool().close().await;

    let result = db.list_pending_releases().await;
    assert!(
        result.is_err(),
        "list_pending_releases after pool close should return an error, got: {:?}",
        result
    );
}

/// Verify that writing to the blocklist after closing the pool returns an error
#[tokio::test]
async fn test_insert_blocklist_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.pool().close().await;

    let entry = crate::blocklist::NewBlocklistEntry::from_remote_album(
        &sample_album(1, &[10], "After Close"),
        None,
        crate::blocklist::PENDING_RELEASE_BLOCKLISTED,
        crate::types::BlocklistSource::PendingRelease,
        Utc::now(),
    );

    let result = db.insert_blocklist(&entry).await;
    assert!(
        result.is_err(),
        "insert_blocklist after pool close should return an error, got: {:?}",
        result
    );
}

/// Verify that grab lookups after closing the pool return an error
#[tokio::test]
async fn test_find_grab_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.pool().close().await;

    let result = db.find_grab_record("abc").await;
    assert!(result.is_err());
}
