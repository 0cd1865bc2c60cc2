use crate::actions::RemovalOptions;
use crate::backend::BackendRegistry;
use crate::manager::QueueManager;
use crate::manager::test_helpers::create_test_manager;
use crate::queue::{PagingSpec, QueueEntry, QueueFilter, SortKey};
use crate::test_helpers::{MockCall, backend_item, remote_album};
use crate::types::{BlocklistSource, PendingReason, QueueId};
use crate::Error;

#[tokio::test]
async fn queue_merges_pending_and_correlated_downloads() {
    let (manager, backend, _temp_dir) = create_test_manager().await;
    manager
        .record_grab("mock", "ABC123", remote_album(1, &[10], "Artist 1 - Album 10"))
        .await
        .unwrap();
    backend.set_items(vec![
        backend_item("mock", "ABC123", "Artist 1 - Album 10"),
        backend_item("mock", "STRANGER", "Not ours"),
    ]);
    manager.poll_backend("mock").await.unwrap();
    manager
        .add_pending_release(remote_album(2, &[20], "Artist 2 - Album 20"), PendingReason::Delay, None)
        .await
        .unwrap();

    let page = manager.get_queue(&PagingSpec::default(), &QueueFilter::default());
    assert_eq!(page.total_records, 2);
    let kinds: Vec<&str> = page.records.iter().map(QueueEntry::kind).collect();
    assert!(kinds.contains(&"pending"));
    assert!(kinds.contains(&"tracked"));

    let with_unknown = manager.get_queue(
        &PagingSpec::default(),
        &QueueFilter {
            include_unknown_artist_items: true,
            ..Default::default()
        },
    );
    assert_eq!(with_unknown.total_records, 3);
}

#[tokio::test]
async fn pending_and_tracked_ids_never_collide() {
    let (manager, backend, _temp_dir) = create_test_manager().await;
    let release = manager
        .add_pending_release(remote_album(2, &[20], "P"), PendingReason::Delay, None)
        .await
        .unwrap();
    backend.set_items(vec![backend_item("mock", "T", "t")]);
    manager.poll_backend("mock").await.unwrap();

    let tracked = manager.tracked_downloads();
    assert_eq!(tracked.len(), 1);
    assert_ne!(tracked[0].queue_id, release.queue_id);
}

#[tokio::test]
async fn marking_failed_writes_to_the_blocklist() {
    let (manager, backend, _temp_dir) = create_test_manager().await;
    manager
        .record_grab("mock", "BAD", remote_album(1, &[10], "Artist 1 - Bad Rip"))
        .await
        .unwrap();
    backend.set_items(vec![backend_item("mock", "BAD", "Artist 1 - Bad Rip")]);
    manager.poll_backend("mock").await.unwrap();
    let id = manager.tracked_downloads()[0].queue_id;

    manager
        .remove_queue_item(
            id,
            RemovalOptions {
                blocklist: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        backend.remove_calls(),
        vec![MockCall::Remove {
            download_id: "BAD".into(),
            delete_data: true,
        }]
    );
    let (entries, total) = manager.list_blocklist(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].source_title, "Artist 1 - Bad Rip");
    assert_eq!(entries[0].source, BlocklistSource::FailedDownload);
    assert!(manager.db.is_blocklisted("artist 1 - bad rip").await.unwrap());
    assert!(manager.tracked_downloads().is_empty());
}

#[tokio::test]
async fn single_removal_of_unknown_id_is_not_found() {
    let (manager, _backend, _temp_dir) = create_test_manager().await;
    let err = manager
        .remove_queue_item(QueueId(1), RemovalOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QueueItemNotFound { .. }));

    let report = manager
        .remove_queue_items(&[QueueId(1), QueueId(2)], RemovalOptions::default())
        .await;
    assert!(report.removed.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn pending_releases_survive_restart() {
    let (manager, _backend, temp_dir) = create_test_manager().await;
    manager
        .add_pending_release(
            remote_album(3, &[30], "Artist 3 - Album 30"),
            PendingReason::DownloadClientUnavailable,
            None,
        )
        .await
        .unwrap();
    let config = (*manager.get_config()).clone();
    drop(manager);

    let restarted = QueueManager::with_backends(config, BackendRegistry::default())
        .await
        .unwrap();
    let pending = restarted.pending_releases();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].remote_album.release.title, "Artist 3 - Album 30");
    assert_eq!(pending[0].reason, PendingReason::DownloadClientUnavailable);
    drop(temp_dir);
}

#[tokio::test]
async fn quality_sort_uses_configured_ranking() {
    let (manager, _backend, _temp_dir) = create_test_manager().await;
    let mut mp3 = remote_album(1, &[10], "MP3");
    mp3.quality.id = 1;
    manager
        .add_pending_release(remote_album(1, &[11], "FLAC"), PendingReason::Delay, None)
        .await
        .unwrap();
    manager
        .add_pending_release(mp3, PendingReason::Delay, None)
        .await
        .unwrap();

    let page = manager.get_queue(
        &PagingSpec {
            sort_key: SortKey::Quality,
            ..Default::default()
        },
        &QueueFilter::default(),
    );
    let titles: Vec<&str> = page.records.iter().map(QueueEntry::title).collect();
    assert_eq!(titles, vec!["MP3", "FLAC"]);
}
