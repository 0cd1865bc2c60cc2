use super::*;
use crate::test_helpers::{MockCall, MockOutcome, backend_item, remote_album};
use crate::types::PendingReason;
use serde_json::json;

async fn track(manager: &QueueManager, backend: &MockBackend, download_id: &str, artist_id: i64) {
    manager
        .record_grab(
            "mock",
            download_id,
            remote_album(artist_id, &[artist_id * 10], &format!("Release {download_id}")),
        )
        .await
        .unwrap();
    let mut items: Vec<_> = manager
        .tracked_downloads()
        .iter()
        .map(|d| d.item.clone())
        .collect();
    items.push(backend_item("mock", download_id, &format!("Release {download_id}")));
    backend.set_items(items);
    manager.poll_backend("mock").await.unwrap();
}

#[tokio::test]
async fn test_get_queue_returns_page_envelope() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    track(&manager, &backend, "abc123", 1).await;
    manager
        .add_pending_release(remote_album(2, &[20], "Pending"), PendingReason::Delay, None)
        .await
        .unwrap();

    let response = send(&app, "GET", "/queue", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["pageSize"], 10);
    assert_eq!(body["sortKey"], "timeleft");
    assert_eq!(body["sortDirection"], "ascending");
    assert_eq!(body["totalRecords"], 2);

    let records = body["records"].as_array().unwrap();
    // Known time left sorts before the pending row with no release time
    assert_eq!(records[0]["kind"], "tracked");
    assert_eq!(records[0]["downloadId"], "abc123");
    assert_eq!(records[0]["timeleft"], "00:01:00");
    assert_eq!(records[1]["kind"], "pending");
    assert!(records[1].get("timeleft").is_none());
}

#[tokio::test]
async fn test_get_queue_embeds_artist_and_albums_only_when_requested() {
    let (app, manager, _backend, _temp_dir) = test_router().await;
    manager
        .add_pending_release(remote_album(2, &[20, 21], "Pending"), PendingReason::Delay, None)
        .await
        .unwrap();

    let plain = json_body(send(&app, "GET", "/queue", None).await).await;
    let record = &plain["records"][0];
    assert_eq!(record["artistId"], 2);
    assert!(record.get("artist").is_none());
    assert!(record.get("albums").is_none());

    let detailed = json_body(
        send(&app, "GET", "/queue?includeArtist=true&includeAlbum=true", None).await,
    )
    .await;
    let record = &detailed["records"][0];
    assert_eq!(record["artist"]["name"], "Artist 2");
    assert_eq!(record["albums"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_queue_filters_by_artist_ids() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    track(&manager, &backend, "A", 1).await;
    track(&manager, &backend, "B", 2).await;
    track(&manager, &backend, "C", 3).await;

    let body = json_body(send(&app, "GET", "/queue?artistIds=1,3", None).await).await;
    assert_eq!(body["totalRecords"], 2);

    let artists: Vec<i64> = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["artistId"].as_i64().unwrap())
        .collect();
    assert!(artists.contains(&1));
    assert!(artists.contains(&3));
}

#[tokio::test]
async fn test_get_queue_rejects_bad_artist_ids() {
    let (app, _manager, _backend, _temp_dir) = test_router().await;

    let response = send(&app, "GET", "/queue?artistIds=1,x", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_get_queue_past_last_page_returns_last_page() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    for (i, id) in ["A", "B", "C", "D", "E"].iter().enumerate() {
        track(&manager, &backend, id, i as i64 + 1).await;
    }

    let body = json_body(send(&app, "GET", "/queue?page=5&pageSize=2", None).await).await;
    assert_eq!(body["page"], 3);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_pending_with_blocklist() {
    let (app, manager, _backend, _temp_dir) = test_router().await;
    let release = manager
        .add_pending_release(remote_album(2, &[20], "Held Back"), PendingReason::Delay, None)
        .await
        .unwrap();

    let response = send(
        &app,
        "DELETE",
        &format!("/queue/{}?blocklist=true", release.queue_id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({}));

    assert!(manager.pending_releases().is_empty());
    let (entries, total) = manager.list_blocklist(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].source_title, "Held Back");
}

#[tokio::test]
async fn test_delete_tracked_removes_from_client_by_default() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    track(&manager, &backend, "abc123", 1).await;
    let id = manager.tracked_downloads()[0].queue_id;

    let response = send(&app, "DELETE", &format!("/queue/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        backend.remove_calls(),
        vec![MockCall::Remove {
            download_id: "abc123".to_string(),
            delete_data: true,
        }]
    );

    let body = json_body(send(&app, "GET", "/queue", None).await).await;
    assert_eq!(body["totalRecords"], 0);
}

#[tokio::test]
async fn test_delete_unknown_id_returns_404() {
    let (app, _manager, _backend, _temp_dir) = test_router().await;

    let response = send(&app, "DELETE", "/queue/999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["details"]["queue_id"], 999);
}

#[tokio::test]
async fn test_delete_not_supported_returns_501() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    track(&manager, &backend, "abc123", 1).await;
    backend.set_mark_imported_outcome(MockOutcome::NotSupported);
    let id = manager.tracked_downloads()[0].queue_id;

    let response = send(
        &app,
        "DELETE",
        &format!("/queue/{id}?removeFromClient=false&changeCategory=true"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(manager.tracked_downloads().len(), 1);
}

#[tokio::test]
async fn test_bulk_delete_always_returns_empty_object() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    track(&manager, &backend, "A", 1).await;
    track(&manager, &backend, "B", 2).await;
    backend.set_remove_outcome(MockOutcome::Fail);
    let ids: Vec<i64> = manager
        .tracked_downloads()
        .iter()
        .map(|d| d.queue_id.get())
        .collect();

    let mut request_ids = ids.clone();
    request_ids.push(999);
    let response = send(
        &app,
        "DELETE",
        "/queue/bulk",
        Some(json!({ "ids": request_ids })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({}));
    // Failed removals stay tracked
    assert_eq!(manager.tracked_downloads().len(), 2);
    assert_eq!(backend.remove_calls().len(), 2);
}

#[tokio::test]
async fn test_bulk_delete_dedupes_repeated_ids() {
    let (app, manager, backend, _temp_dir) = test_router().await;
    track(&manager, &backend, "abc123", 1).await;
    let id = manager.tracked_downloads()[0].queue_id.get();

    let response = send(
        &app,
        "DELETE",
        "/queue/bulk",
        Some(json!({ "ids": [id, id, id] })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.remove_calls().len(), 1);
    assert!(manager.tracked_downloads().is_empty());
}

#[tokio::test]
async fn test_get_blocklist_paginates() {
    let (app, manager, _backend, _temp_dir) = test_router().await;
    for n in 0..3 {
        let release = manager
            .add_pending_release(
                remote_album(n + 1, &[n + 10], &format!("Blocked {n}")),
                PendingReason::Delay,
                None,
            )
            .await
            .unwrap();
        send(
            &app,
            "DELETE",
            &format!("/queue/{}?blocklist=true", release.queue_id),
            None,
        )
        .await;
    }

    let body = json_body(send(&app, "GET", "/blocklist?limit=2&offset=0", None).await).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}
