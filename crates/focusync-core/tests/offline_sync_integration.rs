//! Integration tests for the file-backed sync flow against a mock REST remote.

use chrono::{TimeZone, Utc};
use focusync_core::storage::{JsonFileStore, FAILED_FILE, HISTORY_FILE, QUEUE_FILE};
use focusync_core::sync::{
    ConnectivityMonitor, DeadLetterLog, EntityRecord, EntityType, HttpGateway, JsonFileLocalStore,
    LocalStore, OperationQueue, OperationType, PathUpdate, SyncCoordinator, SyncHistory,
    SyncOutcome, SyncSettings, SyncState,
};
use mockito::Matcher;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn coordinator(
    dir: &Path,
    server: &mockito::Server,
    monitor: ConnectivityMonitor,
) -> (Arc<SyncCoordinator>, Arc<JsonFileLocalStore>) {
    let gateway = HttpGateway::new(
        &format!("{}/rest/v1", server.url()),
        Some("anon-key".into()),
        Duration::from_secs(5),
    )
    .unwrap();
    let local = Arc::new(JsonFileLocalStore::open(dir.join("local_records.json")).unwrap());
    let queue = OperationQueue::open(JsonFileStore::new(dir.join(QUEUE_FILE))).unwrap();
    let dead_letters = DeadLetterLog::open(JsonFileStore::new(dir.join(FAILED_FILE))).unwrap();
    let history = SyncHistory::open(JsonFileStore::new(dir.join(HISTORY_FILE))).unwrap();
    let settings = SyncSettings {
        auto_retry: false,
        ..SyncSettings::default()
    };
    let coordinator = SyncCoordinator::new(
        Arc::new(gateway),
        local.clone(),
        queue,
        dead_letters,
        history,
        Arc::new(monitor),
        settings,
    );
    (coordinator, local)
}

async fn mock_empty_tables(server: &mut mockito::Server, except: EntityType) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    for entity_type in EntityType::ALL {
        if entity_type == except {
            continue;
        }
        let mock = server
            .mock("GET", format!("/rest/v1/{}", entity_type.table_name()).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        mocks.push(mock);
    }
    mocks
}

#[tokio::test]
async fn test_full_sync_pushes_then_merges_into_local_file() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;

    let push = server
        .mock("POST", "/rest/v1/tasks")
        .match_body(Matcher::PartialJson(serde_json::json!([{"id": "local-task"}])))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let pull = server
        .mock("GET", "/rest/v1/tasks")
        .match_query(Matcher::UrlEncoded("select".into(), "*".into()))
        .with_status(200)
        .with_body(
            serde_json::json!([
                {"id": "remote-task", "updated_at": "2025-03-01T10:00:00Z", "title": "From the web"}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    let _others = mock_empty_tables(&mut server, EntityType::Task).await;

    let (coordinator, _) = coordinator(dir.path(), &server, ConnectivityMonitor::assume_online());
    let record = EntityRecord::new(
        EntityType::Task,
        "local-task",
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
    )
    .with_field("title", serde_json::json!("Offline edit"));
    coordinator
        .record_mutation(OperationType::Create, &record)
        .await
        .unwrap();

    let outcome = coordinator.perform_full_sync().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Completed { synced: 2, failed: 0 });
    assert_eq!(coordinator.state(), SyncState::Success { synced_count: 2 });
    push.assert_async().await;
    pull.assert_async().await;

    let queue = OperationQueue::open(JsonFileStore::new(dir.path().join(QUEUE_FILE))).unwrap();
    assert!(queue.is_empty());

    let reopened = JsonFileLocalStore::open(dir.path().join("local_records.json")).unwrap();
    let merged = reopened.get(EntityType::Task, "remote-task").unwrap().unwrap();
    assert_eq!(merged.fields["title"], "From the web");
}

#[tokio::test]
async fn test_queue_survives_restart_and_counts_attempts() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;

    {
        let (offline, _) = coordinator(
            dir.path(),
            &server,
            ConnectivityMonitor::with_initial(PathUpdate::offline()),
        );
        offline
            .enqueue(focusync_core::SyncOperation::delete(EntityType::Goal, "g-1"))
            .await
            .unwrap();
        assert_eq!(
            offline.process_pending_queue().await.unwrap(),
            SyncOutcome::Offline
        );
    }

    let failing = server
        .mock("DELETE", "/rest/v1/goals")
        .match_query(Matcher::UrlEncoded("id".into(), "eq.g-1".into()))
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(1)
        .create_async()
        .await;

    let (online, _) = coordinator(dir.path(), &server, ConnectivityMonitor::assume_online());
    assert_eq!(online.pending_count().await, 1);
    let outcome = online.process_pending_queue().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Completed { synced: 0, failed: 1 });
    failing.assert_async().await;

    let queue = OperationQueue::open(JsonFileStore::new(dir.path().join(QUEUE_FILE))).unwrap();
    let op = queue.dequeue_next().unwrap();
    assert_eq!(op.attempts, 1);
    assert!(op.last_error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_forbidden_operation_is_dead_lettered() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    let _forbidden = server
        .mock("DELETE", "/rest/v1/users")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let (coordinator, _) = coordinator(dir.path(), &server, ConnectivityMonitor::assume_online());
    coordinator
        .enqueue(focusync_core::SyncOperation::delete(EntityType::User, "u-1"))
        .await
        .unwrap();
    coordinator.process_pending_queue().await.unwrap();

    assert_eq!(coordinator.pending_count().await, 0);
    let log = DeadLetterLog::open(JsonFileStore::new(dir.path().join(FAILED_FILE))).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].operation.entity_id, "u-1");
}

#[tokio::test]
async fn test_last_successful_sync_survives_restart() {
    let dir = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    let _delete = server
        .mock("DELETE", "/rest/v1/streaks")
        .match_query(Matcher::Any)
        .with_status(204)
        .create_async()
        .await;

    let (fresh, _) = coordinator(dir.path(), &server, ConnectivityMonitor::assume_online());
    assert!(fresh.last_successful_sync().is_none());
    assert!(fresh.needs_sync().await);
    fresh
        .enqueue(focusync_core::SyncOperation::delete(EntityType::Streak, "s-1"))
        .await
        .unwrap();
    fresh.process_pending_queue().await.unwrap();
    let synced_at = fresh.last_successful_sync().unwrap();
    drop(fresh);

    let (restarted, _) = coordinator(dir.path(), &server, ConnectivityMonitor::assume_online());
    assert_eq!(restarted.last_successful_sync(), Some(synced_at));
    assert!(!restarted.needs_sync().await);
}
