use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::support::ScriptedBackend;
use super::support::coordinator_over;

#[tokio::test(start_paused = true)]
async fn reads_inside_the_window_share_one_snapshot() {
    let backend = ScriptedBackend::new();
    let coordinator = coordinator_over(Arc::clone(&backend));

    let first = coordinator.read_all().await.unwrap();
    tokio::time::advance(Duration::from_millis(4_000)).await;
    let second = coordinator.read_all().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.gets(), 1);
}

#[tokio::test(start_paused = true)]
async fn snapshot_is_refreshed_after_the_window() {
    let backend = ScriptedBackend::new();
    let coordinator = coordinator_over(Arc::clone(&backend));

    let first = coordinator.read_all().await.unwrap();
    tokio::time::advance(Duration::from_secs(5)).await;
    let second = coordinator.read_all().await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(backend.gets(), 2);
}

#[tokio::test(start_paused = true)]
async fn commit_invalidates_the_snapshot() {
    let backend = ScriptedBackend::new();
    let coordinator = coordinator_over(Arc::clone(&backend));

    assert!(coordinator.read_all().await.unwrap().is_empty());
    assert!(
        coordinator
            .submit(json!({ "contract_id": "VT-1" }))
            .await
            .is_committed()
    );

    let after = coordinator.read_all().await.unwrap();
    assert!(after.contains_key("VT-1"));
}

#[tokio::test(start_paused = true)]
async fn maintenance_sweeps_a_stale_snapshot() {
    let backend = ScriptedBackend::new();
    let coordinator = coordinator_over(Arc::clone(&backend));
    coordinator.read_all().await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    let report = coordinator.health_check().await.unwrap();
    assert!(report.cache_swept);
    assert_eq!(report.record_count, 0);

    let maintenance = coordinator.spawn_maintenance();
    let reads_before = backend.gets();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(backend.gets(), reads_before + 1);

    drop(coordinator);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(maintenance.is_finished());
}
