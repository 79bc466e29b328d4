use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tender_aggregator::AggregatorConfig;
use tender_aggregator::Coordinator;
use tender_aggregator::MemoryBackend;
use tender_protocol::FailureReason;
use tender_protocol::OutboundMessage;
use tender_protocol::SubmitOutcome;

use super::support::BrokenObserver;
use super::support::RecordingObserver;
use super::support::ScriptedBackend;
use super::support::coordinator_over;
use super::support::wait_in_flight;

#[tokio::test]
async fn second_submit_for_in_flight_key_is_pending() {
    let backend = ScriptedBackend::gated();
    let coordinator = coordinator_over(Arc::clone(&backend));

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .submit(json!({ "contract_id": "VT-1", "title": "first" }))
                .await
        }
    });
    wait_in_flight(&coordinator, "VT-1").await;

    let second = coordinator
        .submit(json!({ "contract_id": " VT-1 ", "title": "second" }))
        .await;
    assert_eq!(
        second,
        SubmitOutcome::Pending {
            contract_id: "VT-1".to_string()
        }
    );

    backend.release_writes(1);
    let first = first.await.unwrap();
    assert!(first.is_committed());
    assert_eq!(backend.sets(), 1);
    assert!(!coordinator.is_in_flight("VT-1"));

    let stored = coordinator.read_all().await.unwrap();
    assert_eq!(stored["VT-1"].title.as_deref(), Some("first"));

    backend.release_writes(1);
    let third = coordinator
        .submit(json!({ "contract_id": "VT-1", "title": "third" }))
        .await;
    assert!(third.is_committed());
}

#[tokio::test]
async fn commits_apply_in_acceptance_order() {
    let backend = ScriptedBackend::gated();
    let coordinator = coordinator_over(Arc::clone(&backend));

    let mut handles = Vec::new();
    for key in ["VT-C", "VT-B", "VT-A"] {
        let task_coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            task_coordinator.submit(json!({ "contract_id": key })).await
        }));
        wait_in_flight(&coordinator, key).await;
    }

    backend.release_writes(3);
    for handle in handles {
        assert!(handle.await.unwrap().is_committed());
    }

    assert_eq!(
        backend.written_keys(),
        vec![
            vec!["VT-C".to_string()],
            vec!["VT-B".to_string(), "VT-C".to_string()],
            vec!["VT-A".to_string(), "VT-B".to_string(), "VT-C".to_string()],
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_keys_are_all_kept() {
    let coordinator = Coordinator::builder(AggregatorConfig::default(), Arc::new(MemoryBackend::new()))
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..25 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .submit(json!({ "contract_id": format!("VT-{n}"), "categories": [format!("cat-{n}")] }))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_committed());
    }

    let stored = coordinator.read_all().await.unwrap();
    assert_eq!(stored.len(), 25);
}

#[tokio::test]
async fn repeated_observations_accumulate() {
    let backend = ScriptedBackend::new();
    let coordinator = coordinator_over(backend);

    let observations = [
        json!({
            "contract_id": "VT-9",
            "title": "Cleaning",
            "source_page": "search",
            "categories": ["Facilities"],
        }),
        json!({
            "contract_id": "VT-9",
            "tender": true,
            "categories": ["Facilities", "Cleaning"],
            "suppliers": [{ "supplier_name": "Shine Co", "abn": "11" }],
        }),
        json!({
            "contract_id": "VT-9",
            "contract": true,
            "contract_value": 125000,
            "suppliers": [
                { "supplier_name": "Shine Co", "abn": "22" },
                { "supplier_name": "Mop Bros" },
            ],
        }),
    ];

    let mut previous_stamp = None;
    for raw in observations {
        let outcome = coordinator.submit(raw).await;
        let record = outcome.record().unwrap();
        assert!(record.last_processed >= previous_stamp);
        previous_stamp = record.last_processed;
    }

    let stored = coordinator.read_all().await.unwrap();
    let record = &stored["VT-9"];
    assert_eq!(record.title.as_deref(), Some("Cleaning"));
    assert_eq!(record.contract_value.as_deref(), Some("125000"));
    assert_eq!(record.provenance.len(), 3);
    assert_eq!(
        record.categories,
        Some(vec!["Facilities".to_string(), "Cleaning".to_string()])
    );
    let suppliers = record.suppliers.as_ref().unwrap();
    assert_eq!(suppliers.len(), 2);
    assert_eq!(suppliers[0].abn.as_deref(), Some("11"));
    assert_eq!(suppliers[1].supplier_name, "Mop Bros");
}

#[tokio::test(start_paused = true)]
async fn write_failure_clears_the_marker() {
    let backend = ScriptedBackend::new();
    let coordinator = coordinator_over(Arc::clone(&backend));
    backend.fail_next_sets(u32::MAX);

    let outcome = coordinator.submit(json!({ "contract_id": "VT-1" })).await;

    assert_eq!(outcome.reason(), Some(FailureReason::StorageWriteFailed));
    assert_eq!(backend.sets(), 5);
    assert!(!coordinator.is_in_flight("VT-1"));

    backend.fail_next_sets(0);
    assert!(coordinator.submit(json!({ "contract_id": "VT-1" })).await.is_committed());
}

#[tokio::test]
async fn lost_write_is_a_verification_failure() {
    let backend = ScriptedBackend::new();
    backend
        .seed("tenderData", json!({ "VT-0": { "contract_id": "VT-0" } }))
        .await;
    backend.drop_writes();
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::builder(AggregatorConfig::default(), backend)
        .observer(observer.clone())
        .build()
        .unwrap();

    let outcome = coordinator.submit(json!({ "contract_id": "VT-1" })).await;
    match outcome {
        SubmitOutcome::Failed {
            contract_id,
            reason,
            verification: Some(report),
            ..
        } => {
            assert_eq!(contract_id, "VT-1");
            assert_eq!(reason, FailureReason::VerificationFailed);
            assert!(!report.found);
            assert_eq!(report.total_count, 1);
            assert_eq!(report.available_contracts, vec!["VT-0".to_string()]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(observer.messages().is_empty());
    assert!(!coordinator.is_in_flight("VT-1"));
}

#[tokio::test]
async fn observers_hear_commits_and_failures_are_swallowed() {
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::builder(AggregatorConfig::default(), ScriptedBackend::new())
        .observer(Arc::new(BrokenObserver))
        .observer(observer.clone())
        .build()
        .unwrap();

    let outcome = coordinator
        .submit(json!({ "contract_id": "VT-5", "status": "Open" }))
        .await;
    assert!(outcome.is_committed());

    let messages = observer.messages();
    assert_eq!(messages.len(), 1);
    let OutboundMessage::DataUpdated { contract_id, data } = &messages[0];
    assert_eq!(contract_id, "VT-5");
    assert_eq!(Some(data), outcome.record());
}

#[tokio::test]
async fn rejected_submissions_do_not_notify() {
    let observer = Arc::new(RecordingObserver::default());
    let backend = ScriptedBackend::new();
    let coordinator = Coordinator::builder(AggregatorConfig::default(), backend.clone())
        .observer(observer.clone())
        .build()
        .unwrap();

    let outcome = coordinator.submit(json!({ "contract_id": "" })).await;
    assert_eq!(outcome.reason(), Some(FailureReason::EmptyContractId));
    assert!(observer.messages().is_empty());
    assert_eq!(backend.gets(), 0);
}
