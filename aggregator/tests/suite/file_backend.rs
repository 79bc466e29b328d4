use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tender_aggregator::AggregatorConfig;
use tender_aggregator::Coordinator;
use tender_aggregator::JsonFileBackend;

fn coordinator_at(path: &std::path::Path) -> anyhow::Result<Coordinator> {
    let config = AggregatorConfig::default();
    let backend = Arc::new(JsonFileBackend::new(path, config.quota()));
    Ok(Coordinator::builder(config, backend).build()?)
}

#[tokio::test]
async fn aggregate_survives_a_restart() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tender-data.json");

    let coordinator = coordinator_at(&path)?;
    let outcome = coordinator
        .submit(json!({
            "contract_id": "VT-77",
            "title": "Harbour dredging",
            "suppliers": [{ "supplier_name": "Deep Co" }],
        }))
        .await;
    assert!(outcome.is_committed());
    drop(coordinator);

    let on_disk: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert_eq!(
        on_disk["tenderData"]["VT-77"]["title"],
        json!("Harbour dredging")
    );

    let restarted = coordinator_at(&path)?;
    let report = restarted.verify("VT-77").await?;
    assert!(report.found);
    assert_eq!(report.total_count, 1);
    assert_eq!(
        report.record.and_then(|record| record.suppliers).as_ref().map(Vec::len),
        Some(1)
    );
    Ok(())
}

#[tokio::test]
async fn backup_export_writes_dated_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let coordinator = coordinator_at(&dir.path().join("tender-data.json"))?;
    coordinator
        .submit(json!({ "contract_id": "VT-1", "status": "Open" }))
        .await;

    let path = coordinator.export_backup(&dir.path().join("backups")).await?;
    let name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or_default()
        .to_string();
    assert!(name.starts_with("tender-data-backup-"), "{name}");
    assert!(name.ends_with(".json"), "{name}");

    let exported: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert_eq!(exported["VT-1"]["status"], json!("Open"));
    Ok(())
}

#[tokio::test]
async fn clear_all_removes_the_container_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tender-data.json");
    let coordinator = coordinator_at(&path)?;
    coordinator.submit(json!({ "contract_id": "VT-1" })).await;
    assert!(path.exists());

    coordinator.clear_all().await?;
    assert!(!path.exists());
    assert_eq!(coordinator.usage().await?, 0);
    Ok(())
}
