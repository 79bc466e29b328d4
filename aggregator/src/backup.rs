use std::path::Path;
use std::path::PathBuf;
use tender_protocol::TenderStore;
use time::Date;
use time::macros::format_description;
use tokio::fs;
use tracing::info;

use crate::error::AggregatorError;
use crate::error::Result;

pub fn backup_file_name(date: Date) -> Result<String> {
    date.format(format_description!(
        "tender-data-backup-[year]-[month]-[day].json"
    ))
    .map_err(|err| AggregatorError::Backup(err.to_string()))
}

/// Write `store` as pretty JSON into `dir`, replacing a backup from the same day.
pub async fn write_backup(dir: &Path, store: &TenderStore, date: Date) -> Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(backup_file_name(date)?);
    let data = serde_json::to_vec_pretty(store)?;
    fs::write(&path, &data).await?;
    info!(path = %path.display(), records = store.len(), bytes = data.len(), "backup exported");
    Ok(path)
}
