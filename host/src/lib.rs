//! stdio message host for the tender aggregator.
//!
//! Reads one JSON request per line on stdin and writes responses and
//! `DATA_UPDATED` broadcasts, one JSON object per line, on stdout.

mod dispatch;

pub use dispatch::serve;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tender_aggregator::AggregatorConfig;
use tender_aggregator::BroadcastObserver;
use tender_aggregator::Coordinator;
use tender_aggregator::JsonFileBackend;
use tender_aggregator::MemoryBackend;
use tender_aggregator::StorageBackend;
use tokio::io::BufReader;
use tracing::info;

/// Capacity of the `DATA_UPDATED` fan-out channel.
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "tender-host", version, about = "Tender record aggregator over stdio")]
pub struct Cli {
    /// JSON file holding the tender container (in-memory when omitted)
    #[arg(long, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AggregatorConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => AggregatorConfig::default(),
    };
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("invalid config: {err}"))?;
    Ok(config)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let backend: Arc<dyn StorageBackend> = match &cli.data_file {
        Some(path) => {
            info!(path = %path.display(), "using file container");
            Arc::new(JsonFileBackend::new(path, config.quota()))
        }
        None => {
            info!("using in-memory container");
            Arc::new(MemoryBackend::with_quota(config.quota()))
        }
    };

    let observer = BroadcastObserver::new(BROADCAST_CAPACITY);
    let coordinator = Coordinator::builder(config, backend)
        .observer(Arc::new(observer.clone()))
        .build()?;

    let input = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tokio::select! {
        result = serve(coordinator, observer, input, stdout) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; shutting down");
        }
    }
    Ok(())
}
