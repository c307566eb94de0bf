//! RoadSense - Main Entry Point
//!
//! Usage: `roadsense [config.toml]`

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use pipeline::{init_logging, run, PipelineConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref()).context("loading configuration")?;

    init_logging(&config.log_level, config.log_format).context("initialising logging")?;

    info!("=== RoadSense v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Reading frames from {}", config.source.path);

    let stop = Arc::new(AtomicBool::new(false));
    run(config, stop).await.context("running pipeline")?;

    Ok(())
}
