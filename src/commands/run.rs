//! `run`: the bridge daemon.

use anyhow::{Context, Result};
use macropad::Config;
use std::path::PathBuf;
use tracing::info;

pub async fn run(config_path: PathBuf) -> Result<()> {
    info!("Loading config from {:?}", config_path);
    let config = Config::load_or_init(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    macropad::daemon::run(config, config_path).await
}
