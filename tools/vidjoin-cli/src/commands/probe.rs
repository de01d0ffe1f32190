//! Show what vidjoin reads from a single source.

use std::path::PathBuf;
use std::sync::Arc;

use vidjoin_common::config::VidjoinConfig;
use vidjoin_compose::{AssetLoader, FfprobeProbe};

pub async fn run(config: &VidjoinConfig, path: PathBuf) -> anyhow::Result<()> {
    let loader = AssetLoader::new(Arc::new(FfprobeProbe::new(&config.export.ffprobe_path)));
    let asset = loader.load(0, &path).await?;

    println!("{}", serde_json::to_string_pretty(&asset)?);
    Ok(())
}
