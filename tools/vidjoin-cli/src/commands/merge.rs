//! Merge videos into one file.

use std::io::Write as _;
use std::path::PathBuf;

use vidjoin_common::config::{OutputFileType, VidjoinConfig};
use vidjoin_engine::MergeEngine;
use vidjoin_platform::{
    ensure_granted, output_path_in, ConfiguredOutputDir, FilesystemPermissionGate,
};

pub async fn run(
    mut config: VidjoinConfig,
    paths: Vec<String>,
    output: Option<PathBuf>,
    format: Option<String>,
) -> anyhow::Result<()> {
    let sources = super::source_paths(&paths)?;
    if let Some(format) = format {
        config.export.file_type = Some(format.parse::<OutputFileType>()?);
    }

    let output_path = match output {
        Some(path) => path,
        None => output_path_in(
            &ConfiguredOutputDir::from_config(&config),
            &config.output_file_name,
        )?,
    };
    let output_dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    ensure_granted(&FilesystemPermissionGate::new(sources.clone(), output_dir)).await?;

    println!("Merging {} videos", sources.len());
    for (index, source) in sources.iter().enumerate() {
        println!("  [{index}] {}", source.display());
    }
    println!("  Output: {}", output_path.display());

    let engine = MergeEngine::from_config(&config);
    let channel = engine.submit(&sources, &output_path).await;

    let progress_task = engine.subscribe_progress().await.map(|mut progress| {
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let p = progress.borrow_and_update().clone();
                print!(
                    "\r  Progress: {:.1}% ({} / {}, ETA: {:.0}s)  ",
                    p.progress * 100.0,
                    p.out_time,
                    p.total,
                    p.eta_secs,
                );
                let _ = std::io::stdout().flush();
            }
        })
    });

    let wait = channel.wait();
    tokio::pin!(wait);
    let result = tokio::select! {
        result = &mut wait => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted, cancelling merge...");
            engine.dispose().await;
            wait.await
        }
    };

    if let Some(task) = progress_task {
        task.abort();
    }
    engine.dispose().await;

    match result {
        Ok(path) => {
            println!("\nMerge complete: {}", path.display());
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Merge failed [{}]: {e}", e.code()))
        }
    }
}
