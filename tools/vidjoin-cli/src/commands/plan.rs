//! Build a composition and print it without exporting.

use std::sync::Arc;

use vidjoin_common::config::{OutputFileType, VidjoinConfig};
use vidjoin_compose::{compose, AssetLoader, FfprobeProbe};
use vidjoin_export::{EncodeRequest, FfmpegBackend};
use vidjoin_media_model::TrackKind;

pub async fn run(
    config: &VidjoinConfig,
    paths: Vec<String>,
    show_command: bool,
) -> anyhow::Result<()> {
    let sources = super::source_paths(&paths)?;
    let loader = AssetLoader::new(Arc::new(FfprobeProbe::new(&config.export.ffprobe_path)));
    let composition = compose(&loader, &sources).await?;

    println!("Composition: {} total", composition.duration());
    for kind in TrackKind::ALL {
        println!("  {kind} track:");
        for segment in composition.segments(kind) {
            println!(
                "    [{}] {} -> {} .. {}",
                segment.source.index,
                segment.source.path.display(),
                segment.destination_offset,
                segment.destination_end(),
            );
        }
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&composition)?);

    if show_command {
        let output_path = config.default_output_path();
        let file_type = config
            .export
            .file_type
            .or_else(|| OutputFileType::from_path(&output_path))
            .unwrap_or_default();
        let backend = FfmpegBackend::new(&config.export.ffmpeg_path);
        let plan = backend.plan(&EncodeRequest {
            composition: &composition,
            output_path: &output_path,
            file_type,
        })?;

        let args: Vec<String> = plan
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        println!();
        println!("{} {}", config.export.ffmpeg_path.display(), args.join(" "));
    }

    Ok(())
}
