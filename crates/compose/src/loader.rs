//! Resolve source paths into [`SourceAsset`]s, one at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vidjoin_common::error::{LoadFailure, MergeError, MergeResult};
use vidjoin_media_model::{MediaTime, SourceAsset};

use crate::probe::MediaProbe;

/// Loads source assets through a [`MediaProbe`].
#[derive(Clone)]
pub struct AssetLoader {
    probe: Arc<dyn MediaProbe>,
}

impl AssetLoader {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// Resolve the asset at `path`, reporting failures against `index`.
    pub async fn load(&self, index: usize, path: &Path) -> MergeResult<SourceAsset> {
        let fail = |reason: LoadFailure| MergeError::load(index, path, reason);

        if path.as_os_str().is_empty() {
            return Err(fail(LoadFailure::EmptyPath));
        }
        check_readable(path).await.map_err(fail)?;

        let report = self.probe.probe(path).await.map_err(fail)?;
        if report.video.is_none() && report.audio.is_none() {
            return Err(fail(LoadFailure::NoTracks));
        }
        let duration = report
            .duration
            .ok_or_else(|| fail(LoadFailure::Probe("no duration reported".to_string())))?;

        tracing::debug!(
            index,
            path = %path.display(),
            probe = self.probe.name(),
            duration = %duration,
            video = report.video.is_some(),
            audio = report.audio.is_some(),
            "Asset loaded"
        );

        Ok(SourceAsset {
            index,
            path: path.to_path_buf(),
            duration,
            video: report.video,
            audio: report.audio,
        })
    }

    /// Load every path in order, awaiting each probe before starting the next.
    ///
    /// Stops at the first failure; later paths are never touched.
    pub async fn load_all(&self, paths: &[PathBuf]) -> MergeResult<Vec<SourceAsset>> {
        let mut assets = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            assets.push(self.load(index, path).await?);
        }
        let total: MediaTime = assets.iter().map(|asset| asset.duration).sum();
        tracing::info!(count = assets.len(), total = %total, "Loaded source assets");
        Ok(assets)
    }
}

async fn check_readable(path: &Path) -> Result<(), LoadFailure> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(LoadFailure::NotFound),
        Err(e) => return Err(LoadFailure::Unreadable(e.to_string())),
    };
    if metadata.is_dir() {
        return Err(LoadFailure::Unreadable("path is a directory".to_string()));
    }
    tokio::fs::File::open(path)
        .await
        .map(drop)
        .map_err(|e| LoadFailure::Unreadable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::probe::ProbeReport;
    use vidjoin_common::error::ErrorCode;
    use vidjoin_media_model::VideoTrackInfo;

    /// Answers from a fixed table keyed by file name and records call order.
    #[derive(Default)]
    struct TableProbe {
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait::async_trait]
    impl MediaProbe for TableProbe {
        fn name(&self) -> &str {
            "table"
        }

        async fn probe(&self, path: &Path) -> Result<ProbeReport, LoadFailure> {
            self.calls.lock().unwrap().push(path.to_path_buf());
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            match name {
                "empty.mp4" => Ok(ProbeReport {
                    duration: Some(MediaTime::from_millis(1_000)),
                    ..ProbeReport::default()
                }),
                "broken.mp4" => Err(LoadFailure::Probe("moov atom not found".into())),
                _ => Ok(ProbeReport {
                    duration: Some(MediaTime::from_millis(2_000)),
                    video: Some(VideoTrackInfo {
                        width: 640,
                        height: 360,
                        frame_rate: Some(25.0),
                        codec: None,
                    }),
                    audio: None,
                }),
            }
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"stub").unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_reports_tracks_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let clip = touch(dir.path(), "a.mp4");
        let loader = AssetLoader::new(Arc::new(TableProbe::default()));

        let asset = loader.load(3, &clip).await.unwrap();
        assert_eq!(asset.index, 3);
        assert_eq!(asset.duration, MediaTime::from_millis(2_000));
        assert!(asset.has_video_track());
        assert!(!asset.has_audio_track());
    }

    #[tokio::test]
    async fn test_zero_tracks_is_invalid_video() {
        let dir = tempfile::tempdir().unwrap();
        let clip = touch(dir.path(), "empty.mp4");
        let loader = AssetLoader::new(Arc::new(TableProbe::default()));

        let err = loader.load(1, &clip).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidVideo);
        assert_eq!(err.failing_index(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_and_empty_paths_never_reach_probe() {
        let probe = Arc::new(TableProbe::default());
        let loader = AssetLoader::new(probe.clone());

        let err = loader
            .load(0, Path::new("/definitely/not/here.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::Load {
                reason: LoadFailure::NotFound,
                ..
            }
        ));

        let err = loader.load(0, Path::new("")).await.unwrap_err();
        assert!(matches!(
            err,
            MergeError::Load {
                reason: LoadFailure::EmptyPath,
                ..
            }
        ));
        assert!(probe.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_all_is_ordered_and_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            touch(dir.path(), "a.mp4"),
            touch(dir.path(), "broken.mp4"),
            touch(dir.path(), "c.mp4"),
        ];
        let probe = Arc::new(TableProbe::default());
        let loader = AssetLoader::new(probe.clone());

        let err = loader.load_all(&paths).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProcessingFailed);
        assert_eq!(err.failing_index(), Some(1));
        assert_eq!(*probe.calls.lock().unwrap(), paths[..2].to_vec());
    }
}
