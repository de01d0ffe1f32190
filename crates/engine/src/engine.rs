//! Caller-facing merge entry point.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use vidjoin_common::config::VidjoinConfig;
use vidjoin_common::error::MergeResult;
use vidjoin_compose::{AssetLoader, FfprobeProbe, MediaProbe};
use vidjoin_export::{EncodeBackend, ExportProgress, ExportSettings, FfmpegBackend};

use crate::channel::ResultChannel;
use crate::manager::{JobInfo, SessionManager};

/// Future returned by a [`MergeEngine::scoped`] body.
pub type ScopedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Merges videos, at most one export at a time.
///
/// The engine owns one [`SessionManager`]. Submitting while a job is still
/// exporting pre-empts that job, which then resolves as cancelled.
pub struct MergeEngine {
    manager: Mutex<SessionManager>,
}

impl MergeEngine {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        backend: Arc<dyn EncodeBackend>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            manager: Mutex::new(SessionManager::new(
                AssetLoader::new(probe),
                backend,
                settings,
            )),
        }
    }

    /// Engine backed by ffprobe and ffmpeg as configured.
    pub fn from_config(config: &VidjoinConfig) -> Self {
        tracing::debug!(
            ffmpeg = %config.export.ffmpeg_path.display(),
            ffprobe = %config.export.ffprobe_path.display(),
            "Creating merge engine"
        );
        Self::new(
            Arc::new(FfprobeProbe::new(&config.export.ffprobe_path)),
            Arc::new(FfmpegBackend::new(&config.export.ffmpeg_path)),
            ExportSettings {
                file_type: config.export.file_type,
            },
        )
    }

    /// Merge `video_paths` in order into `output_path`.
    pub async fn merge_videos(
        &self,
        video_paths: &[PathBuf],
        output_path: impl Into<PathBuf>,
    ) -> MergeResult<PathBuf> {
        // The lock is released before waiting so a later call can pre-empt.
        let channel = self.submit(video_paths, output_path).await;
        channel.wait().await
    }

    /// Start a merge without waiting for it.
    pub async fn submit(
        &self,
        video_paths: &[PathBuf],
        output_path: impl Into<PathBuf>,
    ) -> ResultChannel {
        self.manager
            .lock()
            .await
            .submit(video_paths, output_path)
            .await
    }

    /// Cancel the running job, if any.
    pub async fn cancel(&self) -> bool {
        self.manager.lock().await.cancel().await
    }

    /// Cancel the running job and wait for its worker to exit.
    pub async fn dispose(&self) {
        self.manager.lock().await.dispose().await;
    }

    pub async fn active_job(&self) -> Option<JobInfo> {
        self.manager.lock().await.active_job().cloned()
    }

    /// Progress of the most recently submitted job.
    pub async fn subscribe_progress(&self) -> Option<watch::Receiver<ExportProgress>> {
        self.manager.lock().await.subscribe_progress()
    }

    /// Run `body` against this engine, then dispose it.
    pub async fn scoped<T>(
        self,
        body: impl for<'a> FnOnce(&'a MergeEngine) -> ScopedFuture<'a, T>,
    ) -> T {
        let output = body(&self).await;
        self.dispose().await;
        output
    }
}
