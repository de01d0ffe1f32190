//! Encoder backend contract.

use std::path::Path;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use vidjoin_common::config::OutputFileType;
use vidjoin_common::error::MergeResult;
use vidjoin_media_model::Composition;

use crate::progress::ExportProgress;

/// Everything an encoder needs to render one composition.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub composition: &'a Composition,
    pub output_path: &'a Path,
    pub file_type: OutputFileType,
}

/// How an encode ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    /// The output file is complete.
    Finished,
    /// The cancel token fired and the encoder stopped writing.
    Aborted,
}

/// Trait for encode backends (ffmpeg, test doubles).
#[async_trait::async_trait]
pub trait EncodeBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend can run on the system.
    ///
    /// May spawn a subprocess, so it must not block the calling task.
    async fn is_available(&self) -> bool;

    /// Render `request` to its output path.
    ///
    /// Implementations must return [`EncodeStatus::Aborted`] promptly once
    /// `cancel` fires, and must not touch the output file after returning.
    async fn encode(
        &self,
        request: EncodeRequest<'_>,
        cancel: CancellationToken,
        progress: &watch::Sender<ExportProgress>,
    ) -> MergeResult<EncodeStatus>;
}
