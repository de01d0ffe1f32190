//! Export session state machine.
//!
//! A session renders one frozen composition to one output file on a tokio
//! worker task. The terminal outcome is delivered exactly once through a
//! oneshot channel; every state transition happens under a single lock so
//! the worker's completion and a concurrent cancel cannot both win.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vidjoin_common::config::OutputFileType;
use vidjoin_common::error::{CancelReason, MergeError, MergeResult};
use vidjoin_media_model::{Composition, MediaTime};

use crate::backend::{EncodeBackend, EncodeRequest, EncodeStatus};
use crate::progress::{ExportProgress, ExportStage};

/// Lifecycle of an export session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Exporting,
    Completed,
    Failed,
    Cancelled,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// The single terminal result of a session.
#[derive(Debug)]
pub enum ExportOutcome {
    Completed(PathBuf),
    Failed(MergeError),
    Cancelled(CancelReason),
}

impl ExportOutcome {
    pub fn into_result(self) -> MergeResult<PathBuf> {
        match self {
            Self::Completed(path) => Ok(path),
            Self::Failed(err) => Err(err),
            Self::Cancelled(reason) => Err(MergeError::cancelled(reason)),
        }
    }

    fn state(&self) -> ExportState {
        match self {
            Self::Completed(_) => ExportState::Completed,
            Self::Failed(_) => ExportState::Failed,
            Self::Cancelled(_) => ExportState::Cancelled,
        }
    }

    fn stage(&self) -> ExportStage {
        match self {
            Self::Completed(_) => ExportStage::Complete,
            Self::Failed(_) => ExportStage::Failed,
            Self::Cancelled(_) => ExportStage::Cancelled,
        }
    }
}

/// Per-session export options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSettings {
    /// Container override; inferred from the output extension when unset.
    pub file_type: Option<OutputFileType>,
}

#[derive(Debug)]
struct Inner {
    state: ExportState,
    sender: Option<oneshot::Sender<ExportOutcome>>,
}

/// State shared between the session handle and its worker.
#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    progress: watch::Sender<ExportProgress>,
    total: MediaTime,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a terminal outcome if the session is still exporting.
    fn settle(&self, outcome: ExportOutcome) -> bool {
        let stage = outcome.stage();
        {
            let mut inner = self.lock();
            if inner.state != ExportState::Exporting {
                tracing::debug!(
                    state = ?inner.state,
                    outcome = ?outcome.state(),
                    "Discarding late export outcome"
                );
                return false;
            }
            inner.state = outcome.state();
            if let Some(sender) = inner.sender.take() {
                // The receiver may already be gone; the state still counts.
                let _ = sender.send(outcome);
            }
        }
        self.progress
            .send_replace(ExportProgress::at_stage(stage, self.total));
        true
    }
}

/// One composition, one output file, one worker.
pub struct ExportSession {
    composition: Arc<Composition>,
    output_path: PathBuf,
    file_type: OutputFileType,
    backend: Arc<dyn EncodeBackend>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSession")
            .field("output_path", &self.output_path)
            .field("file_type", &self.file_type)
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

impl ExportSession {
    /// Create an idle session.
    pub async fn new(
        composition: Composition,
        output_path: impl Into<PathBuf>,
        backend: Arc<dyn EncodeBackend>,
        settings: ExportSettings,
    ) -> MergeResult<Self> {
        let output_path = output_path.into();

        if composition.is_empty() {
            return Err(MergeError::export("Cannot export an empty composition"));
        }
        if output_path.as_os_str().is_empty() {
            return Err(MergeError::export("Output path is empty"));
        }
        if output_path.is_dir() {
            return Err(MergeError::export(format!(
                "Output path {} is a directory",
                output_path.display()
            )));
        }
        if !backend.is_available().await {
            return Err(MergeError::export(format!(
                "Encoder backend '{}' is not available",
                backend.name()
            )));
        }

        let file_type = settings
            .file_type
            .or_else(|| OutputFileType::from_path(&output_path))
            .unwrap_or_default();
        let total = composition.duration();
        let (progress, _) = watch::channel(ExportProgress::at_stage(ExportStage::Preparing, total));

        Ok(Self {
            composition: Arc::new(composition),
            output_path,
            file_type,
            backend,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ExportState::Idle,
                    sender: None,
                }),
                progress,
                total,
            }),
            cancel: CancellationToken::new(),
            worker: None,
        })
    }

    /// Prepare the output location and spawn the encode worker.
    ///
    /// Any file already at the output path is removed first.
    pub async fn start(&mut self) -> MergeResult<oneshot::Receiver<ExportOutcome>> {
        if self.state() != ExportState::Idle {
            return Err(MergeError::export(format!(
                "Export session already started (state {:?})",
                self.state()
            )));
        }

        prepare_output(&self.output_path).await?;

        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.shared.lock();
            inner.state = ExportState::Exporting;
            inner.sender = Some(tx);
        }

        let composition = Arc::clone(&self.composition);
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let output_path = self.output_path.clone();
        let file_type = self.file_type;

        tracing::info!(
            output = %output_path.display(),
            format = %file_type,
            backend = backend.name(),
            duration = %composition.duration(),
            "Export started"
        );

        self.worker = Some(tokio::spawn(async move {
            let request = EncodeRequest {
                composition: &composition,
                output_path: &output_path,
                file_type,
            };
            let outcome = match backend.encode(request, cancel, &shared.progress).await {
                Ok(EncodeStatus::Finished) => ExportOutcome::Completed(output_path.clone()),
                Ok(EncodeStatus::Aborted) => ExportOutcome::Cancelled(CancelReason::Requested),
                Err(err) => {
                    tracing::error!(error = %err, "Export failed");
                    ExportOutcome::Failed(err)
                }
            };
            if shared.settle(outcome) {
                tracing::info!(output = %output_path.display(), "Export worker settled");
            }
        }));

        Ok(rx)
    }

    /// Stop the export. Only has an effect while exporting.
    ///
    /// Returns `true` if this call produced the session's outcome.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        {
            let mut inner = self.shared.lock();
            if inner.state != ExportState::Exporting {
                return false;
            }
            inner.state = ExportState::Cancelled;
            if let Some(sender) = inner.sender.take() {
                let _ = sender.send(ExportOutcome::Cancelled(reason));
            }
        }
        self.cancel.cancel();
        self.shared
            .progress
            .send_replace(ExportProgress::at_stage(ExportStage::Cancelled, self.shared.total));
        tracing::info!(%reason, output = %self.output_path.display(), "Export cancelled");
        true
    }

    /// Wait for the worker task to exit.
    pub async fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "Export worker panicked or was aborted");
            }
        }
    }

    pub fn state(&self) -> ExportState {
        self.shared.lock().state
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ExportProgress> {
        self.shared.progress.subscribe()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn file_type(&self) -> OutputFileType {
        self.file_type
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }
}

async fn prepare_output(path: &Path) -> MergeResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed existing output");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(MergeError::export_with_cause(
            format!("Could not replace existing output {}", path.display()),
            err,
        )),
    }
}
