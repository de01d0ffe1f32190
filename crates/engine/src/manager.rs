//! Owns the single active export session of an engine.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use vidjoin_common::error::{CancelReason, MergeError};
use vidjoin_compose::{compose, AssetLoader, MIN_MERGE_INPUTS};
use vidjoin_export::{EncodeBackend, ExportProgress, ExportSession, ExportSettings, ExportState};

use crate::channel::ResultChannel;

/// Description of a submitted merge job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    /// Monotonic per-manager job number.
    pub id: u64,

    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,

    /// Where the merged file is written.
    pub output_path: PathBuf,

    /// Input paths in merge order.
    pub sources: Vec<PathBuf>,
}

/// An export session together with the job it belongs to.
#[derive(Debug)]
pub struct SessionHandle {
    info: JobInfo,
    session: ExportSession,
}

impl SessionHandle {
    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    pub fn state(&self) -> ExportState {
        self.session.state()
    }
}

/// Runs merge jobs one at a time; a new submission pre-empts the previous one.
pub struct SessionManager {
    loader: AssetLoader,
    backend: Arc<dyn EncodeBackend>,
    settings: ExportSettings,
    active: Option<SessionHandle>,
    next_id: u64,
}

impl SessionManager {
    pub fn new(
        loader: AssetLoader,
        backend: Arc<dyn EncodeBackend>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            loader,
            backend,
            settings,
            active: None,
            next_id: 1,
        }
    }

    /// Start a merge of `paths` into `output_path`.
    ///
    /// Fewer than [`MIN_MERGE_INPUTS`] paths is rejected without touching the
    /// held job. Otherwise any job still held is cancelled as pre-empted and
    /// its worker awaited before this job touches the filesystem. Failures
    /// before export arrive through an already-resolved channel.
    pub async fn submit(
        &mut self,
        paths: &[PathBuf],
        output_path: impl Into<PathBuf>,
    ) -> ResultChannel {
        let info = JobInfo {
            id: self.next_id,
            submitted_at: Utc::now(),
            output_path: output_path.into(),
            sources: paths.to_vec(),
        };
        self.next_id += 1;

        // A rejected call leaves the held job running.
        if paths.len() < MIN_MERGE_INPUTS {
            return reject(
                &info,
                MergeError::invalid_argument(format!(
                    "At least {MIN_MERGE_INPUTS} videos are required to merge, got {}",
                    paths.len()
                )),
            );
        }

        self.release(CancelReason::Preempted).await;

        tracing::info!(
            job = info.id,
            inputs = paths.len(),
            output = %info.output_path.display(),
            "Merge submitted"
        );

        let composition = match compose(&self.loader, paths).await {
            Ok(composition) => composition,
            Err(err) => return reject(&info, err),
        };

        let mut session = match ExportSession::new(
            composition,
            info.output_path.clone(),
            Arc::clone(&self.backend),
            self.settings,
        )
        .await
        {
            Ok(session) => session,
            Err(err) => return reject(&info, err),
        };

        match session.start().await {
            Ok(receiver) => {
                self.active = Some(SessionHandle { info, session });
                ResultChannel::pending(receiver)
            }
            Err(err) => reject(&info, err),
        }
    }

    /// Cancel the active job at the caller's request and wait for its worker.
    pub async fn cancel(&mut self) -> bool {
        self.release(CancelReason::Requested).await
    }

    /// Cancel whatever is running and wait until no worker remains.
    pub async fn dispose(&mut self) {
        self.release(CancelReason::Disposed).await;
    }

    /// The job currently exporting, if any.
    pub fn active_job(&self) -> Option<&JobInfo> {
        self.active
            .as_ref()
            .filter(|handle| !handle.state().is_terminal())
            .map(SessionHandle::info)
    }

    /// Progress of the held job, if any.
    pub fn subscribe_progress(&self) -> Option<watch::Receiver<ExportProgress>> {
        self.active
            .as_ref()
            .map(|handle| handle.session.subscribe_progress())
    }

    /// Drop the held session, cancelling it first. Returns whether the
    /// cancel took effect.
    async fn release(&mut self, reason: CancelReason) -> bool {
        let Some(mut handle) = self.active.take() else {
            return false;
        };
        let cancelled = handle.session.cancel(reason);
        handle.session.join().await;
        if cancelled {
            tracing::info!(job = handle.info.id, %reason, "Merge job cancelled");
        }
        cancelled
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            if handle.session.cancel(CancelReason::Disposed) {
                tracing::warn!(
                    job = handle.info.id,
                    "SessionManager dropped with a running export; call dispose() instead"
                );
            }
        }
    }
}

fn reject(info: &JobInfo, err: MergeError) -> ResultChannel {
    tracing::warn!(job = info.id, code = %err.code(), error = %err, "Merge rejected");
    ResultChannel::failed(err)
}
