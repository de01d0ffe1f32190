//! Single-use completion surface for a merge job.

use std::path::PathBuf;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use vidjoin_common::error::{MergeError, MergeResult};
use vidjoin_export::ExportOutcome;

#[derive(Debug)]
enum Slot {
    Ready(MergeResult<PathBuf>),
    Pending(oneshot::Receiver<ExportOutcome>),
    Taken,
}

/// Resolves exactly once with the merged file or the job's failure.
///
/// Early failures (bad arguments, load or composition errors) arrive already
/// resolved; exports resolve when their session settles.
#[derive(Debug)]
pub struct ResultChannel {
    slot: Slot,
}

impl ResultChannel {
    pub fn resolved(result: MergeResult<PathBuf>) -> Self {
        Self {
            slot: Slot::Ready(result),
        }
    }

    pub fn failed(err: MergeError) -> Self {
        Self::resolved(Err(err))
    }

    pub fn pending(receiver: oneshot::Receiver<ExportOutcome>) -> Self {
        Self {
            slot: Slot::Pending(receiver),
        }
    }

    /// Wait for the job's result.
    pub async fn wait(self) -> MergeResult<PathBuf> {
        match self.slot {
            Slot::Ready(result) => result,
            Slot::Pending(receiver) => match receiver.await {
                Ok(outcome) => outcome.into_result(),
                Err(_) => Err(MergeError::WorkerLost),
            },
            Slot::Taken => Err(already_taken()),
        }
    }

    /// Take the result if it is available, without waiting.
    pub fn try_take(&mut self) -> Option<MergeResult<PathBuf>> {
        if let Slot::Pending(receiver) = &mut self.slot {
            let result = match receiver.try_recv() {
                Ok(outcome) => outcome.into_result(),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => Err(MergeError::WorkerLost),
            };
            self.slot = Slot::Taken;
            return Some(result);
        }
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Whether a result is still to come.
    pub fn is_pending(&self) -> bool {
        matches!(self.slot, Slot::Pending(_))
    }
}

fn already_taken() -> MergeError {
    MergeError::invalid_argument("merge result was already taken")
}
