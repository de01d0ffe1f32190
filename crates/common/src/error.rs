//! Error types shared across vidjoin crates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Could not load video {index} at {}: {reason}", .path.display())]
    Load {
        index: usize,
        path: PathBuf,
        reason: LoadFailure,
    },

    #[error("Failed to insert video {index} into composition: {reason}")]
    Composition { index: usize, reason: String },

    #[error("Export failed: {message}")]
    Export {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Video merge was cancelled ({reason})")]
    Cancelled { reason: CancelReason },

    #[error("Export worker stopped without reporting a result")]
    WorkerLost,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using MergeError.
pub type MergeResult<T> = Result<T, MergeError>;

/// Why a single asset could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The caller passed an empty path.
    EmptyPath,
    /// Nothing exists at the path.
    NotFound,
    /// The file exists but cannot be opened for reading.
    Unreadable(String),
    /// Metadata resolved, but the asset exposes no audio or video tracks.
    NoTracks,
    /// Metadata resolution itself failed.
    Probe(String),
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "path is empty"),
            Self::NotFound => write!(f, "file does not exist"),
            Self::Unreadable(msg) => write!(f, "file is not readable: {msg}"),
            Self::NoTracks => write!(f, "asset has no audio or video tracks"),
            Self::Probe(msg) => write!(f, "metadata probe failed: {msg}"),
        }
    }
}

/// What triggered a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// A newer submission on the same engine took over.
    Preempted,
    /// The owning engine was torn down.
    Disposed,
    /// The caller asked for the job to stop.
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Preempted => "pre-empted by a newer merge",
            Self::Disposed => "engine disposed",
            Self::Requested => "cancel requested",
        };
        f.write_str(text)
    }
}

/// Stable, caller-visible failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    InvalidVideo,
    ProcessingFailed,
    InsertFailed,
    ExportFailed,
    MergeCancelled,
    ExportCancelled,
    MergeFailed,
    ExportUnknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidVideo => "invalid_video",
            Self::ProcessingFailed => "processing_failed",
            Self::InsertFailed => "insert_failed",
            Self::ExportFailed => "export_failed",
            Self::MergeCancelled => "merge_cancelled",
            Self::ExportCancelled => "export_cancelled",
            Self::MergeFailed => "merge_failed",
            Self::ExportUnknown => "export_unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MergeError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn load(index: usize, path: impl Into<PathBuf>, reason: LoadFailure) -> Self {
        Self::Load {
            index,
            path: path.into(),
            reason,
        }
    }

    pub fn composition(index: usize, reason: impl Into<String>) -> Self {
        Self::Composition {
            index,
            reason: reason.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
            cause: None,
        }
    }

    pub fn export_with_cause(
        msg: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Export {
            message: msg.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn cancelled(reason: CancelReason) -> Self {
        Self::Cancelled { reason }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// The caller-visible code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Load { reason, .. } => match reason {
                LoadFailure::Probe(_) => ErrorCode::ProcessingFailed,
                _ => ErrorCode::InvalidVideo,
            },
            Self::Composition { .. } => ErrorCode::InsertFailed,
            Self::Export { .. } => ErrorCode::ExportFailed,
            Self::Cancelled { reason } => match reason {
                CancelReason::Requested => ErrorCode::ExportCancelled,
                CancelReason::Preempted | CancelReason::Disposed => ErrorCode::MergeCancelled,
            },
            Self::WorkerLost => ErrorCode::ExportUnknown,
            Self::Config { .. } | Self::Io(_) | Self::Json(_) => ErrorCode::MergeFailed,
        }
    }

    /// Index of the failing input, for per-asset failures.
    pub fn failing_index(&self) -> Option<usize> {
        match self {
            Self::Load { index, .. } | Self::Composition { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_load_codes_split_on_reason() {
        let missing = MergeError::load(1, "/a.mp4", LoadFailure::NoTracks);
        assert_eq!(missing.code(), ErrorCode::InvalidVideo);
        assert_eq!(missing.failing_index(), Some(1));

        let probe = MergeError::load(0, "/b.mp4", LoadFailure::Probe("exit 1".into()));
        assert_eq!(probe.code(), ErrorCode::ProcessingFailed);
    }

    #[test]
    fn test_cancel_codes() {
        assert_eq!(
            MergeError::cancelled(CancelReason::Preempted).code().as_str(),
            "merge_cancelled"
        );
        assert_eq!(
            MergeError::cancelled(CancelReason::Disposed).code().as_str(),
            "merge_cancelled"
        );
        assert_eq!(
            MergeError::cancelled(CancelReason::Requested).code().as_str(),
            "export_cancelled"
        );
    }

    #[test]
    fn test_export_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = MergeError::export_with_cause("encoder failed", io);
        assert_eq!(err.code(), ErrorCode::ExportFailed);
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk full".into()));
    }

    #[test]
    fn test_unclassified_fallbacks() {
        let io: MergeError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(io.code(), ErrorCode::MergeFailed);
        assert_eq!(MergeError::WorkerLost.code(), ErrorCode::ExportUnknown);
    }

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::InsertFailed).unwrap();
        assert_eq!(json, "\"insert_failed\"");
    }
}
