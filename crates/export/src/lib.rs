//! vidjoin Export
//!
//! Renders a frozen composition to a single output file.
//!
//! ```text
//! Composition ──► ExportSession::start ──► worker task
//!                        │                     │
//!                        │ cancel(reason)      ├── EncodeBackend::encode (ffmpeg)
//!                        ▼                     │        │
//!                 CancellationToken ───────────┘        ├── progress (watch)
//!                                                       ▼
//!                                              ExportOutcome (oneshot)
//! ```

pub mod backend;
pub mod ffmpeg;
pub mod progress;
pub mod session;

pub use backend::{EncodeBackend, EncodeRequest, EncodeStatus};
pub use ffmpeg::{build_filter_graph, FfmpegBackend, FfmpegPlan, FilterGraph};
pub use progress::{ExportProgress, ExportStage};
pub use session::{ExportOutcome, ExportSession, ExportSettings, ExportState};
