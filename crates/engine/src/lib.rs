//! vidjoin Engine
//!
//! Orchestrates merge jobs end to end:
//!
//! ```text
//! merge_videos(paths, out)
//!        │
//!        ▼
//! SessionManager::submit ── cancel + join previous job (pre-empted)
//!        │
//!        ├── compose: AssetLoader ──► CompositionBuilder
//!        │        └── failure ──► ResultChannel (already resolved)
//!        ▼
//! ExportSession::start ──► worker ──► ExportOutcome ──► ResultChannel::wait
//! ```

pub mod channel;
pub mod engine;
pub mod manager;

pub use channel::ResultChannel;
pub use engine::{MergeEngine, ScopedFuture};
pub use manager::{JobInfo, SessionHandle, SessionManager};
