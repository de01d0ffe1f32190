//! vidjoin Media Model
//!
//! Defines the core data contracts for merge jobs:
//! - **Time:** Microsecond media time and half-open ranges
//! - **Asset:** A source file with its resolved duration and tracks
//! - **Composition:** Segments placed on parallel video/audio tracks
//!
//! Every segment reads its source from time zero; only the destination
//! offset varies.

pub mod asset;
pub mod composition;
pub mod time;

pub use asset::*;
pub use composition::*;
pub use time::*;
