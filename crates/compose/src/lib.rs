//! vidjoin Compose
//!
//! Turns an ordered list of source paths into a frozen [`Composition`]:
//!
//! ```text
//! paths ──► AssetLoader (probe one file at a time) ──► [SourceAsset]
//!                                                         │
//!                                                         ▼
//!                                      CompositionBuilder (cursor walk)
//!                                                         │
//!                                                         ▼
//!                                                    Composition
//! ```
//!
//! Every asset is resolved before the builder runs, so a load failure at any
//! index aborts the job before a single segment is placed.

pub mod builder;
pub mod loader;
pub mod probe;

use std::path::PathBuf;

use vidjoin_common::error::MergeResult;
use vidjoin_media_model::Composition;

pub use builder::{CompositionBuilder, MIN_MERGE_INPUTS};
pub use loader::AssetLoader;
pub use probe::{FfprobeProbe, MediaProbe, ProbeReport};

/// Load every path in order, then build the composition.
pub async fn compose(loader: &AssetLoader, paths: &[PathBuf]) -> MergeResult<Composition> {
    let assets = loader.load_all(paths).await?;
    CompositionBuilder::build(&assets)
}
