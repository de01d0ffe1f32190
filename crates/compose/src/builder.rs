//! Build a [`Composition`] from ordered source assets.
//!
//! Each asset contributes a video segment and/or an audio segment at the
//! current cursor, then the cursor advances by the asset's full duration
//! whether or not both tracks were filled. An asset without audio therefore
//! leaves a silent gap instead of pulling later audio forward, and both
//! tracks stay aligned on asset boundaries.

use vidjoin_common::error::{MergeError, MergeResult};
use vidjoin_media_model::{
    Canvas, Composition, CompositionFormat, Segment, SourceAsset, TrackKind,
};

/// Minimum number of sources a merge accepts.
pub const MIN_MERGE_INPUTS: usize = 2;

const MAX_FRAME_RATE: f64 = 240.0;

/// Incremental composition builder.
///
/// After a failed [`append`](Self::append) the builder refuses further work
/// and [`finish`](Self::finish) reports the same failure, so a half-built
/// composition can never escape.
#[derive(Debug, Default)]
pub struct CompositionBuilder {
    composition: Composition,
    format: CompositionFormat,
    frame_rate_known: bool,
    sample_rate_known: bool,
    appended: usize,
    failure: Option<(usize, String)>,
}

impl CompositionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the whole timeline in one pass.
    pub fn build(assets: &[SourceAsset]) -> MergeResult<Composition> {
        if assets.len() < MIN_MERGE_INPUTS {
            return Err(MergeError::invalid_argument(format!(
                "At least {MIN_MERGE_INPUTS} videos are required to merge, got {}",
                assets.len()
            )));
        }
        let mut builder = Self::new();
        for asset in assets {
            builder.append(asset)?;
        }
        builder.finish()
    }

    /// Place `asset` at the cursor and advance past it.
    pub fn append(&mut self, asset: &SourceAsset) -> MergeResult<()> {
        if let Some((index, reason)) = &self.failure {
            return Err(MergeError::composition(*index, reason.clone()));
        }
        self.try_append(asset).map_err(|reason| {
            tracing::warn!(index = asset.index, %reason, "Composition insert failed");
            self.failure = Some((asset.index, reason.clone()));
            MergeError::composition(asset.index, reason)
        })
    }

    fn try_append(&mut self, asset: &SourceAsset) -> Result<(), String> {
        if asset.duration.is_zero() {
            return Err("asset has zero duration".to_string());
        }
        if let Some(video) = &asset.video {
            if video.width == 0 || video.height == 0 {
                return Err(format!(
                    "video track has unusable frame size {}x{}",
                    video.width, video.height
                ));
            }
        }

        let offset = self.composition.cursor();
        if offset.checked_add(asset.duration).is_none() {
            return Err(format!(
                "asset of {} does not fit after {offset} of composition",
                asset.duration
            ));
        }
        for kind in TrackKind::ALL {
            if asset.has_track(kind) {
                let segment = Segment::full(kind, asset.source_ref(), asset.duration, offset);
                self.composition.insert(segment).map_err(|e| e.to_string())?;
            }
        }
        self.absorb_format(asset);
        self.composition.advance(asset.duration);
        self.appended += 1;

        tracing::trace!(
            index = asset.index,
            offset = %offset,
            cursor = %self.composition.cursor(),
            "Asset appended to composition"
        );
        Ok(())
    }

    /// First video source fixes canvas and frame rate; first audio source fixes sample rate.
    fn absorb_format(&mut self, asset: &SourceAsset) {
        if let Some(video) = &asset.video {
            if self.format.canvas.is_none() {
                self.format.canvas = Some(Canvas::even(video.width, video.height));
            }
            if !self.frame_rate_known {
                if let Some(rate) = video.frame_rate.filter(|r| *r > 0.0 && *r <= MAX_FRAME_RATE) {
                    self.format.frame_rate = rate;
                    self.frame_rate_known = true;
                }
            }
        }
        if let Some(audio) = &asset.audio {
            if !self.sample_rate_known {
                if let Some(rate) = audio.sample_rate.filter(|r| *r > 0) {
                    self.format.sample_rate = rate;
                    self.sample_rate_known = true;
                }
            }
        }
    }

    /// Number of assets placed so far.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Freeze the composition.
    pub fn finish(self) -> MergeResult<Composition> {
        if let Some((index, reason)) = self.failure {
            return Err(MergeError::composition(index, reason));
        }
        let mut composition = self.composition;
        composition.set_format(self.format);
        tracing::info!(
            assets = self.appended,
            segments = composition.segment_count(),
            duration = %composition.duration(),
            frame_rate = self.format.frame_rate,
            sample_rate = self.format.sample_rate,
            "Composition built"
        );
        Ok(composition)
    }
}
