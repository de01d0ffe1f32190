//! In-memory timeline of segments on parallel video/audio tracks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::asset::{SourceRef, TrackKind};
use crate::time::{MediaTime, TimeRange};

/// Frame rate used when no source reports one.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Audio sample rate used when no source reports one.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// A time range of one source placed on one track of the composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: TrackKind,
    pub source: SourceRef,
    /// Range read from the source; always starts at zero.
    pub source_range: TimeRange,
    /// Where the segment begins on the composition timeline.
    pub destination_offset: MediaTime,
}

impl Segment {
    /// A segment playing all of `[0, duration)` from `source` at `offset`.
    pub fn full(kind: TrackKind, source: SourceRef, duration: MediaTime, offset: MediaTime) -> Self {
        Self {
            kind,
            source,
            source_range: TimeRange::from_zero(duration),
            destination_offset: offset,
        }
    }

    pub fn duration(&self) -> MediaTime {
        self.source_range.duration
    }

    pub fn destination_end(&self) -> MediaTime {
        self.destination_offset + self.source_range.duration
    }
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Canvas for 4:2:0 output: both dimensions rounded down to even, minimum 2.
    pub fn even(width: u32, height: u32) -> Self {
        Self {
            width: (width & !1).max(2),
            height: (height & !1).max(2),
        }
    }
}

/// Render hints derived from the sources while building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionFormat {
    /// Output size, taken from the first source with video.
    pub canvas: Option<Canvas>,
    pub frame_rate: f64,
    pub sample_rate: u32,
}

impl Default for CompositionFormat {
    fn default() -> Self {
        Self {
            canvas: None,
            frame_rate: DEFAULT_FRAME_RATE,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Reasons a segment is rejected by [`Composition::insert`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("segment has zero duration")]
    EmptyRange,

    #[error("{kind} segment at {offset} overlaps the track end at {track_end}")]
    Overlap {
        kind: TrackKind,
        offset: MediaTime,
        track_end: MediaTime,
    },
}

/// Parallel video/audio timelines plus the running insertion cursor.
///
/// Segments on each track are strictly ordered by destination offset and
/// never overlap; [`Composition::insert`] enforces this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    tracks: BTreeMap<TrackKind, Vec<Segment>>,
    cursor: MediaTime,
    format: CompositionFormat,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment to its track.
    pub fn insert(&mut self, segment: Segment) -> Result<(), InsertError> {
        if segment.duration().is_zero() {
            return Err(InsertError::EmptyRange);
        }
        let track_end = self.track_end(segment.kind);
        if segment.destination_offset < track_end {
            return Err(InsertError::Overlap {
                kind: segment.kind,
                offset: segment.destination_offset,
                track_end,
            });
        }
        self.tracks.entry(segment.kind).or_default().push(segment);
        Ok(())
    }

    /// Move the cursor forward by one asset's duration.
    pub fn advance(&mut self, by: MediaTime) {
        self.cursor += by;
    }

    pub fn cursor(&self) -> MediaTime {
        self.cursor
    }

    /// Total playback length.
    pub fn duration(&self) -> MediaTime {
        self.cursor
    }

    pub fn segments(&self, kind: TrackKind) -> &[Segment] {
        self.tracks.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty tracks in kind order.
    pub fn tracks(&self) -> impl Iterator<Item = (TrackKind, &[Segment])> {
        self.tracks
            .iter()
            .filter(|(_, segments)| !segments.is_empty())
            .map(|(kind, segments)| (*kind, segments.as_slice()))
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        !self.segments(kind).is_empty()
    }

    /// End of the last segment on `kind`, or zero for an empty track.
    pub fn track_end(&self, kind: TrackKind) -> MediaTime {
        self.segments(kind)
            .last()
            .map(Segment::destination_end)
            .unwrap_or(MediaTime::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.values().all(Vec::is_empty)
    }

    pub fn segment_count(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    /// Distinct sources referenced by any track, ordered by input index.
    pub fn sources(&self) -> Vec<&SourceRef> {
        let mut sources: Vec<&SourceRef> = self
            .tracks
            .values()
            .flatten()
            .map(|segment| &segment.source)
            .collect();
        sources.sort_by_key(|source| source.index);
        sources.dedup_by_key(|source| source.index);
        sources
    }

    pub fn format(&self) -> &CompositionFormat {
        &self.format
    }

    pub fn set_format(&mut self, format: CompositionFormat) {
        self.format = format;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source(index: usize) -> SourceRef {
        SourceRef {
            index,
            path: PathBuf::from(format!("/in/{index}.mp4")),
        }
    }

    fn secs(s: u64) -> MediaTime {
        MediaTime::from_millis(s * 1_000)
    }

    #[test]
    fn test_insert_keeps_tracks_independent() {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Video, source(0), secs(5), secs(0)))
            .unwrap();
        comp.insert(Segment::full(TrackKind::Audio, source(0), secs(5), secs(0)))
            .unwrap();
        comp.advance(secs(5));
        comp.insert(Segment::full(TrackKind::Video, source(1), secs(3), secs(5)))
            .unwrap();
        comp.advance(secs(3));

        assert_eq!(comp.duration(), secs(8));
        assert_eq!(comp.segments(TrackKind::Video).len(), 2);
        assert_eq!(comp.track_end(TrackKind::Audio), secs(5));
        assert_eq!(comp.sources().len(), 2);
        assert_eq!(comp.segment_count(), 3);
    }

    #[test]
    fn test_insert_rejects_overlap() {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Video, source(0), secs(5), secs(0)))
            .unwrap();
        let err = comp
            .insert(Segment::full(TrackKind::Video, source(1), secs(2), secs(4)))
            .unwrap_err();
        assert!(matches!(err, InsertError::Overlap { .. }));
        assert_eq!(comp.segments(TrackKind::Video).len(), 1);
    }

    #[test]
    fn test_insert_allows_gaps() {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Audio, source(1), secs(2), secs(5)))
            .unwrap();
        assert_eq!(comp.track_end(TrackKind::Audio), secs(7));
        assert!(!comp.has_track(TrackKind::Video));
    }

    #[test]
    fn test_insert_rejects_empty_range() {
        let mut comp = Composition::new();
        let err = comp
            .insert(Segment::full(TrackKind::Video, source(0), MediaTime::ZERO, secs(0)))
            .unwrap_err();
        assert_eq!(err, InsertError::EmptyRange);
        assert!(comp.is_empty());
    }

    #[test]
    fn test_canvas_even_rounding() {
        assert_eq!(Canvas::even(1921, 1081), Canvas { width: 1920, height: 1080 });
        assert_eq!(Canvas::even(1, 0), Canvas { width: 2, height: 2 });
    }

    #[test]
    fn test_composition_json_round_trip_keeps_track_keys() {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Video, source(0), secs(1), secs(0)))
            .unwrap();
        comp.advance(secs(1));

        let json = serde_json::to_value(&comp).unwrap();
        assert!(json["tracks"]["video"].is_array());
        let parsed: Composition = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, comp);
    }
}
