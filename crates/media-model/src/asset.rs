//! Source assets: a video file plus its resolved duration and tracks.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::time::MediaTime;

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub const ALL: [TrackKind; 2] = [TrackKind::Video, TrackKind::Audio];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First video track of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrackInfo {
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Average frame rate, when the container reports one.
    pub frame_rate: Option<f64>,
    /// Codec name as reported by the probe (e.g. "h264").
    pub codec: Option<String>,
}

/// First audio track of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub codec: Option<String>,
}

/// A resolved source video.
///
/// Immutable once the loader hands it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAsset {
    /// Position in the caller's ordered input.
    pub index: usize,
    pub path: PathBuf,
    pub duration: MediaTime,
    pub video: Option<VideoTrackInfo>,
    pub audio: Option<AudioTrackInfo>,
}

impl SourceAsset {
    pub fn has_video_track(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio_track(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.has_video_track(),
            TrackKind::Audio => self.has_audio_track(),
        }
    }

    /// Number of media tracks this asset exposes.
    pub fn track_count(&self) -> usize {
        usize::from(self.has_video_track()) + usize::from(self.has_audio_track())
    }

    /// Reference used by segments placed from this asset.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            index: self.index,
            path: self.path.clone(),
        }
    }
}

/// Lightweight pointer from a segment back to the asset it plays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub index: usize,
    pub path: PathBuf,
}
