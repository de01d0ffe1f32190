//! Metadata probing for source files.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use vidjoin_common::error::LoadFailure;
use vidjoin_media_model::{AudioTrackInfo, MediaTime, VideoTrackInfo};

/// What a probe learned about one file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeReport {
    /// Container duration, or the longest stream when the container has none.
    pub duration: Option<MediaTime>,
    pub video: Option<VideoTrackInfo>,
    pub audio: Option<AudioTrackInfo>,
}

/// Resolves duration and track metadata for a media file.
#[async_trait::async_trait]
pub trait MediaProbe: Send + Sync {
    /// Probe name for logs.
    fn name(&self) -> &str;

    /// Inspect the file at `path`.
    async fn probe(&self, path: &Path) -> Result<ProbeReport, LoadFailure>;
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait::async_trait]
impl MediaProbe for FfprobeProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, LoadFailure> {
        let output = tokio::process::Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-of",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                LoadFailure::Probe(format!("failed to run {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LoadFailure::Probe(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_ffprobe_json(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

/// Parse `ffprobe -of json -show_format -show_streams` output.
pub fn parse_ffprobe_json(raw: &[u8]) -> Result<ProbeReport, LoadFailure> {
    let parsed: FfprobeOutput = serde_json::from_slice(raw)
        .map_err(|e| LoadFailure::Probe(format!("unparsable ffprobe output: {e}")))?;

    let mut report = ProbeReport::default();
    let mut longest_stream: Option<MediaTime> = None;

    for stream in &parsed.streams {
        let stream_duration = stream.duration.as_deref().and_then(parse_secs);
        match stream.codec_type.as_deref() {
            // Cover art is exposed as a video stream but carries no motion.
            Some("video") if stream.disposition.attached_pic == 0 => {
                if report.video.is_none() {
                    report.video = Some(VideoTrackInfo {
                        width: stream.width.unwrap_or(0),
                        height: stream.height.unwrap_or(0),
                        frame_rate: stream
                            .avg_frame_rate
                            .as_deref()
                            .and_then(parse_rate)
                            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate)),
                        codec: stream.codec_name.clone(),
                    });
                }
            }
            Some("audio") => {
                if report.audio.is_none() {
                    report.audio = Some(AudioTrackInfo {
                        sample_rate: stream.sample_rate.as_deref().and_then(|r| r.parse().ok()),
                        channels: stream.channels,
                        codec: stream.codec_name.clone(),
                    });
                }
            }
            _ => continue,
        }
        if let Some(duration) = stream_duration {
            longest_stream = Some(longest_stream.map_or(duration, |d| d.max(duration)));
        }
    }

    report.duration = parsed
        .format
        .and_then(|format| format.duration)
        .as_deref()
        .and_then(parse_secs)
        .or(longest_stream);

    Ok(report)
}

fn parse_secs(value: &str) -> Option<MediaTime> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(MediaTime::from_secs_f64)
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rate(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP_WITH_AUDIO: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1920,
             "height": 1080, "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001",
             "duration": "5.005000", "disposition": {"default": 1, "attached_pic": 0}},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "sample_rate": "44100",
             "channels": 2, "duration": "4.992000"}
        ],
        "format": {"filename": "a.mp4", "duration": "5.005000"}
    }"#;

    #[test]
    fn test_parse_video_and_audio() {
        let report = parse_ffprobe_json(CLIP_WITH_AUDIO.as_bytes()).unwrap();
        assert_eq!(report.duration, Some(MediaTime::from_micros(5_005_000)));

        let video = report.video.unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert!((video.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(video.codec.as_deref(), Some("h264"));

        let audio = report.audio.unwrap();
        assert_eq!(audio.sample_rate, Some(44_100));
        assert_eq!(audio.channels, Some(2));
    }

    #[test]
    fn test_parse_no_streams() {
        let report =
            parse_ffprobe_json(br#"{"streams": [], "format": {"duration": "1.0"}}"#).unwrap();
        assert!(report.video.is_none());
        assert!(report.audio.is_none());
    }

    #[test]
    fn test_cover_art_is_not_a_video_track() {
        let raw = br#"{"streams": [
            {"codec_type": "audio", "sample_rate": "48000", "channels": 2},
            {"codec_type": "video", "width": 600, "height": 600, "disposition": {"attached_pic": 1}}
        ], "format": {"duration": "180.0"}}"#;
        let report = parse_ffprobe_json(raw).unwrap();
        assert!(report.video.is_none());
        assert!(report.audio.is_some());
    }

    #[test]
    fn test_duration_falls_back_to_longest_stream() {
        let raw = br#"{"streams": [
            {"codec_type": "video", "width": 640, "height": 480, "duration": "2.5"},
            {"codec_type": "audio", "duration": "2.75"}
        ], "format": {}}"#;
        let report = parse_ffprobe_json(raw).unwrap();
        assert_eq!(report.duration, Some(MediaTime::from_millis(2_750)));
    }

    #[test]
    fn test_garbage_is_probe_failure() {
        let err = parse_ffprobe_json(b"Invalid data found").unwrap_err();
        assert!(matches!(err, LoadFailure::Probe(_)));
    }

    #[test]
    fn test_parse_rate_rejects_zero() {
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("25/1"), Some(25.0));
    }
}
