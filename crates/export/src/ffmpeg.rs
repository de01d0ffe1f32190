//! ffmpeg encode backend.
//!
//! The whole composition becomes one ffmpeg invocation: every distinct
//! source is an input, each segment is trimmed and normalized to the
//! composition format, gaps are filled with black frames or silence, and
//! each track is concatenated in timeline order.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, OnceCell};
use tokio_util::sync::CancellationToken;
use vidjoin_common::error::{MergeError, MergeResult};
use vidjoin_media_model::{Canvas, Composition, MediaTime, Segment, TrackKind};

use crate::backend::{EncodeBackend, EncodeRequest, EncodeStatus};
use crate::progress::{progress_report, ExportProgress, ExportStage, ProgressState};

/// Fixed quality preset.
const VIDEO_CODEC_ARGS: [&str; 8] = [
    "-c:v", "libx264", "-preset", "slow", "-crf", "18", "-pix_fmt", "yuv420p",
];
const AUDIO_CODEC_ARGS: [&str; 4] = ["-c:a", "aac", "-b:a", "192k"];

const STALL_WARNING_SECS: u64 = 10;

/// Encodes compositions by shelling out to ffmpeg.
#[derive(Debug)]
pub struct FfmpegBackend {
    binary: PathBuf,
    available: OnceCell<bool>,
}

/// A fully resolved ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegPlan {
    pub args: Vec<OsString>,
    pub expected_duration: MediaTime,
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            available: OnceCell::new(),
        }
    }

    /// Build the argument list for `request`.
    pub fn plan(&self, request: &EncodeRequest<'_>) -> MergeResult<FfmpegPlan> {
        let graph = build_filter_graph(request.composition)?;

        let mut args: Vec<OsString> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        for input in &graph.inputs {
            args.push("-i".into());
            args.push(input.clone().into_os_string());
        }
        args.push("-filter_complex".into());
        args.push(graph.filter.clone().into());

        if let Some(label) = &graph.video_label {
            args.push("-map".into());
            args.push(format!("[{label}]").into());
            args.extend(VIDEO_CODEC_ARGS.iter().map(OsString::from));
        }
        if let Some(label) = &graph.audio_label {
            args.push("-map".into());
            args.push(format!("[{label}]").into());
            args.extend(AUDIO_CODEC_ARGS.iter().map(OsString::from));
        }

        args.push("-movflags".into());
        args.push("+faststart".into());
        args.push("-f".into());
        args.push(request.file_type.ffmpeg_format().into());
        args.push(request.output_path.as_os_str().to_os_string());

        Ok(FfmpegPlan {
            args,
            expected_duration: request.composition.duration(),
        })
    }

    async fn run(
        &self,
        plan: &FfmpegPlan,
        cancel: &CancellationToken,
        progress: &watch::Sender<ExportProgress>,
    ) -> MergeResult<EncodeStatus> {
        tracing::debug!(args = ?plan.args, "Running ffmpeg");
        let mut child = Command::new(&self.binary)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MergeError::export_with_cause("Failed to start ffmpeg", e))?;

        let pid = child.id();
        tracing::info!(
            pid,
            args_len = plan.args.len(),
            expected = %plan.expected_duration,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MergeError::export("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MergeError::export("Failed to capture ffmpeg stderr"))?;

        // ffmpeg blocks once the stderr pipe fills, so drain it alongside.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let started = Instant::now();
        let mut lines = BufReader::new(stdout).lines();
        let mut latest = ProgressState::default();
        let mut last_out_time = MediaTime::ZERO;
        let mut last_advance = Instant::now();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stderr_task.abort();
                    return abort(&mut child, pid).await;
                }
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    stderr_task.abort();
                    kill_quietly(&mut child).await;
                    return Err(MergeError::export_with_cause(
                        "Failed reading ffmpeg progress",
                        e,
                    ));
                }
            };

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time > last_out_time {
                last_out_time = latest.out_time;
                last_advance = Instant::now();
            }
            progress.send_replace(progress_report(
                &latest,
                plan.expected_duration,
                started.elapsed().as_secs_f64(),
            ));
            if last_advance.elapsed().as_secs() >= STALL_WARNING_SECS {
                tracing::warn!(
                    out_time = %latest.out_time,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for {STALL_WARNING_SECS}s"
                );
                last_advance = Instant::now();
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                stderr_task.abort();
                return abort(&mut child, pid).await;
            }
            status = child.wait() => status
                .map_err(|e| MergeError::export_with_cause("Failed to wait on ffmpeg", e))?,
        };

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(MergeError::export(format!(
                "ffmpeg export failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(EncodeStatus::Finished)
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait::async_trait]
impl EncodeBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let found = Command::new(&self.binary)
                    .arg("-version")
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .status()
                    .await
                    .is_ok_and(|status| status.success());
                tracing::debug!(binary = %self.binary.display(), found, "Checked ffmpeg");
                found
            })
            .await
    }

    async fn encode(
        &self,
        request: EncodeRequest<'_>,
        cancel: CancellationToken,
        progress: &watch::Sender<ExportProgress>,
    ) -> MergeResult<EncodeStatus> {
        let plan = self.plan(&request)?;
        progress.send_replace(ExportProgress::at_stage(
            ExportStage::Encoding,
            plan.expected_duration,
        ));
        self.run(&plan, &cancel, progress).await
    }
}

/// Kill ffmpeg and wait for it to exit so nothing more reaches the output.
async fn abort(child: &mut Child, pid: Option<u32>) -> MergeResult<EncodeStatus> {
    tracing::info!(pid, "Cancelling ffmpeg");
    kill_quietly(child).await;
    Ok(EncodeStatus::Aborted)
}

async fn kill_quietly(child: &mut Child) {
    if let Err(err) = child.kill().await {
        tracing::warn!(error = %err, "Failed to kill ffmpeg");
    }
}

/// Filter graph plus the inputs and output labels it refers to.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    pub inputs: Vec<PathBuf>,
    pub filter: String,
    pub video_label: Option<String>,
    pub audio_label: Option<String>,
}

/// Translate a composition into an ffmpeg `filter_complex` graph.
pub fn build_filter_graph(composition: &Composition) -> MergeResult<FilterGraph> {
    if composition.is_empty() {
        return Err(MergeError::export("Composition has no segments to export"));
    }

    let sources = composition.sources();
    let input_of: HashMap<usize, usize> = sources
        .iter()
        .enumerate()
        .map(|(input, source)| (source.index, input))
        .collect();
    let inputs = sources.iter().map(|source| source.path.clone()).collect();

    let format = composition.format();
    let mut chains: Vec<String> = Vec::new();

    let video_label = if composition.has_track(TrackKind::Video) {
        let canvas = format
            .canvas
            .ok_or_else(|| MergeError::export("Composition has video but no canvas size"))?;
        let fps = format.frame_rate;
        let labels = walk_track(
            composition.segments(TrackKind::Video),
            &input_of,
            &mut chains,
            "v",
            // `V` skips attached pictures such as cover art.
            |input, duration| {
                format!(
                    "[{input}:V:0]trim=start=0:duration={},setpts=PTS-STARTPTS,{},fps={fps:.6},format=yuv420p",
                    secs(duration),
                    fit_to_canvas(canvas),
                )
            },
            |gap| {
                format!(
                    "color=c=black:s={}x{}:r={fps:.6}:d={},format=yuv420p,setsar=1",
                    canvas.width,
                    canvas.height,
                    secs(gap),
                )
            },
        )?;
        chains.push(format!("{}concat=n={}:v=1:a=0[vout]", labels.concat(), labels.len()));
        Some("vout".to_string())
    } else {
        None
    };

    let audio_label = if composition.has_track(TrackKind::Audio) {
        let rate = format.sample_rate;
        let normalize = "aformat=sample_fmts=fltp:channel_layouts=stereo";
        let labels = walk_track(
            composition.segments(TrackKind::Audio),
            &input_of,
            &mut chains,
            "a",
            |input, duration| {
                format!(
                    "[{input}:a:0]atrim=start=0:duration={},asetpts=PTS-STARTPTS,aresample={rate},{normalize}",
                    secs(duration),
                )
            },
            |gap| {
                format!(
                    "anullsrc=channel_layout=stereo:sample_rate={rate},atrim=duration={},{normalize}",
                    secs(gap),
                )
            },
        )?;
        chains.push(format!("{}concat=n={}:v=0:a=1[aout]", labels.concat(), labels.len()));
        Some("aout".to_string())
    } else {
        None
    };

    Ok(FilterGraph {
        inputs,
        filter: chains.join(";"),
        video_label,
        audio_label,
    })
}

/// Emit one chain per segment (and per gap before it); returns the labels in order.
fn walk_track(
    segments: &[Segment],
    input_of: &HashMap<usize, usize>,
    chains: &mut Vec<String>,
    prefix: &str,
    segment_chain: impl Fn(usize, MediaTime) -> String,
    gap_chain: impl Fn(MediaTime) -> String,
) -> MergeResult<Vec<String>> {
    let mut labels = Vec::with_capacity(segments.len());
    let mut cursor = MediaTime::ZERO;

    for segment in segments {
        if segment.destination_offset > cursor {
            let label = format!("[{prefix}gap{}]", labels.len());
            let mut chain = gap_chain(segment.destination_offset.saturating_sub(cursor));
            let _ = write!(chain, "{label}");
            chains.push(chain);
            labels.push(label);
        }

        let input = *input_of.get(&segment.source.index).ok_or_else(|| {
            MergeError::export(format!(
                "Segment references unknown source {}",
                segment.source.index
            ))
        })?;
        let label = format!("[{prefix}{}]", labels.len());
        let mut chain = segment_chain(input, segment.duration());
        let _ = write!(chain, "{label}");
        chains.push(chain);
        labels.push(label);

        cursor = segment.destination_end();
    }

    Ok(labels)
}

fn fit_to_canvas(canvas: Canvas) -> String {
    let Canvas { width, height } = canvas;
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1"
    )
}

fn secs(time: MediaTime) -> String {
    format!("{:.6}", time.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use vidjoin_common::config::OutputFileType;
    use vidjoin_media_model::{CompositionFormat, SourceRef};

    fn source(index: usize) -> SourceRef {
        SourceRef {
            index,
            path: PathBuf::from(format!("/in/{index}.mp4")),
        }
    }

    fn ms(millis: u64) -> MediaTime {
        MediaTime::from_millis(millis)
    }

    /// A(5s, video+audio) followed by B(3s, video only).
    fn two_clip_composition() -> Composition {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Video, source(0), ms(5_000), ms(0)))
            .unwrap();
        comp.insert(Segment::full(TrackKind::Audio, source(0), ms(5_000), ms(0)))
            .unwrap();
        comp.advance(ms(5_000));
        comp.insert(Segment::full(TrackKind::Video, source(1), ms(3_000), ms(5_000)))
            .unwrap();
        comp.advance(ms(3_000));
        comp.set_format(CompositionFormat {
            canvas: Some(Canvas::even(1280, 720)),
            frame_rate: 30.0,
            sample_rate: 48_000,
        });
        comp
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_filter_graph_concats_video_in_order() {
        let graph = build_filter_graph(&two_clip_composition()).unwrap();

        assert_eq!(
            graph.inputs,
            vec![PathBuf::from("/in/0.mp4"), PathBuf::from("/in/1.mp4")]
        );
        assert!(graph
            .filter
            .contains("[0:V:0]trim=start=0:duration=5.000000,setpts=PTS-STARTPTS,scale=1280:720"));
        assert!(graph.filter.contains("[1:V:0]trim=start=0:duration=3.000000"));
        assert!(!graph.filter.contains(":v:0"), "cover art must not be selected");
        assert!(graph.filter.contains("[v0][v1]concat=n=2:v=1:a=0[vout]"));
        assert!(graph.filter.contains("[a0]concat=n=1:v=0:a=1[aout]"));
        assert_eq!(graph.video_label.as_deref(), Some("vout"));
        assert_eq!(graph.audio_label.as_deref(), Some("aout"));
    }

    #[test]
    fn test_audio_gap_becomes_silence() {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Video, source(0), ms(2_000), ms(0)))
            .unwrap();
        comp.advance(ms(2_000));
        comp.insert(Segment::full(TrackKind::Video, source(1), ms(1_500), ms(2_000)))
            .unwrap();
        comp.insert(Segment::full(TrackKind::Audio, source(1), ms(1_500), ms(2_000)))
            .unwrap();
        comp.advance(ms(1_500));
        comp.set_format(CompositionFormat {
            canvas: Some(Canvas::even(640, 360)),
            ..CompositionFormat::default()
        });

        let graph = build_filter_graph(&comp).unwrap();
        assert!(graph.filter.contains(
            "anullsrc=channel_layout=stereo:sample_rate=48000,atrim=duration=2.000000"
        ));
        assert!(graph.filter.contains("[agap0][a1]concat=n=2:v=0:a=1[aout]"));
        assert!(graph.filter.contains("[1:a:0]atrim"));
    }

    #[test]
    fn test_video_gap_becomes_black() {
        let mut comp = Composition::new();
        comp.insert(Segment::full(TrackKind::Audio, source(0), ms(1_000), ms(0)))
            .unwrap();
        comp.advance(ms(1_000));
        comp.insert(Segment::full(TrackKind::Video, source(1), ms(1_000), ms(1_000)))
            .unwrap();
        comp.advance(ms(1_000));
        comp.set_format(CompositionFormat {
            canvas: Some(Canvas::even(320, 240)),
            ..CompositionFormat::default()
        });

        let graph = build_filter_graph(&comp).unwrap();
        assert!(graph.filter.contains("color=c=black:s=320x240"));
        assert!(graph.filter.contains("[vgap0][v1]concat=n=2"));
        assert!(graph.filter.contains("[0:a:0]atrim"));
        assert!(graph.filter.contains("[1:V:0]trim"));
    }

    #[test]
    fn test_empty_composition_is_export_error() {
        let err = build_filter_graph(&Composition::new()).unwrap_err();
        assert_eq!(err.code().as_str(), "export_failed");
    }

    #[test]
    fn test_plan_selects_container_and_output_last() {
        let comp = two_clip_composition();
        let backend = FfmpegBackend::default();
        let plan = backend
            .plan(&EncodeRequest {
                composition: &comp,
                output_path: Path::new("/out/merged.mov"),
                file_type: OutputFileType::Mov,
            })
            .unwrap();
        let args = strings(&plan.args);

        assert_eq!(args.last().map(String::as_str), Some("/out/merged.mov"));
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], "mov");
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[vout]"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
        assert_eq!(plan.expected_duration, ms(8_000));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable_and_fails_to_start() {
        let backend = FfmpegBackend::new("/nonexistent/ffmpeg-binary");
        assert!(!backend.is_available().await);
        // Answered from the cache the second time.
        assert!(!backend.is_available().await);

        let comp = two_clip_composition();
        let (tx, _rx) = watch::channel(ExportProgress::at_stage(ExportStage::Preparing, ms(0)));
        let err = backend
            .encode(
                EncodeRequest {
                    composition: &comp,
                    output_path: Path::new("/tmp/never-written.mp4"),
                    file_type: OutputFileType::Mp4,
                },
                CancellationToken::new(),
                &tx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code().as_str(), "export_failed");
    }
}
