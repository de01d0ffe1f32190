//! Export progress reporting.

use vidjoin_media_model::MediaTime;

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Encoding,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Output timeline position reached by the encoder.
    pub out_time: MediaTime,

    /// Length of the composition being encoded.
    pub total: MediaTime,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

impl ExportProgress {
    /// A report carrying only a stage change.
    pub fn at_stage(stage: ExportStage, total: MediaTime) -> Self {
        let done = stage == ExportStage::Complete;
        Self {
            progress: if done { 1.0 } else { 0.0 },
            out_time: if done { total } else { MediaTime::ZERO },
            total,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Accumulates ffmpeg `-progress` key/value lines between `progress=` markers.
#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    pub(crate) out_time: MediaTime,
    pub(crate) complete: bool,
}

impl ProgressState {
    pub(crate) fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<u64>() {
                    self.out_time = MediaTime::from_micros(us);
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

pub(crate) fn progress_report(
    state: &ProgressState,
    total: MediaTime,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = if total.is_zero() {
        0.0
    } else {
        (state.out_time.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
    };

    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress: if state.complete { 1.0 } else { progress },
        out_time: state.out_time,
        total,
        eta_secs,
        stage: if state.complete {
            ExportStage::Finalizing
        } else {
            ExportStage::Encoding
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracks_out_time() {
        let mut state = ProgressState::default();
        state.update("frame", "120");
        state.update("out_time_us", "4000000");
        state.update("progress", "continue");

        let report = progress_report(&state, MediaTime::from_millis(8_000), 2.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert!((report.eta_secs - 2.0).abs() < 1e-9);
        assert_eq!(report.stage, ExportStage::Encoding);
    }

    #[test]
    fn test_progress_end_marks_finalizing() {
        let mut state = ProgressState::default();
        state.update("out_time_ms", "7990000");
        state.update("progress", "end");

        let report = progress_report(&state, MediaTime::from_millis(8_000), 4.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, ExportStage::Finalizing);
    }

    #[test]
    fn test_unparsable_time_is_ignored() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "N/A");
        assert_eq!(state.out_time, MediaTime::ZERO);
        let report = progress_report(&state, MediaTime::ZERO, 1.0);
        assert_eq!(report.progress, 0.0);
    }
}
