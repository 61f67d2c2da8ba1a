//! Per-frame performance recording
//!
//! The pipeline brackets every frame and every stage with calls to a
//! [`PerfRecorder`] owned by that pipeline instance, then folds the recorded
//! timings into a read-only [`PerformanceStats`] snapshot.

use std::time::{Duration, Instant};

use crate::renderer::Extent;

/// Elapsed time of one stage within a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    /// Stage name
    pub name: &'static str,
    /// Wall-clock time between stage start and end
    pub elapsed: Duration,
}

/// Timings recorded for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameTimings {
    /// Stages in execution order
    pub stages: Vec<StageTiming>,
    /// Time between frame start and end
    pub total: Duration,
}

/// Named stage timers bracketing a frame
pub trait PerfRecorder {
    /// Discards the previous frame's timings and starts a new frame
    fn start_frame(&mut self);

    /// Finishes the current frame
    fn end_frame(&mut self);

    /// Starts timing stage `name`
    fn start_stage(&mut self, name: &'static str);

    /// Stops timing stage `name`
    fn end_stage(&mut self, name: &'static str);

    /// Timings of the last finished frame
    fn timings(&self) -> FrameTimings;
}

/// [`PerfRecorder`] backed by [`Instant`]
#[derive(Debug, Default)]
pub struct FrameTimer {
    frame_start: Option<Instant>,
    open_stage: Option<(&'static str, Instant)>,
    current: FrameTimings,
    finished: FrameTimings,
}

impl PerfRecorder for FrameTimer {
    fn start_frame(&mut self) {
        self.frame_start = Some(Instant::now());
        self.open_stage = None;
        self.current = FrameTimings::default();
    }

    fn end_frame(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.current.total = start.elapsed();
        }
        self.finished = std::mem::take(&mut self.current);
    }

    fn start_stage(&mut self, name: &'static str) {
        self.open_stage = Some((name, Instant::now()));
    }

    fn end_stage(&mut self, name: &'static str) {
        match self.open_stage.take() {
            Some((open, start)) if open == name => self.current.stages.push(StageTiming { name, elapsed: start.elapsed() }),
            other => {
                tracing::debug!(stage = name, open = ?other.map(|(open, _)| open), "end_stage without matching start_stage");
            }
        }
    }

    fn timings(&self) -> FrameTimings {
        self.finished.clone()
    }
}

/// Read-only snapshot of the last processed frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    /// Stages that ran, in execution order
    pub stages: Vec<StageTiming>,
    /// Total processing time of the frame
    pub total: Duration,
    /// Size of the input frame
    pub input_extent: Extent,
    /// Size of the output frame
    pub output_extent: Extent,
    /// Number of intermediate frames synthesized
    pub generated_frames: u32,
    /// Estimated presented frame rate including generated frames; zero without timing information
    pub output_fps: f32,
}

impl PerformanceStats {
    /// Elapsed time of stage `name`, if it ran
    pub fn stage(&self, name: &str) -> Option<Duration> {
        self.stages.iter().find(|timing| timing.name == name).map(|timing| timing.elapsed)
    }

    /// Total time as fractional milliseconds
    pub fn total_ms(&self) -> f32 {
        self.total.as_secs_f32() * 1000.0
    }

    pub(crate) fn estimate_output_fps(delta_time: f32, generated_frames: u32) -> f32 {
        if delta_time > 0.0 && delta_time.is_finite() { (1 + generated_frames) as f32 / delta_time } else { 0.0 }
    }
}
