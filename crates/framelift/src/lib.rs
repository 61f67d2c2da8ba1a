//! Real-time frame enhancement pipeline
//!
//! This crate upsamples rendered frames with a bicubic kernel of tunable sharpness,
//! synthesizes intermediate frames through block-based motion estimation, and runs
//! anti-aliasing, downsampling and sharpening passes around them. All GPU work goes
//! through the [`Renderer`] and [`ShaderLoader`] collaborator traits; the crate never
//! talks to a graphics API itself.

pub mod algorithms;
pub mod config;
pub mod error;
pub mod perf;
mod pipeline;
pub mod programs;
pub mod renderer;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AaQuality, FrameGenMode, FrameGenParameters, FrameParameters, MAX_GENERATION_FACTOR, PipelineConfig, UpscalingMode, UpscalingParameters};
pub use error::{FrameliftError, FrameliftResult};
pub use perf::{FrameTimer, PerfRecorder, PerformanceStats, StageTiming};
pub use pipeline::Pipeline;
pub use renderer::{Renderer, ShaderLoader};
