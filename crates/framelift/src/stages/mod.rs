//! Pipeline stage wrappers
//!
//! Each stage turns one input frame into one output frame. Stages hold their
//! programs and parameter blocks; the frames flowing through them are owned by the
//! caller or by the renderer's intermediate pool.

mod anti_aliasing;
mod downsample;
mod frame_generation;
mod sharpness;
mod upscaling;

pub use anti_aliasing::{AaParams, AntiAliasingStage};
pub use downsample::{DownsampleParams, DownsampleStage};
pub use frame_generation::FrameGenerationStage;
pub use sharpness::{SharpenParams, SharpnessStage};
pub use upscaling::UpscalingStage;

use crate::{
    error::FrameliftResult,
    renderer::{Extent, Renderer, TextureHandle},
};

/// A texture together with the extent a stage reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTarget {
    /// Texture handle
    pub texture: TextureHandle,
    /// Region of the texture in use
    pub extent: Extent,
}

impl StageTarget {
    /// Creates a new target
    pub fn new(texture: TextureHandle, extent: Extent) -> Self {
        Self { texture, extent }
    }
}

/// Per-frame values every stage may consult
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageContext {
    /// Seconds elapsed since the previous frame
    pub delta_time: f32,
    /// Dynamic quality factor in [0, 1]
    pub quality_factor: f32,
    /// Extent of the pipeline's final output
    pub output_extent: Extent,
    /// Per-frame downsample factor override
    pub downsample_factor: Option<f32>,
}

/// One step of the enhancement chain
pub trait Stage {
    /// Name recorded in performance stats and errors
    fn name(&self) -> &'static str;

    /// Extent this stage produces from an input of `input`
    fn output_extent(&self, input: Extent, context: &StageContext) -> Extent;

    /// Processes `input` into `output`
    fn process(&mut self, renderer: &mut dyn Renderer, input: StageTarget, output: StageTarget, context: &StageContext) -> FrameliftResult<()>;

    /// Releases every stage-owned resource
    fn release(&mut self, renderer: &mut dyn Renderer);
}
