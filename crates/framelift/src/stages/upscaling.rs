use super::{Stage, StageContext, StageTarget};
use crate::{
    algorithms::BicubicUpscaler,
    config::UpscalingParameters,
    error::FrameliftResult,
    renderer::{Extent, Renderer},
};

/// Bicubic upscale to the target resolution
///
/// The sharpness strength is mapped to a kernel coefficient according to the
/// configured [`UpscalingMode`](crate::config::UpscalingMode).
#[derive(Debug)]
pub struct UpscalingStage {
    upscaler: BicubicUpscaler,
    params: UpscalingParameters,
}

impl UpscalingStage {
    /// Stage name
    pub const NAME: &'static str = "Upscaling";

    /// Wraps an initialized upscaler
    pub fn new(upscaler: BicubicUpscaler, params: &UpscalingParameters) -> Self {
        Self {
            upscaler,
            params: params.sanitized(),
        }
    }

    /// Applies new parameters starting with the next frame
    pub fn configure(&mut self, params: &UpscalingParameters) {
        self.params = params.sanitized();
    }

    /// Current parameters
    pub fn params(&self) -> &UpscalingParameters {
        &self.params
    }

    /// Kernel coefficient passed to the upscaler, before clamping
    pub fn coefficient(&self) -> f32 {
        self.params.mode.bicubic_coefficient(self.params.sharpness_strength, self.params.edge_preservation)
    }

    /// The wrapped upscaler
    pub fn upscaler(&self) -> &BicubicUpscaler {
        &self.upscaler
    }
}

impl Stage for UpscalingStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn output_extent(&self, _input: Extent, context: &StageContext) -> Extent {
        self.params.resolve_target(context.output_extent)
    }

    fn process(&mut self, renderer: &mut dyn Renderer, input: StageTarget, output: StageTarget, _context: &StageContext) -> FrameliftResult<()> {
        let coefficient = self.coefficient();
        self.upscaler.upscale(renderer, input.texture, output.texture, input.extent, output.extent, coefficient)
    }

    fn release(&mut self, renderer: &mut dyn Renderer) {
        self.upscaler.release(renderer);
    }
}
