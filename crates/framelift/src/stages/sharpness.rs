use super::{Stage, StageContext, StageTarget};
use crate::{
    config::UpscalingParameters,
    error::{FrameliftError, FrameliftResult},
    programs,
    renderer::{ComputePass, Extent, ParameterBlockHandle, ProgramHandle, Renderer, Resource},
};

/// Parameter block of the sharpening program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct SharpenParams {
    pub strength: f32,
    pub edge_preservation: f32,
    /// 1.0 when film grain should survive sharpening
    pub preserve_film_grain: f32,
    _reserved: f32,
}

impl From<&UpscalingParameters> for SharpenParams {
    fn from(params: &UpscalingParameters) -> Self {
        Self {
            strength: params.sharpness_strength,
            edge_preservation: params.edge_preservation,
            preserve_film_grain: if params.preserve_film_grain { 1.0 } else { 0.0 },
            _reserved: 0.0,
        }
    }
}

/// Contrast-adaptive sharpening of the final frame
#[derive(Debug)]
pub struct SharpnessStage {
    program: ProgramHandle,
    parameters: Option<ParameterBlockHandle>,
    params: SharpenParams,
}

impl SharpnessStage {
    /// Stage name
    pub const NAME: &'static str = "Sharpening";

    /// Loads the program and uploads the sharpening fields of `params`
    pub fn new(renderer: &mut dyn Renderer, params: &UpscalingParameters) -> FrameliftResult<Self> {
        let program = programs::load(renderer, &programs::SHARPEN, Self::NAME)?;
        let params = SharpenParams::from(params);
        let parameters = renderer.create_parameter_block("SharpenParams", bytemuck::bytes_of(&params))?;

        Ok(Self {
            program,
            parameters: Some(parameters),
            params,
        })
    }

    /// Applies new upscaling parameters, uploading only when a sharpening field changed
    pub fn configure(&mut self, renderer: &mut dyn Renderer, params: &UpscalingParameters) -> FrameliftResult<()> {
        let parameters = self.parameters.ok_or(FrameliftError::NotInitialized { component: Self::NAME })?;
        let params = SharpenParams::from(params);
        if params != self.params {
            renderer.update_parameter_block(parameters, bytemuck::bytes_of(&params))?;
            self.params = params;
        }
        Ok(())
    }

    /// Current parameters
    pub fn params(&self) -> SharpenParams {
        self.params
    }
}

impl Stage for SharpnessStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn output_extent(&self, input: Extent, _context: &StageContext) -> Extent {
        input
    }

    fn process(&mut self, renderer: &mut dyn Renderer, input: StageTarget, output: StageTarget, _context: &StageContext) -> FrameliftResult<()> {
        let parameters = self.parameters.ok_or(FrameliftError::NotInitialized { component: Self::NAME })?;
        if input.texture.is_null() || output.texture.is_null() {
            tracing::error!("{}: invalid input or output texture", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        if self.params.strength <= 0.0 {
            renderer.copy_texture(input.texture, output.texture)?;
            return Ok(());
        }

        let pass = ComputePass::new("Sharpen", self.program)
            .parameters(0, parameters)
            .input(0, Resource::Texture(input.texture))
            .output(0, Resource::Texture(output.texture))
            .covering(output.extent);
        renderer.dispatch(&pass)?;
        renderer.sync_compute()?;
        Ok(())
    }

    fn release(&mut self, renderer: &mut dyn Renderer) {
        if let Some(parameters) = self.parameters.take() {
            renderer.release_parameter_block(parameters);
        }
    }
}
