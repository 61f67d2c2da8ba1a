use super::{Stage, StageContext, StageTarget};
use crate::{
    config::AaQuality,
    error::{FrameliftError, FrameliftResult},
    programs,
    renderer::{ComputePass, Extent, ParameterBlockHandle, ProgramHandle, Renderer, Resource},
};

/// Parameter block of the anti-aliasing program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct AaParams {
    /// Luma contrast below which a pixel is not treated as an edge
    pub threshold: f32,
    /// Weight of the filtered color in the final blend
    pub blend_factor: f32,
    /// Side length of the filter kernel in pixels
    pub kernel_size: u32,
    _reserved: u32,
}

impl AaParams {
    /// Filter constants for `quality`, or `None` when anti-aliasing is off
    pub fn for_quality(quality: AaQuality) -> Option<Self> {
        let (threshold, blend_factor, kernel_size) = match quality {
            AaQuality::Off => return None,
            AaQuality::Low => (0.15, 0.3, 1),
            AaQuality::Medium => (0.1, 0.5, 3),
            AaQuality::High => (0.05, 0.7, 5),
        };
        Some(Self {
            threshold,
            blend_factor,
            kernel_size,
            _reserved: 0,
        })
    }
}

/// Edge-aware anti-aliasing with quality-selected filter constants
#[derive(Debug)]
pub struct AntiAliasingStage {
    program: ProgramHandle,
    parameters: Option<ParameterBlockHandle>,
    quality: AaQuality,
}

impl AntiAliasingStage {
    /// Stage name
    pub const NAME: &'static str = "AntiAliasing";

    /// Loads the program and uploads the constants for `quality`
    pub fn new(renderer: &mut dyn Renderer, quality: AaQuality) -> FrameliftResult<Self> {
        let program = programs::load(renderer, &programs::ANTI_ALIASING, Self::NAME)?;
        let params = AaParams::for_quality(quality).unwrap_or(bytemuck::Zeroable::zeroed());
        let parameters = renderer.create_parameter_block("AaParams", bytemuck::bytes_of(&params))?;

        Ok(Self {
            program,
            parameters: Some(parameters),
            quality,
        })
    }

    /// Current quality level
    pub fn quality(&self) -> AaQuality {
        self.quality
    }

    /// Switches quality, re-uploading the constants only when it changes
    pub fn set_quality(&mut self, renderer: &mut dyn Renderer, quality: AaQuality) -> FrameliftResult<()> {
        let parameters = self.parameters.ok_or(FrameliftError::NotInitialized { component: Self::NAME })?;
        if quality == self.quality {
            return Ok(());
        }

        if let Some(params) = AaParams::for_quality(quality) {
            renderer.update_parameter_block(parameters, bytemuck::bytes_of(&params))?;
        }
        tracing::debug!("{}: quality {:?} -> {quality:?}", Self::NAME, self.quality);
        self.quality = quality;
        Ok(())
    }

    fn apply(&self, renderer: &mut dyn Renderer, parameters: ParameterBlockHandle, input: StageTarget, output: StageTarget) -> FrameliftResult<()> {
        let pass = ComputePass::new("Anti-Aliasing", self.program)
            .parameters(0, parameters)
            .input(0, Resource::Texture(input.texture))
            .output(0, Resource::Texture(output.texture))
            .covering(output.extent);
        renderer.dispatch(&pass)?;
        renderer.sync_compute()?;
        Ok(())
    }
}

impl Stage for AntiAliasingStage {
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

        match self.quality {
            AaQuality::Off => renderer.copy_texture(input.texture, output.texture).map_err(Into::into),
            _ => self.apply(renderer, parameters, input, output),
        }
    }

    fn release(&mut self, renderer: &mut dyn Renderer) {
        if let Some(parameters) = self.parameters.take() {
            renderer.release_parameter_block(parameters);
        }
    }
}
