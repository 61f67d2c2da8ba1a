use super::{Stage, StageContext, StageTarget};
use crate::{
    error::{FrameliftError, FrameliftResult},
    programs,
    renderer::{ComputePass, Extent, ParameterBlockHandle, ProgramHandle, Renderer, Resource},
};

/// Smallest allowed downsample factor
pub const MIN_FACTOR: f32 = 0.1;
/// Largest allowed downsample factor
pub const MAX_FACTOR: f32 = 1.0;

/// Parameter block of the downsample program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct DownsampleParams {
    /// Output size relative to the input
    pub factor: f32,
    /// How much high-frequency detail survives the filter
    pub preserve_detail: f32,
    /// Edge detection threshold
    pub threshold: f32,
    _reserved: f32,
}

impl Default for DownsampleParams {
    fn default() -> Self {
        Self {
            factor: 0.5,
            preserve_detail: 0.75,
            threshold: 0.1,
            _reserved: 0.0,
        }
    }
}

/// Detail-preserving downsample run ahead of adaptive upscaling
#[derive(Debug)]
pub struct DownsampleStage {
    program: ProgramHandle,
    parameters: Option<ParameterBlockHandle>,
    params: DownsampleParams,
}

impl DownsampleStage {
    /// Stage name
    pub const NAME: &'static str = "Downsample";

    /// Loads the program and uploads the default parameters
    pub fn new(renderer: &mut dyn Renderer) -> FrameliftResult<Self> {
        let program = programs::load(renderer, &programs::DOWNSAMPLE, Self::NAME)?;
        let params = DownsampleParams::default();
        let parameters = renderer.create_parameter_block("DownsampleParams", bytemuck::bytes_of(&params))?;

        Ok(Self {
            program,
            parameters: Some(parameters),
            params,
        })
    }

    /// Current downsample factor
    pub fn factor(&self) -> f32 {
        self.params.factor
    }

    /// Sets the downsample factor, clamped to [0.1, 1.0]
    ///
    /// The parameter block is re-uploaded only when the clamped factor changes.
    pub fn set_factor(&mut self, renderer: &mut dyn Renderer, factor: f32) -> FrameliftResult<()> {
        let parameters = self.parameters()?;
        let factor = if factor.is_nan() { self.params.factor } else { factor.clamp(MIN_FACTOR, MAX_FACTOR) };
        if factor != self.params.factor {
            self.params.factor = factor;
            renderer.update_parameter_block(parameters, bytemuck::bytes_of(&self.params))?;
        }
        Ok(())
    }

    /// Processes one frame with `factor` applied for this call only
    ///
    /// The stored factor is uploaded again afterwards, whether or not the call succeeded.
    /// A factor that is not positive leaves the stored factor in effect.
    pub fn process_with_factor(&mut self, renderer: &mut dyn Renderer, input: StageTarget, output: StageTarget, factor: f32) -> FrameliftResult<()> {
        let parameters = self.parameters()?;
        let Some(factor) = override_factor(Some(factor)) else {
            return self.run(renderer, parameters, input, output);
        };

        let stored = self.params;
        let temporary = DownsampleParams { factor, ..stored };

        renderer.update_parameter_block(parameters, bytemuck::bytes_of(&temporary))?;
        let result = self.run(renderer, parameters, input, output);
        renderer.update_parameter_block(parameters, bytemuck::bytes_of(&stored))?;
        result
    }

    fn parameters(&self) -> FrameliftResult<ParameterBlockHandle> {
        self.parameters.ok_or(FrameliftError::NotInitialized { component: Self::NAME })
    }

    fn run(&self, renderer: &mut dyn Renderer, parameters: ParameterBlockHandle, input: StageTarget, output: StageTarget) -> FrameliftResult<()> {
        if input.texture.is_null() || output.texture.is_null() {
            tracing::error!("{}: invalid input or output texture", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        let pass = ComputePass::new("Downsample", self.program)
            .parameters(0, parameters)
            .input(0, Resource::Texture(input.texture))
            .output(0, Resource::Texture(output.texture))
            .covering(output.extent);
        renderer.dispatch(&pass).inspect_err(|e| tracing::error!("{}: dispatch failed: {e}", Self::NAME))?;
        renderer.sync_compute()?;
        Ok(())
    }
}

/// Clamped override factor, or `None` when `factor` should not replace the stored one
fn override_factor(factor: Option<f32>) -> Option<f32> {
    factor.filter(|factor| *factor > 0.0).map(|factor| factor.clamp(MIN_FACTOR, MAX_FACTOR))
}

impl Stage for DownsampleStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn output_extent(&self, input: Extent, context: &StageContext) -> Extent {
        input.scaled(override_factor(context.downsample_factor).unwrap_or(self.params.factor))
    }

    fn process(&mut self, renderer: &mut dyn Renderer, input: StageTarget, output: StageTarget, context: &StageContext) -> FrameliftResult<()> {
        match context.downsample_factor {
            Some(factor) => self.process_with_factor(renderer, input, output, factor),
            None => {
                let parameters = self.parameters()?;
                self.run(renderer, parameters, input, output)
            }
        }
    }

    fn release(&mut self, renderer: &mut dyn Renderer) {
        if let Some(parameters) = self.parameters.take() {
            renderer.release_parameter_block(parameters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{renderer::WorkGroups, testing::{Call, RecordingRenderer}};

    fn context() -> StageContext {
        StageContext {
            delta_time: 0.0,
            quality_factor: 1.0,
            output_extent: Extent::new(1920, 1080),
            downsample_factor: None,
        }
    }

    #[test]
    fn test_factor_is_clamped_and_uploaded_on_change() {
        let mut renderer = RecordingRenderer::new();
        let mut stage = DownsampleStage::new(&mut renderer).unwrap();
        assert_eq!(stage.factor(), 0.5);

        stage.set_factor(&mut renderer, 0.5).unwrap();
        assert!(renderer.parameter_uploads::<DownsampleParams>("DownsampleParams").is_empty());

        stage.set_factor(&mut renderer, 0.01).unwrap();
        assert_eq!(stage.factor(), MIN_FACTOR);
        stage.set_factor(&mut renderer, 7.0).unwrap();
        assert_eq!(stage.factor(), MAX_FACTOR);
        stage.set_factor(&mut renderer, f32::NAN).unwrap();
        assert_eq!(stage.factor(), MAX_FACTOR);

        let factors: Vec<f32> = renderer.parameter_uploads::<DownsampleParams>("DownsampleParams").iter().map(|params| params.factor).collect();
        assert_eq!(factors, [MIN_FACTOR, MAX_FACTOR]);
    }

    #[test]
    fn test_output_extent_follows_factor() {
        let mut renderer = RecordingRenderer::new();
        let mut stage = DownsampleStage::new(&mut renderer).unwrap();
        assert_eq!(stage.output_extent(Extent::new(1920, 1080), &context()), Extent::new(960, 540));
        stage.set_factor(&mut renderer, 0.25).unwrap();
        assert_eq!(stage.output_extent(Extent::new(1920, 1080), &context()), Extent::new(480, 270));

        let overridden = StageContext {
            downsample_factor: Some(0.5),
            ..context()
        };
        assert_eq!(stage.output_extent(Extent::new(1920, 1080), &overridden), Extent::new(960, 540));
        let ignored = StageContext {
            downsample_factor: Some(-1.0),
            ..context()
        };
        assert_eq!(stage.output_extent(Extent::new(1920, 1080), &ignored), Extent::new(480, 270));
    }

    #[test]
    fn test_override_factor_is_restored() {
        let mut renderer = RecordingRenderer::new();
        let mut stage = DownsampleStage::new(&mut renderer).unwrap();
        let input = StageTarget::new(renderer.add_texture(Extent::new(64, 64)), Extent::new(64, 64));
        let output = StageTarget::new(renderer.add_texture(Extent::new(16, 16)), Extent::new(16, 16));

        stage.process_with_factor(&mut renderer, input, output, 0.25).unwrap();

        let factors: Vec<f32> = renderer.parameter_uploads::<DownsampleParams>("DownsampleParams").iter().map(|params| params.factor).collect();
        assert_eq!(factors, [0.25, 0.5]);
        assert_eq!(stage.factor(), 0.5);
        match renderer.dispatch_calls().as_slice() {
            [Call::Dispatch { work_groups, .. }] => assert_eq!(*work_groups, WorkGroups { x: 2, y: 2, z: 1 }),
            other => panic!("unexpected dispatches: {other:?}"),
        }
    }

    #[test]
    fn test_override_restored_after_failure() {
        let mut renderer = RecordingRenderer::new();
        let mut stage = DownsampleStage::new(&mut renderer).unwrap();
        renderer.fail_dispatch = Some("downsample");
        let input = StageTarget::new(renderer.add_texture(Extent::new(64, 64)), Extent::new(64, 64));
        let output = StageTarget::new(renderer.add_texture(Extent::new(16, 16)), Extent::new(16, 16));

        assert!(stage.process_with_factor(&mut renderer, input, output, 0.25).is_err());
        assert_eq!(renderer.parameters::<DownsampleParams>(stage.parameters.unwrap()), DownsampleParams::default());
    }
}
