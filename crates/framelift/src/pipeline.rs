//! Frame enhancement pipeline
//!
//! The pipeline owns the rendering collaborator, a performance recorder and every
//! stage. Each call to [`Pipeline::execute`] runs one frame through the enabled
//! stages in fixed order:
//!
//! downsample → anti-aliasing → upscaling → frame generation → sharpening
//!
//! Each stage writes into an intermediate texture requested from the renderer by
//! stage index; sharpening writes straight into the output, and when it is disabled
//! the last intermediate is copied there instead. Intermediates are released at the
//! end of every call.

use crate::{
    algorithms::{BicubicUpscaler, FrameInterpolationEngine},
    config::{AaQuality, FrameGenParameters, FrameParameters, PipelineConfig, UpscalingParameters},
    error::{FrameliftError, FrameliftResult},
    perf::{FrameTimer, PerfRecorder, PerformanceStats},
    renderer::{Renderer, TextureHandle},
    stages::{AntiAliasingStage, DownsampleStage, FrameGenerationStage, SharpnessStage, Stage, StageContext, StageTarget, UpscalingStage},
};

/// Intermediate slot of the downsample output
const DOWNSAMPLE_SLOT: usize = 0;
/// Intermediate slot of the anti-aliasing output
const ANTI_ALIASING_SLOT: usize = 1;
/// Intermediate slot of the upscaling output
const UPSCALING_SLOT: usize = 2;
/// Intermediate slot of the frame generation output
const FRAME_GENERATION_SLOT: usize = 3;

/// Every stage, constructed together
#[derive(Debug)]
struct Stages {
    downsample: DownsampleStage,
    anti_aliasing: AntiAliasingStage,
    upscaling: UpscalingStage,
    sharpness: SharpnessStage,
    frame_generation: FrameGenerationStage,
}

impl Stages {
    /// Builds the engines, then the stages in dependency order
    ///
    /// Anything created before a failure is released again.
    fn create(renderer: &mut dyn Renderer, config: &PipelineConfig) -> FrameliftResult<Self> {
        let mut upscaler = BicubicUpscaler::new(renderer).map_err(|e| e.during_initialization(BicubicUpscaler::NAME))?;
        let mut engine = match FrameInterpolationEngine::new(renderer, config.frame_extent(), &config.frame_generation) {
            Ok(engine) => engine,
            Err(e) => {
                upscaler.release(renderer);
                return Err(e.during_initialization(FrameInterpolationEngine::NAME));
            }
        };

        let mut downsample = match DownsampleStage::new(renderer) {
            Ok(stage) => stage,
            Err(e) => {
                upscaler.release(renderer);
                engine.release(renderer);
                return Err(e.during_initialization(DownsampleStage::NAME));
            }
        };

        let mut anti_aliasing = match AntiAliasingStage::new(renderer, config.aa_quality) {
            Ok(stage) => stage,
            Err(e) => {
                upscaler.release(renderer);
                engine.release(renderer);
                downsample.release(renderer);
                return Err(e.during_initialization(AntiAliasingStage::NAME));
            }
        };

        let mut upscaling = UpscalingStage::new(upscaler, &config.upscaling);

        let mut sharpness = match SharpnessStage::new(renderer, &config.upscaling) {
            Ok(stage) => stage,
            Err(e) => {
                engine.release(renderer);
                for stage in [&mut downsample as &mut dyn Stage, &mut anti_aliasing, &mut upscaling] {
                    stage.release(renderer);
                }
                return Err(e.during_initialization(SharpnessStage::NAME));
            }
        };

        let frame_generation = match FrameGenerationStage::new(renderer, engine, &config.frame_generation) {
            Ok(stage) => stage,
            Err(e) => {
                for stage in [&mut downsample as &mut dyn Stage, &mut anti_aliasing, &mut upscaling, &mut sharpness] {
                    stage.release(renderer);
                }
                return Err(e.during_initialization(FrameGenerationStage::NAME));
            }
        };

        Ok(Self {
            downsample,
            anti_aliasing,
            upscaling,
            sharpness,
            frame_generation,
        })
    }

    fn release(&mut self, renderer: &mut dyn Renderer) {
        self.downsample.release(renderer);
        self.anti_aliasing.release(renderer);
        self.upscaling.release(renderer);
        self.sharpness.release(renderer);
        self.frame_generation.release(renderer);
    }
}

/// Brackets stages with the recorder when monitoring is enabled
struct StageClock<'a> {
    recorder: &'a mut dyn PerfRecorder,
    enabled: bool,
}

impl StageClock<'_> {
    fn start(&mut self, name: &'static str) {
        if self.enabled {
            self.recorder.start_stage(name);
        }
    }

    fn end(&mut self, name: &'static str) {
        if self.enabled {
            self.recorder.end_stage(name);
        }
    }
}

/// Where a stage writes its result
#[derive(Debug, Clone, Copy)]
enum Destination {
    /// Pool-owned intermediate texture of this slot
    Intermediate(usize),
    /// The pipeline output
    Output(StageTarget),
}

fn run_stage(stage: &mut dyn Stage, renderer: &mut dyn Renderer, clock: &mut StageClock<'_>, input: StageTarget, destination: Destination, context: &StageContext) -> FrameliftResult<StageTarget> {
    let name = stage.name();
    clock.start(name);
    let result = process_stage(stage, renderer, input, destination, context);
    clock.end(name);

    result.map_err(|e| {
        tracing::error!("Pipeline: stage {name} failed: {e}");
        e.in_stage(name)
    })
}

fn process_stage(stage: &mut dyn Stage, renderer: &mut dyn Renderer, input: StageTarget, destination: Destination, context: &StageContext) -> FrameliftResult<StageTarget> {
    let output = match destination {
        Destination::Output(output) => output,
        Destination::Intermediate(slot) => {
            let extent = stage.output_extent(input.extent, context);
            StageTarget::new(renderer.intermediate_texture(slot, extent)?, extent)
        }
    };
    stage.process(renderer, input, output, context)?;
    Ok(output)
}

/// Real-time frame enhancement pipeline
///
/// Created with [`Pipeline::new`], made usable with [`Pipeline::initialize`] and fed
/// one frame per [`Pipeline::execute`]. Configuration changes between calls take
/// effect on the next call.
#[derive(Debug)]
pub struct Pipeline<R: Renderer, P: PerfRecorder = FrameTimer> {
    renderer: R,
    recorder: P,
    config: PipelineConfig,
    stages: Option<Stages>,
    stats: PerformanceStats,
}

impl<R: Renderer> Pipeline<R> {
    /// Creates an uninitialized pipeline timed by a [`FrameTimer`]
    pub fn new(renderer: R) -> Self {
        Self::with_recorder(renderer, FrameTimer::default())
    }
}

impl<R: Renderer, P: PerfRecorder> Pipeline<R, P> {
    /// Component name used in logs and errors
    pub const NAME: &'static str = "Pipeline";

    /// Creates an uninitialized pipeline timed by `recorder`
    pub fn with_recorder(renderer: R, recorder: P) -> Self {
        Self {
            renderer,
            recorder,
            config: PipelineConfig::default(),
            stages: None,
            stats: PerformanceStats::default(),
        }
    }

    /// Constructs the algorithm engines and every stage
    ///
    /// Fails fast: the first component that cannot be initialized aborts construction,
    /// and the error names it. A pipeline that failed to initialize rejects
    /// [`Pipeline::execute`] with [`FrameliftError::NotInitialized`].
    pub fn initialize(&mut self, config: PipelineConfig) -> FrameliftResult<()> {
        self.shutdown();
        let config = config.sanitized();

        let stages = Stages::create(&mut self.renderer, &config).inspect_err(|e| {
            let cause = std::error::Error::source(e).map(ToString::to_string).unwrap_or_default();
            tracing::error!("{}: {e}: {cause}", Self::NAME);
        })?;

        self.config = config;
        self.stages = Some(stages);
        tracing::info!("{}: all pipeline stages initialized", Self::NAME);
        Ok(())
    }

    /// Returns true between a successful [`Pipeline::initialize`] and [`Pipeline::shutdown`]
    pub fn is_initialized(&self) -> bool {
        self.stages.is_some()
    }

    /// Runs one frame through the enabled stages
    ///
    /// With every stage disabled the input is copied to the output and nothing else
    /// happens. A failing stage aborts the remaining stages of this frame only.
    pub fn execute(&mut self, params: &FrameParameters) -> FrameliftResult<()> {
        let Some(stages) = self.stages.as_mut() else {
            tracing::error!("{}: not initialized", Self::NAME);
            return Err(FrameliftError::NotInitialized { component: Self::NAME });
        };
        if params.input.is_null() || params.output.is_null() {
            tracing::error!("{}: invalid input or output texture", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        let renderer: &mut dyn Renderer = &mut self.renderer;
        let input = StageTarget::new(params.input, renderer.texture_extent(params.input)?);
        let output = StageTarget::new(params.output, renderer.texture_extent(params.output)?);
        let context = StageContext {
            delta_time: params.delta_time,
            quality_factor: sanitize_quality_factor(params.quality_factor),
            output_extent: output.extent,
            downsample_factor: params.downsample_factor,
        };

        let config = &self.config;
        let mut clock = StageClock {
            recorder: &mut self.recorder,
            enabled: config.enable_perf_monitoring,
        };
        if clock.enabled {
            clock.recorder.start_frame();
        }

        let any_stage_enabled = config.enable_upscaling || config.enable_frame_generation || config.enable_anti_aliasing || config.enable_sharpening;
        let result = if any_stage_enabled {
            let result = Self::run_stages(stages, renderer, &mut clock, config, input, output, &context);
            renderer.release_intermediates();
            result
        } else {
            renderer.copy_texture(input.texture, output.texture).map_err(FrameliftError::from)
        };

        let generated_frames = match &result {
            Ok(()) if any_stage_enabled && config.enable_frame_generation => stages.frame_generation.generated_frames().len() as u32,
            _ => 0,
        };

        let mut stats = PerformanceStats {
            input_extent: input.extent,
            output_extent: output.extent,
            generated_frames,
            output_fps: PerformanceStats::estimate_output_fps(params.delta_time, generated_frames),
            ..Default::default()
        };
        if clock.enabled {
            clock.recorder.end_frame();
            let timings = clock.recorder.timings();
            stats.stages = timings.stages;
            stats.total = timings.total;
        }
        self.stats = stats;

        result
    }

    fn run_stages(stages: &mut Stages, renderer: &mut dyn Renderer, clock: &mut StageClock<'_>, config: &PipelineConfig, input: StageTarget, output: StageTarget, context: &StageContext) -> FrameliftResult<()> {
        let mut current = input;

        if config.upscaling.mode.requests_prefilter() {
            current = run_stage(&mut stages.downsample, renderer, clock, current, Destination::Intermediate(DOWNSAMPLE_SLOT), context)?;
        }
        if config.enable_anti_aliasing && config.aa_quality != AaQuality::Off {
            current = run_stage(&mut stages.anti_aliasing, renderer, clock, current, Destination::Intermediate(ANTI_ALIASING_SLOT), context)?;
        }
        if config.enable_upscaling {
            current = run_stage(&mut stages.upscaling, renderer, clock, current, Destination::Intermediate(UPSCALING_SLOT), context)?;
        }
        if config.enable_frame_generation {
            current = run_stage(&mut stages.frame_generation, renderer, clock, current, Destination::Intermediate(FRAME_GENERATION_SLOT), context)?;
        }

        if config.enable_sharpening {
            run_stage(&mut stages.sharpness, renderer, clock, current, Destination::Output(output), context)?;
        } else {
            renderer.copy_texture(current.texture, output.texture).inspect_err(|e| tracing::error!("{}: failed to copy result to output: {e}", Self::NAME))?;
        }
        Ok(())
    }

    /// Replaces the upscaling parameters; sharpening follows the new strength
    pub fn update_upscaling_parameters(&mut self, params: UpscalingParameters) -> FrameliftResult<()> {
        let params = params.sanitized();
        if let Some(stages) = &mut self.stages {
            stages.upscaling.configure(&params);
            stages.sharpness.configure(&mut self.renderer, &params)?;
        }
        self.config.upscaling = params;
        Ok(())
    }

    /// Replaces the frame generation parameters
    pub fn update_frame_gen_parameters(&mut self, params: FrameGenParameters) {
        let params = params.sanitized();
        if let Some(stages) = &mut self.stages {
            stages.frame_generation.configure(&params);
        }
        self.config.frame_generation = params;
    }

    /// Enables or disables the upscaling stage from the next frame on
    pub fn enable_upscaling(&mut self, enabled: bool) {
        self.config.enable_upscaling = enabled;
    }

    /// Enables or disables the frame generation stage from the next frame on
    pub fn enable_frame_generation(&mut self, enabled: bool) {
        self.config.enable_frame_generation = enabled;
    }

    /// Enables or disables the anti-aliasing stage from the next frame on
    pub fn enable_anti_aliasing(&mut self, enabled: bool) {
        self.config.enable_anti_aliasing = enabled;
    }

    /// Enables or disables the sharpening stage from the next frame on
    pub fn enable_sharpening(&mut self, enabled: bool) {
        self.config.enable_sharpening = enabled;
    }

    /// Switches the anti-aliasing quality; [`AaQuality::Off`] skips the stage
    pub fn set_anti_aliasing_quality(&mut self, quality: AaQuality) -> FrameliftResult<()> {
        if let Some(stages) = &mut self.stages {
            stages.anti_aliasing.set_quality(&mut self.renderer, quality)?;
        }
        self.config.aa_quality = quality;
        Ok(())
    }

    /// Sets the number of frames synthesized per rendered frame when the delta time is unknown
    pub fn set_generation_factor(&mut self, factor: i32) -> FrameliftResult<()> {
        let stages = self.stages.as_mut().ok_or(FrameliftError::NotInitialized { component: Self::NAME })?;
        stages.frame_generation.set_generation_factor(factor);
        Ok(())
    }

    /// Sets the downsample factor used ahead of adaptive upscaling
    pub fn set_downsample_factor(&mut self, factor: f32) -> FrameliftResult<()> {
        let stages = self.stages.as_mut().ok_or(FrameliftError::NotInitialized { component: Self::NAME })?;
        stages.downsample.set_factor(&mut self.renderer, factor)
    }

    /// Current configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Statistics of the last processed frame
    pub fn performance_stats(&self) -> &PerformanceStats {
        &self.stats
    }

    /// Frames synthesized during the last processed frame, in time order
    pub fn generated_frames(&self) -> &[TextureHandle] {
        match &self.stages {
            Some(stages) => {
                let frames = stages.frame_generation.generated_frames();
                &frames[..frames.len().min(self.stats.generated_frames as usize)]
            }
            None => &[],
        }
    }

    /// Returns true once frame generation has enough history to interpolate
    pub fn is_frame_generation_ready(&self) -> bool {
        self.stages.as_ref().is_some_and(|stages| stages.frame_generation.is_ready())
    }

    /// The rendering collaborator
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The rendering collaborator, mutably
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Releases every stage and engine; the pipeline must be initialized again before use
    pub fn shutdown(&mut self) {
        if let Some(mut stages) = self.stages.take() {
            stages.release(&mut self.renderer);
            tracing::info!("{}: shut down", Self::NAME);
        }
    }
}

impl<R: Renderer, P: PerfRecorder> Drop for Pipeline<R, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sanitize_quality_factor(quality: f32) -> f32 {
    if quality.is_nan() {
        tracing::warn!("Pipeline: quality factor is NaN, using 1.0");
        return 1.0;
    }
    let clamped = quality.clamp(0.0, 1.0);
    if clamped != quality {
        tracing::warn!("Pipeline: quality factor {quality} out of range, using {clamped}");
    }
    clamped
}
