//! Motion-compensated frame interpolation engine
//!
//! Motion is estimated in two phases. The first searches a block grid of
//! [`BLOCK_SIZE`]×[`BLOCK_SIZE`] pixel blocks and writes one [`BlockMotion`] per block
//! into an engine-owned buffer; the second upsamples those vectors to a per-pixel
//! motion texture and fills the engine-owned occlusion map. Intermediate frames are
//! then synthesized at evenly spaced time positions between the two source frames,
//! reading that occlusion map when occlusion-aware blending is on.

use crate::{
    config::{FrameGenMode, FrameGenParameters},
    error::{FrameliftError, FrameliftResult},
    programs,
    renderer::{BufferDesc, BufferHandle, ComputePass, Extent, ParameterBlockHandle, ProgramHandle, Renderer, Resource, TextureDesc, TextureFormat, TextureHandle},
};

/// Side length of a motion-estimation block in pixels
pub const BLOCK_SIZE: u32 = 16;
/// Motion search radius in pixels
pub const SEARCH_RADIUS: u32 = 32;
/// Weight of temporal coherence in the block search
pub const TEMPORAL_WEIGHT: f32 = 0.7;
/// Weight of spatial coherence in the block search
pub const SPATIAL_WEIGHT: f32 = 0.3;
/// Quality above which occlusion-aware blending is enabled
pub const OCCLUSION_QUALITY_THRESHOLD: f32 = 0.5;

/// Motion estimate of one block, as laid out in the block-motion buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Zeroable, bytemuck::Pod)]
pub struct BlockMotion {
    /// Displacement in pixels
    pub vector: [f32; 2],
    /// Match confidence in [0, 1]
    pub confidence: f32,
    /// Occlusion estimate in [0, 1]
    pub occlusion: f32,
}

/// Parameter block shared by the estimation and refinement programs
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MotionParams {
    pub frame_width: u32,
    pub frame_height: u32,
    pub block_size: u32,
    pub search_radius: u32,
    pub temporal_weight: f32,
    pub spatial_weight: f32,
    pub motion_sensitivity: f32,
    /// Non-zero when scene cuts should suppress motion
    pub scene_change_detection: u32,
}

/// Parameter block of the interpolation program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct InterpolationParams {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Temporal offset in (0, 1) of the synthesized frame
    pub time_position: f32,
    /// Quality factor in [0, 1]
    pub quality: f32,
    /// Non-zero when occlusion-aware blending is enabled
    pub use_occlusion: u32,
    pub artifact_reduction: f32,
    /// [`FrameGenMode::shader_value`]
    pub mode: u32,
    _padding: u32,
}

/// Time positions of `count` frames evenly spaced strictly between 0 and 1
pub fn time_positions(count: u32) -> impl Iterator<Item = f32> {
    (0..count).map(move |i| (i + 1) as f32 / (count + 1) as f32)
}

/// Number of blocks covering `extent`
pub fn block_grid(extent: Extent) -> Extent {
    extent.tiles(BLOCK_SIZE)
}

fn sanitize_frame_count(count: i32) -> u32 {
    if count < 1 {
        tracing::warn!("{}: invalid generation factor {count}, using default (1)", FrameInterpolationEngine::NAME);
        1
    } else {
        count as u32
    }
}

fn sanitize_quality(quality: f32) -> f32 {
    let clamped = if quality.is_nan() { 0.0 } else { quality.clamp(0.0, 1.0) };
    if clamped != quality {
        tracing::warn!("{}: quality factor {quality} out of range, using {clamped}", FrameInterpolationEngine::NAME);
    }
    clamped
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    mode: FrameGenMode,
    motion_sensitivity: f32,
    artifact_reduction: f32,
    scene_change_detection: bool,
}

impl From<&FrameGenParameters> for Settings {
    fn from(params: &FrameGenParameters) -> Self {
        Self {
            mode: params.mode,
            motion_sensitivity: params.motion_sensitivity,
            artifact_reduction: params.artifact_reduction,
            scene_change_detection: params.scene_change_detection,
        }
    }
}

/// Resources sized from the frame extent
#[derive(Debug)]
struct FrameBuffers {
    block_motion: BufferHandle,
    occlusion: TextureHandle,
}

impl FrameBuffers {
    fn create(renderer: &mut dyn Renderer, extent: Extent) -> FrameliftResult<Self> {
        let grid = block_grid(extent);
        let block_motion = renderer.create_buffer(&BufferDesc {
            label: "BlockMotion",
            element_count: grid.width * grid.height,
            element_size: std::mem::size_of::<BlockMotion>() as u32,
            writable: true,
        })?;

        let occlusion = match renderer.create_texture(&TextureDesc {
            label: "Occlusion",
            extent,
            format: TextureFormat::R16Float,
            writable: true,
        }) {
            Ok(texture) => texture,
            Err(e) => {
                renderer.release_buffer(block_motion);
                return Err(e.into());
            }
        };

        Ok(Self { block_motion, occlusion })
    }

    fn release(self, renderer: &mut dyn Renderer) {
        renderer.release_buffer(self.block_motion);
        renderer.release_texture(self.occlusion);
    }
}

#[derive(Debug)]
struct EngineResources {
    estimation: ProgramHandle,
    refinement: ProgramHandle,
    interpolation: ProgramHandle,
    motion_params: ParameterBlockHandle,
    interpolation_params: ParameterBlockHandle,
    buffers: FrameBuffers,
}

/// Host side of motion estimation and intermediate-frame synthesis
#[derive(Debug)]
pub struct FrameInterpolationEngine {
    resources: Option<EngineResources>,
    extent: Extent,
    settings: Settings,
}

impl FrameInterpolationEngine {
    /// Component name used in logs and errors
    pub const NAME: &'static str = "FrameInterpolation";

    /// Loads the three programs and creates the engine-owned buffers for frames of `extent`
    ///
    /// # Arguments
    /// * `renderer` - Rendering collaborator
    /// * `extent` - Frame size the block-motion buffer and occlusion map are sized for
    /// * `params` - Frame generation parameters forwarded to the programs
    pub fn new(renderer: &mut dyn Renderer, extent: Extent, params: &FrameGenParameters) -> FrameliftResult<Self> {
        let estimation = programs::load(renderer, &programs::MOTION_ESTIMATION, Self::NAME)?;
        let refinement = programs::load(renderer, &programs::MOTION_REFINEMENT, Self::NAME)?;
        let interpolation = programs::load(renderer, &programs::FRAME_INTERPOLATION, Self::NAME)?;

        let settings = Settings::from(params);
        let motion_params = renderer.create_parameter_block("MotionParams", bytemuck::bytes_of(&Self::motion_params(extent, &settings)))?;
        let interpolation_params = match renderer.create_parameter_block("InterpolationParams", bytemuck::bytes_of(&Self::interpolation_params(extent, &settings, 0.5, 0.8))) {
            Ok(block) => block,
            Err(e) => {
                renderer.release_parameter_block(motion_params);
                return Err(e.into());
            }
        };

        let buffers = match FrameBuffers::create(renderer, extent) {
            Ok(buffers) => buffers,
            Err(e) => {
                tracing::error!("{}: failed to create compute buffers: {e}", Self::NAME);
                renderer.release_parameter_block(motion_params);
                renderer.release_parameter_block(interpolation_params);
                return Err(e);
            }
        };

        tracing::info!("{}: successfully initialized for {extent}", Self::NAME);
        Ok(Self {
            resources: Some(EngineResources {
                estimation,
                refinement,
                interpolation,
                motion_params,
                interpolation_params,
                buffers,
            }),
            extent,
            settings,
        })
    }

    /// Frame size the engine-owned buffers are sized for
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Returns true until [`Self::release`] is called
    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Applies new frame generation parameters starting with the next call
    pub fn configure(&mut self, params: &FrameGenParameters) {
        self.settings = Settings::from(params);
    }

    /// Recreates the block-motion buffer and occlusion map for frames of `extent`
    pub fn resize(&mut self, renderer: &mut dyn Renderer, extent: Extent) -> FrameliftResult<()> {
        let resources = self.resources.as_mut().ok_or(FrameliftError::NotInitialized { component: Self::NAME })?;
        if extent == self.extent {
            return Ok(());
        }

        let buffers = FrameBuffers::create(renderer, extent)?;
        std::mem::replace(&mut resources.buffers, buffers).release(renderer);
        tracing::info!("{}: resized from {} to {extent}", Self::NAME, self.extent);
        self.extent = extent;
        Ok(())
    }

    /// Estimates per-pixel motion from `previous` to `current` into `motion`
    ///
    /// Block search runs over the block grid, then refinement upsamples the block
    /// vectors to frame resolution. Each phase is followed by a compute sync.
    pub fn calculate_motion_vectors(&self, renderer: &mut dyn Renderer, previous: TextureHandle, current: TextureHandle, motion: TextureHandle) -> FrameliftResult<()> {
        let resources = self.resources()?;
        if previous.is_null() || current.is_null() || motion.is_null() {
            tracing::error!("{}: invalid input textures", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        renderer.update_parameter_block(resources.motion_params, bytemuck::bytes_of(&Self::motion_params(self.extent, &self.settings)))?;

        let estimate = ComputePass::new("Motion Estimation", resources.estimation)
            .parameters(0, resources.motion_params)
            .input(0, Resource::Texture(previous))
            .input(1, Resource::Texture(current))
            .output(0, Resource::Buffer(resources.buffers.block_motion))
            .covering(block_grid(self.extent));
        renderer.dispatch(&estimate).inspect_err(|e| tracing::error!("{}: failed to calculate block motion: {e}", Self::NAME))?;
        renderer.sync_compute()?;

        let refine = ComputePass::new("Motion Refinement", resources.refinement)
            .parameters(0, resources.motion_params)
            .input(0, Resource::Buffer(resources.buffers.block_motion))
            .input(1, Resource::Texture(previous))
            .input(2, Resource::Texture(current))
            .output(0, Resource::Texture(motion))
            .output(1, Resource::Texture(resources.buffers.occlusion))
            .covering(self.extent);
        renderer.dispatch(&refine).inspect_err(|e| tracing::error!("{}: failed to refine motion vectors: {e}", Self::NAME))?;
        renderer.sync_compute()?;

        Ok(())
    }

    /// Synthesizes `count` intermediate frames between `previous` and `current`
    ///
    /// # Arguments
    /// * `outputs` - Destination textures; frame `i` is written to `outputs[i % outputs.len()]`
    /// * `count` - Number of frames; values below one are replaced by one
    /// * `quality` - Quality factor, clamped to [0, 1]
    ///
    /// # Returns
    /// The number of frames generated. Stops at the first failing frame and reports its time position.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_frames(&self, renderer: &mut dyn Renderer, previous: TextureHandle, current: TextureHandle, motion: TextureHandle, outputs: &[TextureHandle], count: i32, quality: f32) -> FrameliftResult<u32> {
        self.resources()?;
        if previous.is_null() || current.is_null() || motion.is_null() || outputs.is_empty() || outputs.iter().any(|output| output.is_null()) {
            tracing::error!("{}: invalid input textures", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        let count = sanitize_frame_count(count);
        let quality = sanitize_quality(quality);

        for (i, time_position) in time_positions(count).enumerate() {
            let output = outputs[i % outputs.len()];
            self.generate_intermediate_frame(renderer, previous, current, motion, output, time_position, quality).map_err(|e| {
                tracing::error!("{}: failed to generate intermediate frame at time position {time_position:.2}", Self::NAME);
                FrameliftError::Interpolation { time_position, source: Box::new(e) }
            })?;
        }

        Ok(count)
    }

    /// Synthesizes one frame at `time_position` into `output`
    ///
    /// Occlusion-aware blending is enabled only when `quality` exceeds
    /// [`OCCLUSION_QUALITY_THRESHOLD`]. The occlusion map written by the last
    /// [`Self::calculate_motion_vectors`] call is read in that case.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_intermediate_frame(&self, renderer: &mut dyn Renderer, previous: TextureHandle, current: TextureHandle, motion: TextureHandle, output: TextureHandle, time_position: f32, quality: f32) -> FrameliftResult<()> {
        let resources = self.resources()?;
        if previous.is_null() || current.is_null() || motion.is_null() || output.is_null() {
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        let params = Self::interpolation_params(self.extent, &self.settings, time_position, quality);
        renderer.update_parameter_block(resources.interpolation_params, bytemuck::bytes_of(&params))?;

        let pass = ComputePass::new("Frame Interpolation", resources.interpolation)
            .parameters(0, resources.interpolation_params)
            .input(0, Resource::Texture(previous))
            .input(1, Resource::Texture(current))
            .input(2, Resource::Texture(motion))
            .input(3, Resource::Texture(resources.buffers.occlusion))
            .output(0, Resource::Texture(output))
            .covering(self.extent);
        renderer.dispatch(&pass)?;
        renderer.sync_compute()?;

        Ok(())
    }

    /// Releases every engine-owned resource; later calls fail with [`FrameliftError::NotInitialized`]
    pub fn release(&mut self, renderer: &mut dyn Renderer) {
        if let Some(resources) = self.resources.take() {
            renderer.release_parameter_block(resources.motion_params);
            renderer.release_parameter_block(resources.interpolation_params);
            resources.buffers.release(renderer);
            tracing::info!("{}: successfully shut down", Self::NAME);
        }
    }

    fn resources(&self) -> FrameliftResult<&EngineResources> {
        self.resources.as_ref().ok_or_else(|| {
            tracing::error!("{}: not initialized", Self::NAME);
            FrameliftError::NotInitialized { component: Self::NAME }
        })
    }

    fn motion_params(extent: Extent, settings: &Settings) -> MotionParams {
        MotionParams {
            frame_width: extent.width,
            frame_height: extent.height,
            block_size: BLOCK_SIZE,
            search_radius: SEARCH_RADIUS,
            temporal_weight: TEMPORAL_WEIGHT,
            spatial_weight: SPATIAL_WEIGHT,
            motion_sensitivity: settings.motion_sensitivity,
            scene_change_detection: settings.scene_change_detection as u32,
        }
    }

    fn interpolation_params(extent: Extent, settings: &Settings, time_position: f32, quality: f32) -> InterpolationParams {
        InterpolationParams {
            frame_width: extent.width,
            frame_height: extent.height,
            time_position,
            quality,
            use_occlusion: (quality > OCCLUSION_QUALITY_THRESHOLD) as u32,
            artifact_reduction: settings.artifact_reduction,
            mode: settings.mode.shader_value(),
            _padding: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        renderer::{Binding, WorkGroups},
        testing::{Call, RecordingRenderer},
    };

    struct Fixture {
        renderer: RecordingRenderer,
        engine: FrameInterpolationEngine,
        previous: TextureHandle,
        current: TextureHandle,
        motion: TextureHandle,
        output: TextureHandle,
    }

    fn fixture(extent: Extent) -> Fixture {
        let mut renderer = RecordingRenderer::new();
        let engine = FrameInterpolationEngine::new(&mut renderer, extent, &FrameGenParameters::default()).unwrap();
        let previous = renderer.add_texture(extent);
        let current = renderer.add_texture(extent);
        let motion = renderer.add_texture(extent);
        let output = renderer.add_texture(extent);
        renderer.clear_calls();
        Fixture {
            renderer,
            engine,
            previous,
            current,
            motion,
            output,
        }
    }

    fn time_positions_of(renderer: &RecordingRenderer) -> Vec<f32> {
        renderer.parameter_uploads::<InterpolationParams>("InterpolationParams").iter().map(|params| params.time_position).collect()
    }

    #[test]
    fn test_three_frames_are_evenly_spaced() {
        let mut f = fixture(Extent::new(64, 64));
        let generated = f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], 3, 1.0).unwrap();
        assert_eq!(generated, 3);
        assert_eq!(time_positions_of(&f.renderer), [0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_invalid_count_behaves_like_one() {
        for count in [0, -4, 1] {
            let mut f = fixture(Extent::new(64, 64));
            let generated = f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], count, 1.0).unwrap();
            assert_eq!(generated, 1);
            assert_eq!(time_positions_of(&f.renderer), [0.5]);
        }
    }

    #[test]
    fn test_time_positions_never_touch_endpoints() {
        let positions: Vec<f32> = time_positions(7).collect();
        assert_eq!(positions.len(), 7);
        assert!(positions.iter().all(|&t| t > 0.0 && t < 1.0));
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_occlusion_only_above_half_quality() {
        for (quality, expected) in [(0.5, 0), (0.51, 1), (1.0, 1), (0.0, 0), (3.0, 1), (-1.0, 0)] {
            let mut f = fixture(Extent::new(32, 32));
            f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], 1, quality).unwrap();
            let params = f.renderer.parameter_uploads::<InterpolationParams>("InterpolationParams");
            assert_eq!(params[0].use_occlusion, expected, "quality {quality}");
            assert!((0.0..=1.0).contains(&params[0].quality));
        }
    }

    #[test]
    fn test_interpolation_reads_refined_occlusion() {
        let mut f = fixture(Extent::new(32, 32));
        f.engine.calculate_motion_vectors(&mut f.renderer, f.previous, f.current, f.motion).unwrap();
        f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], 1, 1.0).unwrap();

        let calls = f.renderer.dispatch_calls();
        let [_, Call::Dispatch { bindings: refine, .. }, Call::Dispatch { bindings: interpolate, .. }] = calls.as_slice() else {
            panic!("expected three dispatches, got {calls:?}");
        };
        let Some((_, Binding::Output(occlusion))) = refine.iter().find(|(slot, binding)| *slot == 1 && matches!(binding, Binding::Output(_))) else {
            panic!("refinement has no occlusion output");
        };
        assert!(interpolate.contains(&(3, Binding::Input(*occlusion))));
        assert_eq!(interpolate.iter().filter(|(_, binding)| matches!(binding, Binding::Output(_))).count(), 1);
    }

    #[test]
    fn test_frames_rotate_through_outputs() {
        let mut f = fixture(Extent::new(32, 32));
        let second = f.renderer.add_texture(Extent::new(32, 32));
        f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output, second], 3, 1.0).unwrap();

        let written: Vec<_> = f
            .renderer
            .dispatch_calls()
            .iter()
            .filter_map(|call| match call {
                Call::Dispatch { bindings, .. } => bindings.iter().find(|(slot, binding)| *slot == 0 && matches!(binding, Binding::Output(_))).map(|(_, binding)| *binding),
                _ => None,
            })
            .collect();
        assert_eq!(
            written,
            [Binding::Output(Resource::Texture(f.output)), Binding::Output(Resource::Texture(second)), Binding::Output(Resource::Texture(f.output))]
        );
    }

    #[test]
    fn test_motion_runs_two_synchronized_phases() {
        let mut f = fixture(Extent::new(1920, 1080));
        f.engine.calculate_motion_vectors(&mut f.renderer, f.previous, f.current, f.motion).unwrap();

        let phases: Vec<_> = f
            .renderer
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Dispatch { entry_point, work_groups, .. } => Some(format!("{entry_point} {}x{}", work_groups.x, work_groups.y)),
                Call::Sync => Some("sync".to_string()),
                _ => None,
            })
            .collect();
        // 120x68 blocks in 8x8 groups, then 1920x1080 pixels in 8x8 groups
        assert_eq!(phases, ["estimate_motion 15x9", "sync", "refine_motion 240x135", "sync"]);
    }

    #[test]
    fn test_block_grid_rounds_up() {
        assert_eq!(block_grid(Extent::new(1920, 1080)), Extent::new(120, 68));
        assert_eq!(block_grid(Extent::new(17, 1)), Extent::new(2, 1));

        let mut renderer = RecordingRenderer::new();
        let engine = FrameInterpolationEngine::new(&mut renderer, Extent::new(100, 50), &FrameGenParameters::default()).unwrap();
        let block_motion = engine.resources.as_ref().unwrap().buffers.block_motion;
        let desc = renderer.buffer_desc(block_motion);
        assert_eq!(desc.element_count, 7 * 4);
        assert_eq!(desc.element_size, 16);
    }

    #[test]
    fn test_motion_params_carry_settings() {
        let mut f = fixture(Extent::new(64, 32));
        f.engine.configure(&FrameGenParameters {
            motion_sensitivity: 0.9,
            scene_change_detection: false,
            artifact_reduction: 0.2,
            mode: FrameGenMode::Advanced,
            ..Default::default()
        });
        f.engine.calculate_motion_vectors(&mut f.renderer, f.previous, f.current, f.motion).unwrap();
        f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], 1, 1.0).unwrap();

        let motion = f.renderer.parameter_uploads::<MotionParams>("MotionParams")[0];
        assert_eq!((motion.frame_width, motion.frame_height), (64, 32));
        assert_eq!((motion.block_size, motion.search_radius), (16, 32));
        assert_eq!((motion.temporal_weight, motion.spatial_weight), (0.7, 0.3));
        assert_eq!(motion.motion_sensitivity, 0.9);
        assert_eq!(motion.scene_change_detection, 0);

        let interpolation = f.renderer.parameter_uploads::<InterpolationParams>("InterpolationParams")[0];
        assert_eq!(interpolation.artifact_reduction, 0.2);
        assert_eq!(interpolation.mode, 2);
    }

    #[test]
    fn test_failure_reports_time_position() {
        let mut f = fixture(Extent::new(32, 32));
        f.renderer.fail_dispatch = Some("interpolate");
        let err = f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], 3, 1.0).unwrap_err();
        match err {
            FrameliftError::Interpolation { time_position, .. } => assert_eq!(time_position, 0.25),
            other => panic!("unexpected error: {other}"),
        }
        assert!(f.renderer.dispatched().is_empty());
    }

    #[test]
    fn test_resize_recreates_buffers() {
        let mut f = fixture(Extent::new(32, 32));
        let before = f.engine.resources.as_ref().unwrap().buffers.block_motion;
        f.engine.resize(&mut f.renderer, Extent::new(64, 48)).unwrap();
        assert_eq!(f.engine.extent(), Extent::new(64, 48));
        let after = f.engine.resources.as_ref().unwrap().buffers.block_motion;
        assert_ne!(before, after);
        assert_eq!(f.renderer.buffer_desc(after).element_count, 4 * 3);
        assert_eq!(f.renderer.live_textures("Occlusion"), 1);

        f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[f.output], 1, 1.0).unwrap();
        match f.renderer.dispatch_calls().as_slice() {
            [Call::Dispatch { work_groups, .. }] => assert_eq!(*work_groups, WorkGroups { x: 8, y: 6, z: 1 }),
            other => panic!("unexpected dispatches: {other:?}"),
        }
    }

    #[test]
    fn test_release_then_calls_fail() {
        let mut f = fixture(Extent::new(32, 32));
        f.engine.release(&mut f.renderer);
        assert!(!f.engine.is_initialized());
        assert_eq!(f.renderer.live_buffers(), 0);
        assert_eq!(f.renderer.live_parameter_blocks(), 0);
        assert!(matches!(
            f.engine.calculate_motion_vectors(&mut f.renderer, f.previous, f.current, f.motion),
            Err(FrameliftError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_null_textures_are_rejected() {
        let mut f = fixture(Extent::new(32, 32));
        assert!(matches!(
            f.engine.generate_frames(&mut f.renderer, TextureHandle::NULL, f.current, f.motion, &[f.output], 1, 1.0),
            Err(FrameliftError::NullTexture { .. })
        ));
        assert!(matches!(
            f.engine.generate_frames(&mut f.renderer, f.previous, f.current, f.motion, &[], 1, 1.0),
            Err(FrameliftError::NullTexture { .. })
        ));
        assert!(f.renderer.dispatched().is_empty());
    }
}
