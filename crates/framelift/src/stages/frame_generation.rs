use super::{Stage, StageContext, StageTarget};
use crate::{
    algorithms::FrameInterpolationEngine,
    config::{FrameGenParameters, MAX_GENERATION_FACTOR},
    error::{FrameliftError, FrameliftResult},
    renderer::{Extent, Renderer, TextureDesc, TextureFormat, TextureHandle},
};

/// Number of previous frames retained
pub const HISTORY_LEN: usize = 2;

/// Stateful wrapper around [`FrameInterpolationEngine`]
///
/// Keeps a two-slot history of previous frames, oldest first, in stage-owned
/// textures. Motion is estimated between the most recent retained frame and the
/// current one. The stage is ready to interpolate once slot 0 holds a frame, that
/// is from the second processed frame onward. The current frame always reaches the
/// stage output, whatever happens to motion estimation or interpolation.
#[derive(Debug)]
pub struct FrameGenerationStage {
    engine: FrameInterpolationEngine,
    params: FrameGenParameters,
    generation_factor: i32,
    history: [TextureHandle; HISTORY_LEN],
    motion: TextureHandle,
    generated: Vec<TextureHandle>,
    generated_count: usize,
}

impl FrameGenerationStage {
    /// Stage name
    pub const NAME: &'static str = "FrameGeneration";

    /// Wraps an initialized engine and creates the motion-vector texture at the engine's extent
    pub fn new(renderer: &mut dyn Renderer, mut engine: FrameInterpolationEngine, params: &FrameGenParameters) -> FrameliftResult<Self> {
        let motion = Self::create_motion_texture(renderer, engine.extent()).inspect_err(|_| engine.release(renderer))?;
        let mut stage = Self {
            engine,
            params: params.sanitized(),
            generation_factor: 1,
            history: [TextureHandle::NULL; HISTORY_LEN],
            motion,
            generated: Vec::new(),
            generated_count: 0,
        };
        stage.engine.configure(&stage.params);
        Ok(stage)
    }

    /// Returns true once two frames have been processed
    pub fn is_ready(&self) -> bool {
        self.engine.is_initialized() && !self.history[0].is_null()
    }

    /// Number of frames currently retained in history
    pub fn history_len(&self) -> usize {
        self.history.iter().filter(|frame| !frame.is_null()).count()
    }

    /// Sets how many frames are synthesized per rendered frame when no delta time is supplied
    ///
    /// Values below one are replaced by one, values above [`MAX_GENERATION_FACTOR`] by the maximum.
    pub fn set_generation_factor(&mut self, factor: i32) {
        if factor < 1 {
            tracing::warn!("{}: invalid generation factor {factor}, using default (1)", Self::NAME);
            self.generation_factor = 1;
            return;
        }
        if factor > MAX_GENERATION_FACTOR {
            tracing::warn!("{}: generation factor {factor} exceeds {MAX_GENERATION_FACTOR}, clamping", Self::NAME);
            self.generation_factor = MAX_GENERATION_FACTOR;
            return;
        }
        self.generation_factor = factor;
        tracing::info!("{}: generation factor set to {factor}", Self::NAME);
    }

    /// Configured generation factor
    pub fn generation_factor(&self) -> i32 {
        self.generation_factor
    }

    /// Applies new parameters starting with the next frame
    pub fn configure(&mut self, params: &FrameGenParameters) {
        self.params = params.sanitized();
        self.engine.configure(&self.params);
    }

    /// Textures holding the frames synthesized for the last processed frame, in time order
    pub fn generated_frames(&self) -> &[TextureHandle] {
        &self.generated[..self.generated_count.min(self.generated.len())]
    }

    /// Drops every retained frame; the stage is not ready until two more frames arrive
    pub fn reset_history(&mut self, renderer: &mut dyn Renderer) {
        for frame in &mut self.history {
            if !frame.is_null() {
                renderer.release_texture(std::mem::replace(frame, TextureHandle::NULL));
            }
        }
        self.generated_count = 0;
    }

    fn create_motion_texture(renderer: &mut dyn Renderer, extent: Extent) -> FrameliftResult<TextureHandle> {
        Ok(renderer.create_texture(&TextureDesc {
            label: "MotionVectors",
            extent,
            format: TextureFormat::Rg16Float,
            writable: true,
        })?)
    }

    fn frame_texture(renderer: &mut dyn Renderer, label: &'static str, extent: Extent) -> FrameliftResult<TextureHandle> {
        Ok(renderer.create_texture(&TextureDesc {
            label,
            extent,
            format: TextureFormat::Rgba16Float,
            writable: true,
        })?)
    }

    /// Resizes the engine and motion texture for `extent`, dropping history and generated frames
    ///
    /// A motion texture lost to an earlier failed resize is recreated even when the
    /// extent is unchanged.
    fn adapt_to_extent(&mut self, renderer: &mut dyn Renderer, extent: Extent) -> FrameliftResult<()> {
        if extent == self.engine.extent() {
            if self.motion.is_null() {
                self.motion = Self::create_motion_texture(renderer, extent)?;
            }
            return Ok(());
        }

        tracing::info!("{}: frame size changed from {} to {extent}, resetting history", Self::NAME, self.engine.extent());
        self.engine.resize(renderer, extent)?;
        self.reset_history(renderer);
        self.release_generated(renderer);
        if !self.motion.is_null() {
            renderer.release_texture(std::mem::replace(&mut self.motion, TextureHandle::NULL));
        }
        self.motion = Self::create_motion_texture(renderer, extent)?;
        Ok(())
    }

    fn ensure_generated(&mut self, renderer: &mut dyn Renderer, count: usize, extent: Extent) -> FrameliftResult<()> {
        if self.generated.len() == count {
            return Ok(());
        }
        self.release_generated(renderer);
        for _ in 0..count {
            let texture = Self::frame_texture(renderer, "GeneratedFrame", extent)?;
            self.generated.push(texture);
        }
        Ok(())
    }

    fn release_generated(&mut self, renderer: &mut dyn Renderer) {
        for texture in self.generated.drain(..) {
            renderer.release_texture(texture);
        }
        self.generated_count = 0;
    }

    /// Factor for this frame: derived from the target rate when the delta time is known
    fn effective_factor(&self, delta_time: f32) -> i32 {
        self.params.generation_factor_for(delta_time).unwrap_or(self.generation_factor)
    }

    /// Synthesizes frames between history slot 1 and `current`
    ///
    /// Only called once the stage is ready, so the first interpolated frame is the third one processed.
    fn interpolate(&mut self, renderer: &mut dyn Renderer, current: TextureHandle, factor: i32, quality: f32) {
        let previous = self.history[1];
        match self.engine.generate_frames(renderer, previous, current, self.motion, &self.generated, factor, quality) {
            Ok(count) => self.generated_count = count as usize,
            Err(e) => {
                tracing::warn!("{}: failed to generate intermediate frames: {e}", Self::NAME);
                self.generated_count = 0;
            }
        }
    }

    /// Evicts slot 0, shifts slot 1 down and copies `current` into the recycled texture
    fn push_history(&mut self, renderer: &mut dyn Renderer, current: StageTarget) -> FrameliftResult<()> {
        let recycled = match self.history[0] {
            texture if texture.is_null() => Self::frame_texture(renderer, "FrameHistory", current.extent)?,
            texture => texture,
        };
        self.history[0] = self.history[1];
        self.history[1] = recycled;
        renderer.copy_texture(current.texture, recycled)?;
        Ok(())
    }
}

impl Stage for FrameGenerationStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn output_extent(&self, input: Extent, _context: &StageContext) -> Extent {
        input
    }

    fn process(&mut self, renderer: &mut dyn Renderer, input: StageTarget, output: StageTarget, context: &StageContext) -> FrameliftResult<()> {
        if !self.engine.is_initialized() {
            tracing::error!("{}: not initialized", Self::NAME);
            return Err(FrameliftError::NotInitialized { component: Self::NAME });
        }
        if input.texture.is_null() || output.texture.is_null() {
            tracing::error!("{}: invalid input or output texture", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        self.adapt_to_extent(renderer, input.extent)?;
        let factor = self.effective_factor(context.delta_time);
        self.ensure_generated(renderer, factor.max(1) as usize, input.extent)?;
        self.generated_count = 0;

        if !self.history[1].is_null() {
            if let Err(e) = self.engine.calculate_motion_vectors(renderer, self.history[1], input.texture, self.motion) {
                tracing::warn!("{}: failed to update motion vectors: {e}", Self::NAME);
            }
        }

        if self.is_ready() {
            self.interpolate(renderer, input.texture, factor, context.quality_factor);
        }

        self.push_history(renderer, input)?;
        renderer.copy_texture(input.texture, output.texture).inspect_err(|e| tracing::error!("{}: failed to copy resource: {e}", Self::NAME))?;
        Ok(())
    }

    fn release(&mut self, renderer: &mut dyn Renderer) {
        self.reset_history(renderer);
        self.release_generated(renderer);
        if !self.motion.is_null() {
            renderer.release_texture(std::mem::replace(&mut self.motion, TextureHandle::NULL));
        }
        self.engine.release(renderer);
    }
}
