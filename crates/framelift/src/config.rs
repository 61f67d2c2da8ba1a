//! Pipeline configuration and per-frame parameters
//!
//! All configuration types carry documented defaults and deserialize from partial
//! documents, so a host can load only the fields it cares about.

use serde::{Deserialize, Serialize};

use crate::renderer::{Extent, TextureHandle};

/// Upper bound on frames synthesized per rendered frame
pub const MAX_GENERATION_FACTOR: i32 = 7;

/// Upscaling algorithm variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscalingMode {
    /// Standard bicubic resampling
    #[default]
    Bicubic,
    /// Bicubic resampling biased towards the sharper end of the kernel range
    BicubicSharp,
    /// Bicubic resampling with content-adaptive sharpness, preceded by a downsample pre-pass
    BicubicAdaptive,
}

impl UpscalingMode {
    /// Returns the human-readable name of this mode
    pub fn name(&self) -> &'static str {
        match self {
            UpscalingMode::Bicubic => "Bicubic",
            UpscalingMode::BicubicSharp => "Bicubic Sharp",
            UpscalingMode::BicubicAdaptive => "Bicubic Adaptive",
        }
    }

    /// Returns true if this mode runs the downsample pre-pass before anti-aliasing
    pub fn requests_prefilter(&self) -> bool {
        matches!(self, UpscalingMode::BicubicAdaptive)
    }

    /// Maps a sharpness strength in [0, 1] to the bicubic `a` coefficient
    ///
    /// The result is not clamped here; the upscaler clamps it to [-1.0, -0.5].
    pub fn bicubic_coefficient(&self, sharpness_strength: f32, edge_preservation: f32) -> f32 {
        match self {
            UpscalingMode::Bicubic => -0.5 - 0.5 * sharpness_strength,
            UpscalingMode::BicubicSharp => -0.75 - 0.25 * sharpness_strength,
            UpscalingMode::BicubicAdaptive => -0.5 - 0.5 * sharpness_strength * edge_preservation,
        }
    }
}

/// Frame generation algorithm variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameGenMode {
    /// Plain temporal blend between frames
    Interpolation,
    /// Blend along estimated motion vectors
    #[default]
    MotionCompensated,
    /// Motion-compensated blend with additional artifact suppression
    Advanced,
}

impl FrameGenMode {
    /// Value written into the interpolation parameter block
    pub fn shader_value(&self) -> u32 {
        match self {
            FrameGenMode::Interpolation => 0,
            FrameGenMode::MotionCompensated => 1,
            FrameGenMode::Advanced => 2,
        }
    }
}

/// Anti-aliasing quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AaQuality {
    /// Anti-aliasing bypassed with a plain copy
    Off,
    /// Cheapest edge smoothing
    Low,
    /// Balanced edge smoothing
    #[default]
    Medium,
    /// Widest kernel, strongest smoothing
    High,
}

/// Upscaling configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscalingParameters {
    /// Upscaling mode. Default: [`UpscalingMode::Bicubic`]
    pub mode: UpscalingMode,
    /// Sharpness strength in [0, 1]. Default: 0.5
    pub sharpness_strength: f32,
    /// Edge preservation in [0, 1]. Default: 0.7
    pub edge_preservation: f32,
    /// Target resolution; zero on either axis derives it from the output texture. Default: 0×0
    pub target_extent: Extent,
    /// Keep film grain through sharpening. Default: false
    pub preserve_film_grain: bool,
}

impl Default for UpscalingParameters {
    fn default() -> Self {
        Self {
            mode: UpscalingMode::Bicubic,
            sharpness_strength: 0.5,
            edge_preservation: 0.7,
            target_extent: Extent::new(0, 0),
            preserve_film_grain: false,
        }
    }
}

impl UpscalingParameters {
    /// Returns a copy with every ranged field clamped into its valid range
    pub fn sanitized(mut self) -> Self {
        self.sharpness_strength = clamp_unit("sharpness_strength", self.sharpness_strength);
        self.edge_preservation = clamp_unit("edge_preservation", self.edge_preservation);
        self
    }

    /// Resolves the target extent, falling back to `output` when unset
    pub fn resolve_target(&self, output: Extent) -> Extent {
        if self.target_extent.is_empty() { output } else { self.target_extent }
    }
}

/// Frame generation configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameGenParameters {
    /// Generation mode. Default: [`FrameGenMode::MotionCompensated`]
    pub mode: FrameGenMode,
    /// Output frame rate the generator aims for. Default: 60
    pub target_frame_rate: u32,
    /// Motion detection sensitivity in [0, 1]. Default: 0.5
    pub motion_sensitivity: f32,
    /// Artifact reduction strength in [0, 1]. Default: 0.6
    pub artifact_reduction: f32,
    /// Detect scene cuts and avoid blending across them. Default: true
    pub scene_change_detection: bool,
}

impl Default for FrameGenParameters {
    fn default() -> Self {
        Self {
            mode: FrameGenMode::MotionCompensated,
            target_frame_rate: 60,
            motion_sensitivity: 0.5,
            artifact_reduction: 0.6,
            scene_change_detection: true,
        }
    }
}

impl FrameGenParameters {
    /// Returns a copy with every ranged field clamped into its valid range
    pub fn sanitized(mut self) -> Self {
        self.motion_sensitivity = clamp_unit("motion_sensitivity", self.motion_sensitivity);
        self.artifact_reduction = clamp_unit("artifact_reduction", self.artifact_reduction);
        if self.target_frame_rate == 0 {
            tracing::warn!("target_frame_rate must be at least 1, using 1");
            self.target_frame_rate = 1;
        }
        self
    }

    /// Number of frames to synthesize per rendered frame at `delta_time` seconds per frame
    ///
    /// Returns `None` when the delta time carries no information. The result never
    /// exceeds [`MAX_GENERATION_FACTOR`], so a long stall cannot fan out into more
    /// synthesized frames than one call can afford.
    pub fn generation_factor_for(&self, delta_time: f32) -> Option<i32> {
        if delta_time.is_nan() || delta_time <= 0.0 || delta_time.is_infinite() {
            return None;
        }
        let factor = (self.target_frame_rate as f32 * delta_time).round() - 1.0;
        if factor > MAX_GENERATION_FACTOR as f32 {
            tracing::warn!("generation factor {factor} at delta time {delta_time}s exceeds {MAX_GENERATION_FACTOR}, clamping");
            return Some(MAX_GENERATION_FACTOR);
        }
        Some((factor as i32).max(1))
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the bicubic upscale stage. Default: true
    pub enable_upscaling: bool,
    /// Run the frame generation stage. Default: true
    pub enable_frame_generation: bool,
    /// Run the anti-aliasing stage. Default: true
    pub enable_anti_aliasing: bool,
    /// Anti-aliasing quality. Default: [`AaQuality::Medium`]
    pub aa_quality: AaQuality,
    /// Run the sharpening stage. Default: true
    pub enable_sharpening: bool,
    /// Upscaling parameters
    pub upscaling: UpscalingParameters,
    /// Frame generation parameters
    pub frame_generation: FrameGenParameters,
    /// Collect per-stage timings. Default: true
    pub enable_perf_monitoring: bool,
    /// Size of the presented frame; sizes engine-owned buffers at initialization. Default: 1920×1080
    pub display_extent: Extent,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_upscaling: true,
            enable_frame_generation: true,
            enable_anti_aliasing: true,
            aa_quality: AaQuality::Medium,
            enable_sharpening: true,
            upscaling: UpscalingParameters::default(),
            frame_generation: FrameGenParameters::default(),
            enable_perf_monitoring: true,
            display_extent: Extent::new(1920, 1080),
        }
    }
}

impl PipelineConfig {
    /// Returns a copy with nested parameters sanitized
    pub fn sanitized(mut self) -> Self {
        self.upscaling = self.upscaling.sanitized();
        self.frame_generation = self.frame_generation.sanitized();
        if self.display_extent.is_empty() {
            tracing::warn!(extent = %self.display_extent, "display extent is empty, using 1920x1080");
            self.display_extent = Extent::new(1920, 1080);
        }
        self
    }

    /// Extent the frame-generation resources are sized for at initialization
    pub fn frame_extent(&self) -> Extent {
        self.upscaling.resolve_target(self.display_extent)
    }
}

/// Parameters for processing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParameters {
    /// Rendered input frame
    pub input: TextureHandle,
    /// Destination of the enhanced frame
    pub output: TextureHandle,
    /// Seconds elapsed since the previous frame
    pub delta_time: f32,
    /// Dynamic quality factor in [0, 1]
    pub quality_factor: f32,
    /// Downsample factor for this frame only; `None` or a non-positive value keeps the configured one
    pub downsample_factor: Option<f32>,
}

impl FrameParameters {
    /// Parameters for `input` → `output` with full quality and no timing information
    pub fn new(input: TextureHandle, output: TextureHandle) -> Self {
        Self {
            input,
            output,
            delta_time: 0.0,
            quality_factor: 1.0,
            downsample_factor: None,
        }
    }
}

fn clamp_unit(field: &'static str, value: f32) -> f32 {
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    if clamped != value {
        tracing::warn!(parameter = field, value, clamped, "value out of range [0, 1], clamping");
    }
    clamped
}
