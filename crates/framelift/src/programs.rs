//! Compute programs used by the pipeline
//!
//! Each pass resolves exactly one of these descriptors through the
//! [`ShaderLoader`](crate::renderer::ShaderLoader) at initialization. The host's
//! shader collaborator decides what the source identifiers map to.

use crate::{
    error::FrameliftResult,
    renderer::{ProgramDescriptor, ProgramHandle, ShaderLoader},
};

/// Target profile every program is compiled for
pub const COMPUTE_PROFILE: &str = "cs_5_0";

/// Bicubic resampling from the weight table
pub const BICUBIC_UPSCALE: ProgramDescriptor = ProgramDescriptor {
    source: "bicubic_upscale",
    entry_point: "upscale",
    profile: COMPUTE_PROFILE,
};

/// Block-grid motion search between two frames
pub const MOTION_ESTIMATION: ProgramDescriptor = ProgramDescriptor {
    source: "frame_generation",
    entry_point: "estimate_motion",
    profile: COMPUTE_PROFILE,
};

/// Upsampling of block motion to a per-pixel motion texture
pub const MOTION_REFINEMENT: ProgramDescriptor = ProgramDescriptor {
    source: "frame_generation",
    entry_point: "refine_motion",
    profile: COMPUTE_PROFILE,
};

/// Motion-compensated synthesis of one intermediate frame
pub const FRAME_INTERPOLATION: ProgramDescriptor = ProgramDescriptor {
    source: "frame_generation",
    entry_point: "interpolate",
    profile: COMPUTE_PROFILE,
};

/// Edge-aware anti-aliasing filter
pub const ANTI_ALIASING: ProgramDescriptor = ProgramDescriptor {
    source: "anti_aliasing",
    entry_point: "anti_alias",
    profile: COMPUTE_PROFILE,
};

/// Detail-preserving downsample pre-filter
pub const DOWNSAMPLE: ProgramDescriptor = ProgramDescriptor {
    source: "downsample",
    entry_point: "downsample",
    profile: COMPUTE_PROFILE,
};

/// Contrast-adaptive sharpening
pub const SHARPEN: ProgramDescriptor = ProgramDescriptor {
    source: "sharpen",
    entry_point: "sharpen",
    profile: COMPUTE_PROFILE,
};

/// Every program the pipeline may load, in initialization order
pub const ALL: &[ProgramDescriptor] = &[BICUBIC_UPSCALE, MOTION_ESTIMATION, MOTION_REFINEMENT, FRAME_INTERPOLATION, DOWNSAMPLE, ANTI_ALIASING, SHARPEN];

/// Resolves `descriptor`, logging the failure under `component`
pub(crate) fn load(loader: &mut (impl ShaderLoader + ?Sized), descriptor: &ProgramDescriptor, component: &'static str) -> FrameliftResult<ProgramHandle> {
    loader.load_program(descriptor).map_err(|e| {
        tracing::error!("{component}: failed to load {descriptor}: {e}");
        e.into()
    })
}
