//! Built-in WGSL sources for every program the pipeline loads
//!
//! Each source declares parameter blocks at binding `slot`, read-only inputs at
//! `8 + slot` and writable outputs at `16 + slot`, matching the layout the renderer
//! builds for a [`ComputePass`](framelift::renderer::ComputePass).

/// `(source identifier, WGSL)` pairs
pub const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("bicubic_upscale", include_str!("../shaders/bicubic_upscale.wgsl")),
    ("frame_generation", include_str!("../shaders/frame_generation.wgsl")),
    ("anti_aliasing", include_str!("../shaders/anti_aliasing.wgsl")),
    ("downsample", include_str!("../shaders/downsample.wgsl")),
    ("sharpen", include_str!("../shaders/sharpen.wgsl")),
];
