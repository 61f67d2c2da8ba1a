//! wgpu backend for framelift
//!
//! [`WgpuRenderer`] implements the pipeline's rendering and shader-loading
//! collaborators on a host-provided `wgpu::Device`, and ships WGSL for every
//! program the pipeline loads.
//!
//! ```no_run
//! # fn run(device: wgpu::Device, queue: wgpu::Queue, input: wgpu::Texture, output: wgpu::Texture) -> Result<(), framelift::FrameliftError> {
//! let mut renderer = framelift_wgpu::WgpuRenderer::new(device, queue);
//! let input = renderer.register_texture(input);
//! let output = renderer.register_texture(output);
//!
//! let mut pipeline = framelift::Pipeline::new(renderer);
//! pipeline.initialize(framelift::PipelineConfig::default())?;
//! pipeline.execute(&framelift::FrameParameters {
//!     delta_time: 1.0 / 30.0,
//!     ..framelift::FrameParameters::new(input, output)
//! })?;
//! # Ok(())
//! # }
//! ```

mod pool;
pub mod renderer;
pub mod shaders;

pub use renderer::WgpuRenderer;
