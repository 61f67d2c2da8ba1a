//! End-to-end checks on a real device
//!
//! Every test returns early when the machine has no usable adapter.

use framelift::{
    AaQuality, FrameParameters, Pipeline, PipelineConfig,
    programs,
    renderer::{Extent, RenderError, Renderer, ShaderError, ShaderLoader, TextureHandle},
};
use framelift_wgpu::{WgpuRenderer, renderer::TEXTURE_USAGE};

/// f16 bit pattern of 0.5
const HALF_GRAY: u16 = 0x3800;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).with_test_writer().try_init();
}

fn renderer() -> Option<WgpuRenderer> {
    init_logging();
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("framelift test device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: Default::default(),
    }))
    .ok()?;
    Some(WgpuRenderer::new(device, queue))
}

/// Registers an Rgba16Float texture filled with `texel`
fn gray_texture(renderer: &mut WgpuRenderer, extent: Extent, texel: u16) -> TextureHandle {
    let size = wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    };
    let texture = renderer.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: TEXTURE_USAGE,
        view_formats: &[],
    });
    let data = std::iter::repeat_n(texel.to_le_bytes(), (extent.width * extent.height * 4) as usize).flatten().collect::<Vec<_>>();
    renderer.queue().write_texture(
        texture.as_image_copy(),
        &data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(extent.width * 8),
            rows_per_image: Some(extent.height),
        },
        size,
    );
    renderer.register_texture(texture)
}

/// Reads back an Rgba16Float texture as raw f16 bit patterns
///
/// `extent.width * 8` must be a multiple of 256.
fn read_texels(renderer: &WgpuRenderer, handle: TextureHandle) -> Vec<u16> {
    let texture = renderer.texture(handle).unwrap();
    let bytes_per_row = texture.width() * 8;
    let buffer = renderer.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: (bytes_per_row * texture.height()) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = renderer.device().create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback") });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(texture.height()),
            },
        },
        texture.size(),
    );
    renderer.queue().submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |v| sender.send(v).unwrap());
    renderer.device().poll(wgpu::PollType::Wait).unwrap();
    pollster::block_on(receiver.receive()).unwrap().unwrap();

    let data = slice.get_mapped_range();
    data.chunks_exact(2).map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]])).collect()
}

#[test]
fn test_every_builtin_program_loads() {
    let Some(mut renderer) = renderer() else { return };
    for descriptor in programs::ALL {
        let handle = renderer.load_program(descriptor).unwrap();
        assert_eq!(renderer.load_program(descriptor).unwrap(), handle);
    }
}

#[test]
fn test_shader_errors_are_reported() {
    let Some(mut renderer) = renderer() else { return };

    renderer.register_shader_source("sharpen", "fn broken( {");
    assert!(matches!(renderer.load_program(&programs::SHARPEN), Err(ShaderError::Compilation { .. })));

    let mut missing = programs::SHARPEN;
    missing.source = "missing";
    assert!(matches!(renderer.load_program(&missing), Err(ShaderError::NotFound(_))));
}

#[test]
fn test_copy_checks_extents() {
    let Some(mut renderer) = renderer() else { return };
    let small = gray_texture(&mut renderer, Extent::new(32, 32), HALF_GRAY);
    let large = gray_texture(&mut renderer, Extent::new(64, 64), 0);

    assert!(matches!(renderer.copy_texture(small, large), Err(RenderError::ExtentMismatch { .. })));
    assert!(matches!(renderer.copy_texture(small, TextureHandle::from_raw(999)), Err(RenderError::InvalidHandle { .. })));
}

#[test]
fn test_upscale_preserves_flat_color() {
    let Some(mut renderer) = renderer() else { return };
    let input = gray_texture(&mut renderer, Extent::new(32, 32), HALF_GRAY);
    let output = gray_texture(&mut renderer, Extent::new(64, 64), 0);

    let mut pipeline = Pipeline::new(renderer);
    let mut config = PipelineConfig::default();
    config.enable_frame_generation = false;
    config.enable_anti_aliasing = false;
    config.enable_sharpening = false;
    config.aa_quality = AaQuality::Off;
    pipeline.initialize(config).unwrap();
    pipeline.execute(&FrameParameters::new(input, output)).unwrap();

    let texels = read_texels(pipeline.renderer(), output);
    assert_eq!(texels.len(), 64 * 64 * 4);
    assert!(texels.iter().all(|&texel| texel == HALF_GRAY));
}

#[test]
fn test_full_pipeline_generates_frames() {
    let Some(mut renderer) = renderer() else { return };
    let input = gray_texture(&mut renderer, Extent::new(64, 32), HALF_GRAY);
    let output = gray_texture(&mut renderer, Extent::new(128, 64), 0);

    let mut pipeline = Pipeline::new(renderer);
    pipeline.initialize(PipelineConfig::default()).unwrap();
    pipeline.set_generation_factor(2).unwrap();
    for _ in 0..3 {
        pipeline.execute(&FrameParameters::new(input, output)).unwrap();
    }

    let generated = pipeline.generated_frames().to_vec();
    assert_eq!(generated.len(), 2);
    for frame in generated {
        assert_eq!(pipeline.renderer().texture_extent(frame).unwrap(), Extent::new(128, 64));
    }

    pipeline.shutdown();
    assert_eq!(pipeline.renderer().live_buffers(), 0);
    assert_eq!(pipeline.renderer().live_textures(), 2);
}
