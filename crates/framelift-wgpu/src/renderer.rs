//! [`Renderer`] and [`ShaderLoader`] on top of a wgpu device
//!
//! Handles issued to the pipeline index slab pools of wgpu textures and buffers.
//! Each dispatch binds its parameter blocks at binding `slot`, inputs at
//! [`INPUT_BINDING_BASE`] `+ slot` and outputs at [`OUTPUT_BINDING_BASE`] `+ slot`,
//! with an explicit bind group layout derived from what is actually bound. Compute
//! pipelines are cached per program and layout.

use std::{
    borrow::Cow,
    collections::{HashMap, hash_map::Entry},
};

use framelift::renderer::{
    Binding, BufferDesc, BufferHandle, ComputePass, Extent, ParameterBlockHandle, ProgramDescriptor, ProgramHandle, RenderError, RenderResult, Renderer, Resource, ShaderError,
    ShaderLoader, TextureDesc, TextureFormat, TextureHandle,
};

use crate::{pool::Pool, shaders::BUILTIN_SOURCES};

/// First binding index used for read-only inputs
pub const INPUT_BINDING_BASE: u32 = 8;
/// First binding index used for writable outputs
pub const OUTPUT_BINDING_BASE: u32 = 16;

/// Usage flags of every texture the renderer allocates
///
/// Host textures passed to [`WgpuRenderer::register_texture`] need at least
/// `TEXTURE_BINDING | COPY_SRC` as inputs and `STORAGE_BINDING | COPY_DST` as outputs.
pub const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// Format of the pool-owned intermediate textures
pub const INTERMEDIATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Parameter blocks are padded to a multiple of this many bytes
const PARAMETER_BLOCK_ALIGNMENT: u64 = 16;

/// Maps a slot binding to its bind group index
pub fn binding_index(slot: u32, binding: &Binding) -> u32 {
    match binding {
        Binding::Parameters(_) => slot,
        Binding::Input(_) => INPUT_BINDING_BASE + slot,
        Binding::Output(_) => OUTPUT_BINDING_BASE + slot,
    }
}

/// Maps a requested pixel format to the wgpu format actually allocated
pub fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        // 16-bit one and two channel formats are not storage-capable on baseline devices
        TextureFormat::Rg16Float => wgpu::TextureFormat::Rg32Float,
        TextureFormat::R16Float => wgpu::TextureFormat::R32Float,
    }
}

/// Rounds `size` up to a non-zero multiple of `alignment`
fn aligned_size(size: u64, alignment: u64) -> u64 {
    size.max(1).div_ceil(alignment) * alignment
}

/// Runs `f` inside a validation error scope
fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(error),
        None => Ok(value),
    }
}

fn invalid(kind: &'static str, id: u32) -> RenderError {
    RenderError::InvalidHandle { kind, id }
}

/// Bind group layout entry kind of one bound slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SlotLayout {
    Uniform,
    StorageBuffer { read_only: bool },
    SampledTexture,
    StorageTexture(wgpu::TextureFormat),
}

impl SlotLayout {
    fn entry(self, binding: u32) -> wgpu::BindGroupLayoutEntry {
        let ty = match self {
            SlotLayout::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            SlotLayout::StorageBuffer { read_only } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            // Programs only use textureLoad, so unfilterable float covers every input format
            SlotLayout::SampledTexture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            SlotLayout::StorageTexture(format) => wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
        };

        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty,
            count: None,
        }
    }
}

/// A resolved program: a compiled module and one of its entry points
#[derive(Debug)]
struct Program {
    module: usize,
    entry_point: &'static str,
}

/// A compute pipeline together with its explicit bind group layout
#[derive(Debug)]
struct CachedPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

type PipelineKey = (u32, Vec<(u32, SlotLayout)>);

/// Resource bound to one slot, kept alive until the bind group is created
enum BoundResource<'a> {
    Buffer(&'a wgpu::Buffer),
    View(wgpu::TextureView),
}

/// Rendering and shader-loading collaborator backed by a wgpu device
///
/// The host creates the device and queue. WGSL sources for every built-in program
/// are registered at construction; [`WgpuRenderer::register_shader_source`] replaces
/// or adds sources by identifier.
#[derive(Debug)]
pub struct WgpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sources: HashMap<String, Cow<'static, str>>,
    modules: Vec<wgpu::ShaderModule>,
    module_ids: HashMap<String, usize>,
    programs: Pool<Program>,
    program_ids: HashMap<ProgramDescriptor, ProgramHandle>,
    pipelines: HashMap<PipelineKey, CachedPipeline>,
    textures: Pool<wgpu::Texture>,
    buffers: Pool<wgpu::Buffer>,
    parameter_blocks: Pool<wgpu::Buffer>,
    intermediates: HashMap<usize, TextureHandle>,
    intermediate_cache: HashMap<usize, wgpu::Texture>,
}

impl WgpuRenderer {
    /// Creates a renderer on `device` with the built-in program sources registered
    ///
    /// # Arguments
    /// * `device` - The wgpu device used for resource creation
    /// * `queue` - The queue every dispatch and copy is submitted to
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sources = BUILTIN_SOURCES.iter().map(|(id, wgsl)| (id.to_string(), Cow::Borrowed(*wgsl))).collect();

        Self {
            device,
            queue,
            sources,
            modules: Vec::new(),
            module_ids: HashMap::new(),
            programs: Pool::default(),
            program_ids: HashMap::new(),
            pipelines: HashMap::new(),
            textures: Pool::default(),
            buffers: Pool::default(),
            parameter_blocks: Pool::default(),
            intermediates: HashMap::new(),
            intermediate_cache: HashMap::new(),
        }
    }

    /// The wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The wgpu queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Registers WGSL for source identifier `id`
    ///
    /// Programs already loaded from a previous source for `id` keep using it; programs
    /// loaded afterwards compile the new one.
    pub fn register_shader_source(&mut self, id: impl Into<String>, wgsl: impl Into<Cow<'static, str>>) {
        let id = id.into();
        if self.module_ids.remove(&id).is_some() {
            self.program_ids.retain(|descriptor, _| descriptor.source != id);
            tracing::debug!("WgpuRenderer: replacing compiled shader source {id}");
        }
        self.sources.insert(id, wgsl.into());
    }

    /// Makes a host texture addressable by the pipeline
    ///
    /// Use this for the input and output frames passed to `Pipeline::execute`.
    pub fn register_texture(&mut self, texture: wgpu::Texture) -> TextureHandle {
        TextureHandle::from_raw(self.textures.insert(texture))
    }

    /// Returns the wgpu texture behind `handle`
    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(handle.raw())
    }

    /// Number of live textures, host-registered and intermediate ones included
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live structured buffers and parameter blocks
    pub fn live_buffers(&self) -> usize {
        self.buffers.len() + self.parameter_blocks.len()
    }

    fn texture_ref(&self, handle: TextureHandle) -> RenderResult<&wgpu::Texture> {
        self.textures.get(handle.raw()).ok_or_else(|| invalid("texture", handle.raw()))
    }

    fn allocate_texture(&self, label: &str, extent: Extent, format: wgpu::TextureFormat) -> Result<wgpu::Texture, String> {
        if extent.is_empty() {
            return Err(format!("empty extent {extent}"));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if extent.width > max || extent.height > max {
            return Err(format!("extent {extent} exceeds the device limit of {max}"));
        }

        scoped(&self.device, || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: extent.width,
                    height: extent.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: TEXTURE_USAGE,
                view_formats: &[],
            })
        })
        .map_err(|e| e.to_string())
    }

    fn allocate_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> Result<wgpu::Buffer, String> {
        scoped(&self.device, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        })
        .map_err(|e| e.to_string())
    }

    /// Writes `contents` to the start of `buffer`, zero-padding to the copy alignment
    fn write(queue: &wgpu::Queue, buffer: &wgpu::Buffer, contents: &[u8]) -> RenderResult<()> {
        let padded_len = aligned_size(contents.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        if padded_len > buffer.size() {
            return Err(RenderError::Device(format!("{} bytes do not fit a {} byte buffer", contents.len(), buffer.size())));
        }
        if contents.len() as u64 == padded_len {
            queue.write_buffer(buffer, 0, contents);
        } else {
            let mut padded = contents.to_vec();
            padded.resize(padded_len as usize, 0);
            queue.write_buffer(buffer, 0, &padded);
        }
        Ok(())
    }

    fn create_pipeline(device: &wgpu::Device, label: &str, module: &wgpu::ShaderModule, entry_point: &str, layout: &[(u32, SlotLayout)]) -> Result<CachedPipeline, wgpu::Error> {
        scoped(device, || {
            let entries = layout.iter().map(|(binding, slot)| slot.entry(*binding)).collect::<Vec<_>>();
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor { label: Some(label), entries: &entries });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

            CachedPipeline { pipeline, bind_group_layout }
        })
    }

    fn slot_layout(&self, binding: &Binding) -> RenderResult<SlotLayout> {
        Ok(match binding {
            Binding::Parameters(block) => {
                self.parameter_blocks.get(block.raw()).ok_or_else(|| invalid("parameter block", block.raw()))?;
                SlotLayout::Uniform
            }
            Binding::Input(Resource::Texture(texture)) => {
                self.texture_ref(*texture)?;
                SlotLayout::SampledTexture
            }
            Binding::Input(Resource::Buffer(buffer)) => {
                self.buffers.get(buffer.raw()).ok_or_else(|| invalid("buffer", buffer.raw()))?;
                SlotLayout::StorageBuffer { read_only: true }
            }
            Binding::Output(Resource::Texture(texture)) => SlotLayout::StorageTexture(self.texture_ref(*texture)?.format()),
            Binding::Output(Resource::Buffer(buffer)) => {
                self.buffers.get(buffer.raw()).ok_or_else(|| invalid("buffer", buffer.raw()))?;
                SlotLayout::StorageBuffer { read_only: false }
            }
        })
    }
}

impl ShaderLoader for WgpuRenderer {
    fn load_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramHandle, ShaderError> {
        if let Some(handle) = self.program_ids.get(descriptor) {
            return Ok(*handle);
        }

        let module = match self.module_ids.get(descriptor.source) {
            Some(module) => *module,
            None => {
                let source = self.sources.get(descriptor.source).ok_or_else(|| ShaderError::NotFound(descriptor.source.to_string()))?;
                let module = scoped(&self.device, || {
                    self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(descriptor.source),
                        source: wgpu::ShaderSource::Wgsl(source.clone()),
                    })
                })
                .map_err(|e| ShaderError::Compilation {
                    program: descriptor.to_string(),
                    reason: e.to_string(),
                })?;

                self.modules.push(module);
                let index = self.modules.len() - 1;
                self.module_ids.insert(descriptor.source.to_string(), index);
                index
            }
        };

        // An auto-layout pipeline surfaces a missing or invalid entry point now rather than at the first dispatch
        scoped(&self.device, || {
            self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(descriptor.entry_point),
                layout: None,
                module: &self.modules[module],
                entry_point: Some(descriptor.entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        })
        .map_err(|e| ShaderError::Compilation {
            program: descriptor.to_string(),
            reason: e.to_string(),
        })?;

        let handle = ProgramHandle::from_raw(self.programs.insert(Program {
            module,
            entry_point: descriptor.entry_point,
        }));
        self.program_ids.insert(*descriptor, handle);
        tracing::debug!("WgpuRenderer: loaded {descriptor} as program {}", handle.raw());

        Ok(handle)
    }
}

impl Renderer for WgpuRenderer {
    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        let texture = self
            .allocate_texture(desc.label, desc.extent, texture_format(desc.format))
            .map_err(|reason| RenderError::ResourceCreation { label: desc.label, reason })?;
        Ok(TextureHandle::from_raw(self.textures.insert(texture)))
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle> {
        if desc.size() == 0 {
            return Err(RenderError::ResourceCreation {
                label: desc.label,
                reason: "zero-sized buffer".to_string(),
            });
        }
        let size = aligned_size(desc.size(), wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self
            .allocate_buffer(desc.label, size, wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC)
            .map_err(|reason| RenderError::ResourceCreation { label: desc.label, reason })?;
        Ok(BufferHandle::from_raw(self.buffers.insert(buffer)))
    }

    fn create_parameter_block(&mut self, label: &'static str, contents: &[u8]) -> RenderResult<ParameterBlockHandle> {
        let size = aligned_size(contents.len() as u64, PARAMETER_BLOCK_ALIGNMENT);
        let buffer = self
            .allocate_buffer(label, size, wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST)
            .map_err(|reason| RenderError::ResourceCreation { label, reason })?;
        Self::write(&self.queue, &buffer, contents)?;
        Ok(ParameterBlockHandle::from_raw(self.parameter_blocks.insert(buffer)))
    }

    fn update_parameter_block(&mut self, block: ParameterBlockHandle, contents: &[u8]) -> RenderResult<()> {
        let buffer = self.parameter_blocks.get(block.raw()).ok_or_else(|| invalid("parameter block", block.raw()))?;
        Self::write(&self.queue, buffer, contents)
    }

    fn update_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> RenderResult<()> {
        let target = self.buffers.get(buffer.raw()).ok_or_else(|| invalid("buffer", buffer.raw()))?;
        Self::write(&self.queue, target, contents)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(texture.raw()).is_some() {
            self.intermediates.retain(|_, handle| *handle != texture);
        }
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer.raw());
    }

    fn release_parameter_block(&mut self, block: ParameterBlockHandle) {
        self.parameter_blocks.remove(block.raw());
    }

    fn texture_extent(&self, texture: TextureHandle) -> RenderResult<Extent> {
        let texture = self.texture_ref(texture)?;
        Ok(Extent::new(texture.width(), texture.height()))
    }

    fn dispatch(&mut self, pass: &ComputePass) -> RenderResult<()> {
        let program = self.programs.get(pass.program.raw()).ok_or_else(|| invalid("program", pass.program.raw()))?;

        let limit = self.device.limits().max_compute_workgroups_per_dimension;
        let groups = pass.work_groups;
        if groups.x > limit || groups.y > limit || groups.z > limit {
            return Err(RenderError::Dispatch {
                label: pass.label,
                reason: format!("{}x{}x{} work groups exceed the device limit of {limit}", groups.x, groups.y, groups.z),
            });
        }

        let mut layout = pass
            .bindings
            .iter()
            .map(|(slot, binding)| Ok((binding_index(*slot, binding), self.slot_layout(binding)?)))
            .collect::<RenderResult<Vec<_>>>()?;
        layout.sort_by_key(|(binding, _)| *binding);

        let cached = match self.pipelines.entry((pass.program.raw(), layout)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let module = &self.modules[program.module];
                let pipeline = Self::create_pipeline(&self.device, pass.label, module, program.entry_point, &entry.key().1).map_err(|e| RenderError::Dispatch {
                    label: pass.label,
                    reason: e.to_string(),
                })?;
                entry.insert(pipeline)
            }
        };

        let mut bound = Vec::with_capacity(pass.bindings.len());
        for (slot, binding) in &pass.bindings {
            let resource = match binding {
                Binding::Parameters(block) => BoundResource::Buffer(self.parameter_blocks.get(block.raw()).ok_or_else(|| invalid("parameter block", block.raw()))?),
                Binding::Input(Resource::Buffer(buffer)) | Binding::Output(Resource::Buffer(buffer)) => {
                    BoundResource::Buffer(self.buffers.get(buffer.raw()).ok_or_else(|| invalid("buffer", buffer.raw()))?)
                }
                Binding::Input(Resource::Texture(texture)) | Binding::Output(Resource::Texture(texture)) => {
                    let texture = self.textures.get(texture.raw()).ok_or_else(|| invalid("texture", texture.raw()))?;
                    BoundResource::View(texture.create_view(&wgpu::TextureViewDescriptor::default()))
                }
            };
            bound.push((binding_index(*slot, binding), resource));
        }
        bound.sort_by_key(|(binding, _)| *binding);

        let entries = bound
            .iter()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: match resource {
                    BoundResource::Buffer(buffer) => buffer.as_entire_binding(),
                    BoundResource::View(view) => wgpu::BindingResource::TextureView(view),
                },
            })
            .collect::<Vec<_>>();

        let device = &self.device;
        let queue = &self.queue;
        scoped(device, || {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(pass.label),
                layout: &cached.bind_group_layout,
                entries: &entries,
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(pass.label) });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(pass.label),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&cached.pipeline);
                compute_pass.set_bind_group(0, &bind_group, &[]);
                compute_pass.dispatch_workgroups(groups.x, groups.y, groups.z);
            }
            queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(|e| RenderError::Dispatch {
            label: pass.label,
            reason: e.to_string(),
        })
    }

    fn sync_compute(&mut self) -> RenderResult<()> {
        self.device.poll(wgpu::PollType::Wait).map(|_| ()).map_err(|e| RenderError::Device(e.to_string()))
    }

    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) -> RenderResult<()> {
        let source_texture = self.texture_ref(source)?;
        let destination_texture = self.texture_ref(destination)?;

        let source_extent = Extent::new(source_texture.width(), source_texture.height());
        let destination_extent = Extent::new(destination_texture.width(), destination_texture.height());
        if source_extent != destination_extent {
            return Err(RenderError::ExtentMismatch { source_extent, destination_extent });
        }
        if source_texture.format() != destination_texture.format() {
            return Err(RenderError::Device(format!(
                "cannot copy a {:?} texture into a {:?} texture",
                source_texture.format(),
                destination_texture.format()
            )));
        }

        scoped(&self.device, || {
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Texture Copy") });
            encoder.copy_texture_to_texture(source_texture.as_image_copy(), destination_texture.as_image_copy(), source_texture.size());
            self.queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(|e| RenderError::Device(e.to_string()))
    }

    fn intermediate_texture(&mut self, index: usize, extent: Extent) -> RenderResult<TextureHandle> {
        if let Some(handle) = self.intermediates.get(&index).copied() {
            if self.texture_extent(handle)? == extent {
                return Ok(handle);
            }
            self.textures.remove(handle.raw());
        }

        // Pool textures outlive their handles so steady-state frames allocate nothing
        let texture = match self.intermediate_cache.get(&index) {
            Some(texture) if texture.width() == extent.width && texture.height() == extent.height => texture.clone(),
            _ => {
                let texture = self
                    .allocate_texture(&format!("Intermediate Texture {index}"), extent, INTERMEDIATE_FORMAT)
                    .map_err(|reason| RenderError::ResourceCreation {
                        label: "Intermediate Texture",
                        reason,
                    })?;
                self.intermediate_cache.insert(index, texture.clone());
                texture
            }
        };

        let handle = TextureHandle::from_raw(self.textures.insert(texture));
        self.intermediates.insert(index, handle);
        Ok(handle)
    }

    fn release_intermediates(&mut self) {
        for (_, handle) in self.intermediates.drain() {
            self.textures.remove(handle.raw());
        }
    }
}
