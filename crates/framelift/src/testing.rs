//! In-memory rendering collaborator for unit tests
//!
//! Issues handles, keeps parameter-block and buffer contents, and records every
//! call the pipeline makes so tests can assert on dispatch order, copies and uploads.

use std::collections::HashMap;

use crate::renderer::*;

/// A call observed by [`RecordingRenderer`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateTexture { label: &'static str, extent: Extent },
    ReleaseTexture(TextureHandle),
    UpdateParameters { label: &'static str, contents: Vec<u8> },
    UpdateBuffer { label: &'static str, contents: Vec<u8> },
    Dispatch { label: &'static str, entry_point: &'static str, bindings: Vec<(u32, Binding)>, work_groups: WorkGroups },
    Sync,
    Copy { source: TextureHandle, destination: TextureHandle },
    Intermediate { index: usize, extent: Extent, texture: TextureHandle },
    ReleaseIntermediates,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    next_id: u32,
    textures: HashMap<u32, TextureDesc>,
    buffers: HashMap<u32, (BufferDesc, Vec<u8>)>,
    blocks: HashMap<u32, (&'static str, Vec<u8>)>,
    programs: HashMap<u32, ProgramDescriptor>,
    intermediates: Vec<TextureHandle>,
    pub calls: Vec<Call>,
    /// Entry point whose load fails
    pub fail_load: Option<&'static str>,
    /// Entry point whose dispatch fails
    pub fail_dispatch: Option<&'static str>,
    /// Label of a texture whose creation fails
    pub fail_texture: Option<&'static str>,
    /// Label of a buffer whose creation fails
    pub fail_buffer: Option<&'static str>,
    /// Label of a buffer whose uploads fail
    pub fail_upload: Option<&'static str>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Registers a host-owned texture of `extent`
    pub fn add_texture(&mut self, extent: Extent) -> TextureHandle {
        let id = self.issue();
        self.textures.insert(
            id,
            TextureDesc {
                label: "Host",
                extent,
                format: TextureFormat::Rgba8Unorm,
                writable: true,
            },
        );
        TextureHandle::from_raw(id)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Entry points of every dispatch, in order
    pub fn dispatched(&self) -> Vec<&'static str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Dispatch { entry_point, .. } => Some(*entry_point),
                _ => None,
            })
            .collect()
    }

    pub fn dispatch_calls(&self) -> Vec<&Call> {
        self.calls.iter().filter(|call| matches!(call, Call::Dispatch { .. })).collect()
    }

    pub fn copies(&self) -> Vec<(TextureHandle, TextureHandle)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Copy { source, destination } => Some((*source, *destination)),
                _ => None,
            })
            .collect()
    }

    pub fn sync_count(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, Call::Sync)).count()
    }

    /// Contents of every upload to parameter blocks labelled `label`, in order
    pub fn parameter_uploads<T: bytemuck::Pod>(&self, label: &str) -> Vec<T> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::UpdateParameters { label: l, contents } if *l == label => Some(bytemuck::pod_read_unaligned(contents)),
                _ => None,
            })
            .collect()
    }

    pub fn buffer_upload_count(&self, label: &str) -> usize {
        self.calls.iter().filter(|call| matches!(call, Call::UpdateBuffer { label: l, .. } if *l == label)).count()
    }

    /// Current contents of a parameter block
    pub fn parameters<T: bytemuck::Pod>(&self, block: ParameterBlockHandle) -> T {
        bytemuck::pod_read_unaligned(&self.blocks[&block.raw()].1)
    }

    /// Current contents of a buffer as `T` elements
    pub fn buffer_contents<T: bytemuck::Pod>(&self, buffer: BufferHandle) -> Vec<T> {
        self.buffers[&buffer.raw()].1.chunks_exact(std::mem::size_of::<T>()).map(bytemuck::pod_read_unaligned).collect()
    }

    pub fn buffer_desc(&self, buffer: BufferHandle) -> &BufferDesc {
        &self.buffers[&buffer.raw()].0
    }

    pub fn texture_desc(&self, texture: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(&texture.raw())
    }

    pub fn is_live(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture.raw())
    }

    /// Number of live textures with `label`
    pub fn live_textures(&self, label: &str) -> usize {
        self.textures.values().filter(|desc| desc.label == label).count()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_parameter_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn check_resource(&self, resource: &Resource) -> RenderResult<()> {
        match resource {
            Resource::Texture(handle) if self.textures.contains_key(&handle.raw()) => Ok(()),
            Resource::Buffer(handle) if self.buffers.contains_key(&handle.raw()) => Ok(()),
            Resource::Texture(handle) => Err(RenderError::InvalidHandle { kind: "texture", id: handle.raw() }),
            Resource::Buffer(handle) => Err(RenderError::InvalidHandle { kind: "buffer", id: handle.raw() }),
        }
    }
}

impl ShaderLoader for RecordingRenderer {
    fn load_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramHandle, ShaderError> {
        if self.fail_load == Some(descriptor.entry_point) {
            return Err(ShaderError::NotFound(descriptor.source.to_string()));
        }
        let id = self.issue();
        self.programs.insert(id, *descriptor);
        Ok(ProgramHandle::from_raw(id))
    }
}

impl Renderer for RecordingRenderer {
    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle> {
        if self.fail_texture == Some(desc.label) {
            return Err(RenderError::ResourceCreation {
                label: desc.label,
                reason: "out of memory".into(),
            });
        }
        let id = self.issue();
        self.textures.insert(id, desc.clone());
        self.calls.push(Call::CreateTexture { label: desc.label, extent: desc.extent });
        Ok(TextureHandle::from_raw(id))
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle> {
        if self.fail_buffer == Some(desc.label) {
            return Err(RenderError::ResourceCreation {
                label: desc.label,
                reason: "out of memory".into(),
            });
        }
        let id = self.issue();
        self.buffers.insert(id, (desc.clone(), vec![0; desc.size() as usize]));
        Ok(BufferHandle::from_raw(id))
    }

    fn create_parameter_block(&mut self, label: &'static str, contents: &[u8]) -> RenderResult<ParameterBlockHandle> {
        let id = self.issue();
        self.blocks.insert(id, (label, contents.to_vec()));
        Ok(ParameterBlockHandle::from_raw(id))
    }

    fn update_parameter_block(&mut self, block: ParameterBlockHandle, contents: &[u8]) -> RenderResult<()> {
        let (label, stored) = self.blocks.get_mut(&block.raw()).ok_or(RenderError::InvalidHandle {
            kind: "parameter block",
            id: block.raw(),
        })?;
        *stored = contents.to_vec();
        self.calls.push(Call::UpdateParameters {
            label: *label,
            contents: contents.to_vec(),
        });
        Ok(())
    }

    fn update_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> RenderResult<()> {
        let (desc, stored) = self.buffers.get_mut(&buffer.raw()).ok_or(RenderError::InvalidHandle { kind: "buffer", id: buffer.raw() })?;
        if self.fail_upload == Some(desc.label) {
            return Err(RenderError::Device("lost".into()));
        }
        stored[..contents.len()].copy_from_slice(contents);
        self.calls.push(Call::UpdateBuffer {
            label: desc.label,
            contents: contents.to_vec(),
        });
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.raw());
        self.calls.push(Call::ReleaseTexture(texture));
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.raw());
    }

    fn release_parameter_block(&mut self, block: ParameterBlockHandle) {
        self.blocks.remove(&block.raw());
    }

    fn texture_extent(&self, texture: TextureHandle) -> RenderResult<Extent> {
        self.textures
            .get(&texture.raw())
            .map(|desc| desc.extent)
            .ok_or(RenderError::InvalidHandle { kind: "texture", id: texture.raw() })
    }

    fn dispatch(&mut self, pass: &ComputePass) -> RenderResult<()> {
        let program = self.programs.get(&pass.program.raw()).ok_or(RenderError::InvalidHandle {
            kind: "program",
            id: pass.program.raw(),
        })?;
        let entry_point = program.entry_point;
        if self.fail_dispatch == Some(entry_point) {
            return Err(RenderError::Dispatch {
                label: pass.label,
                reason: "device removed".into(),
            });
        }
        for (_, binding) in &pass.bindings {
            match binding {
                Binding::Parameters(block) if !self.blocks.contains_key(&block.raw()) => {
                    return Err(RenderError::InvalidHandle {
                        kind: "parameter block",
                        id: block.raw(),
                    });
                }
                Binding::Parameters(_) => {}
                Binding::Input(resource) | Binding::Output(resource) => self.check_resource(resource)?,
            }
        }
        self.calls.push(Call::Dispatch {
            label: pass.label,
            entry_point,
            bindings: pass.bindings.clone(),
            work_groups: pass.work_groups,
        });
        Ok(())
    }

    fn sync_compute(&mut self) -> RenderResult<()> {
        self.calls.push(Call::Sync);
        Ok(())
    }

    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) -> RenderResult<()> {
        let source_extent = self.texture_extent(source)?;
        let destination_extent = self.texture_extent(destination)?;
        if source_extent != destination_extent {
            return Err(RenderError::ExtentMismatch { source_extent, destination_extent });
        }
        self.calls.push(Call::Copy { source, destination });
        Ok(())
    }

    fn intermediate_texture(&mut self, index: usize, extent: Extent) -> RenderResult<TextureHandle> {
        let id = self.issue();
        self.textures.insert(
            id,
            TextureDesc {
                label: "Intermediate",
                extent,
                format: TextureFormat::Rgba16Float,
                writable: true,
            },
        );
        let texture = TextureHandle::from_raw(id);
        self.intermediates.push(texture);
        self.calls.push(Call::Intermediate { index, extent, texture });
        Ok(texture)
    }

    fn release_intermediates(&mut self) {
        for texture in self.intermediates.drain(..) {
            self.textures.remove(&texture.raw());
        }
        self.calls.push(Call::ReleaseIntermediates);
    }
}
