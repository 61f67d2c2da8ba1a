//! Collaborator capabilities consumed by the pipeline
//!
//! The pipeline never touches a GPU API directly. Everything it needs from the
//! device (resource creation, parameter uploads, compute dispatch, synchronization
//! and copies) goes through the [`Renderer`] trait, and compute programs are
//! resolved through [`ShaderLoader`]. Resources are referred to by opaque handles
//! issued by the renderer's resource pool; stages hold handles, never the resources.

/// Compute shader workgroup size in X dimension
pub const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Compute shader workgroup size in Y dimension
pub const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// The handle that never refers to a live resource
            pub const NULL: Self = Self(0);

            /// Wraps a raw pool id. Id `0` is reserved for [`Self::NULL`].
            pub const fn from_raw(id: u32) -> Self {
                Self(id)
            }

            /// Returns the raw pool id
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Returns true if this is the null handle
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

resource_handle!(
    /// Handle to a GPU-resident 2D image
    TextureHandle
);
resource_handle!(
    /// Handle to a structured (storage) buffer
    BufferHandle
);
resource_handle!(
    /// Handle to a small fixed-layout parameter block (uniform buffer)
    ParameterBlockHandle
);
resource_handle!(
    /// Handle to a resolved compute program
    ProgramHandle
);

/// Width and height of an image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Extent {
    /// Creates a new extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either dimension is zero
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scales both dimensions by `factor`, never going below one pixel
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            width: ((self.width as f32 * factor).round() as u32).max(1),
            height: ((self.height as f32 * factor).round() as u32).max(1),
        }
    }

    /// Number of `tile`×`tile` cells needed to cover this extent, rounding up on each axis
    pub const fn tiles(&self, tile: u32) -> Extent {
        Extent {
            width: self.width.div_ceil(tile),
            height: self.height.div_ceil(tile),
        }
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats the pipeline asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA color
    Rgba8Unorm,
    /// 16-bit float RGBA color, used for frames flowing between stages
    Rgba16Float,
    /// Two-channel float, used for per-pixel motion vectors
    Rg16Float,
    /// Single-channel float, used for occlusion maps
    R16Float,
}

/// Description of a texture to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label
    pub label: &'static str,
    /// Size in pixels
    pub extent: Extent,
    /// Pixel format
    pub format: TextureFormat,
    /// Whether compute programs may write to the texture
    pub writable: bool,
}

/// Description of a structured buffer to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug label
    pub label: &'static str,
    /// Number of elements
    pub element_count: u32,
    /// Size of one element in bytes
    pub element_size: u32,
    /// Whether compute programs may write to the buffer
    pub writable: bool,
}

impl BufferDesc {
    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.element_count as u64 * self.element_size as u64
    }
}

/// Identifies a compute program by source, entry point and target profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramDescriptor {
    /// Source identifier (file or module name)
    pub source: &'static str,
    /// Entry point within the source
    pub entry_point: &'static str,
    /// Target profile
    pub profile: &'static str,
}

impl std::fmt::Display for ProgramDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.source, self.entry_point, self.profile)
    }
}

/// A bindable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A texture
    Texture(TextureHandle),
    /// A structured buffer
    Buffer(BufferHandle),
}

impl Resource {
    /// Returns true if the underlying handle is null
    pub fn is_null(&self) -> bool {
        match self {
            Resource::Texture(handle) => handle.is_null(),
            Resource::Buffer(handle) => handle.is_null(),
        }
    }
}

/// What is bound to a numbered slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Parameter block bound to constant slot `n`
    Parameters(ParameterBlockHandle),
    /// Read-only resource bound to input slot `n`
    Input(Resource),
    /// Writable resource bound to output slot `n`
    Output(Resource),
}

/// Number of work groups to dispatch on each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGroups {
    /// Groups along X
    pub x: u32,
    /// Groups along Y
    pub y: u32,
    /// Groups along Z
    pub z: u32,
}

impl WorkGroups {
    /// Work groups covering `extent` with 8×8 tiles, rounding up on each axis
    pub fn covering(extent: Extent) -> Self {
        Self {
            x: extent.width.div_ceil(COMPUTE_WORKGROUP_SIZE_X),
            y: extent.height.div_ceil(COMPUTE_WORKGROUP_SIZE_Y),
            z: 1,
        }
    }
}

/// One compute dispatch: a program, its slot bindings and the work-group grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePass {
    /// Human-readable name for debugging
    pub label: &'static str,
    /// Program to run
    pub program: ProgramHandle,
    /// `(slot, binding)` pairs
    pub bindings: Vec<(u32, Binding)>,
    /// Dispatch grid
    pub work_groups: WorkGroups,
}

impl ComputePass {
    /// Starts a pass for `program`
    pub fn new(label: &'static str, program: ProgramHandle) -> Self {
        Self {
            label,
            program,
            bindings: Vec::new(),
            work_groups: WorkGroups { x: 1, y: 1, z: 1 },
        }
    }

    /// Binds a parameter block to constant slot `slot`
    pub fn parameters(mut self, slot: u32, block: ParameterBlockHandle) -> Self {
        self.bindings.push((slot, Binding::Parameters(block)));
        self
    }

    /// Binds a read-only resource to input slot `slot`
    pub fn input(mut self, slot: u32, resource: Resource) -> Self {
        self.bindings.push((slot, Binding::Input(resource)));
        self
    }

    /// Binds a writable resource to output slot `slot`
    pub fn output(mut self, slot: u32, resource: Resource) -> Self {
        self.bindings.push((slot, Binding::Output(resource)));
        self
    }

    /// Sets the grid to cover `extent` with 8×8 tiles
    pub fn covering(mut self, extent: Extent) -> Self {
        self.work_groups = WorkGroups::covering(extent);
        self
    }
}

/// Errors reported by a rendering collaborator
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The handle does not refer to a live resource
    #[error("invalid {kind} handle {id}")]
    InvalidHandle {
        /// Resource kind
        kind: &'static str,
        /// Raw handle id
        id: u32,
    },
    /// A resource could not be created
    #[error("failed to create {label}: {reason}")]
    ResourceCreation {
        /// Label of the resource
        label: &'static str,
        /// Collaborator-specific reason
        reason: String,
    },
    /// Source and destination of a copy differ in size
    #[error("cannot copy {source_extent} into {destination_extent}")]
    ExtentMismatch {
        /// Size of the copy source
        source_extent: Extent,
        /// Size of the copy destination
        destination_extent: Extent,
    },
    /// A compute dispatch could not be issued
    #[error("dispatch of {label} failed: {reason}")]
    Dispatch {
        /// Label of the pass
        label: &'static str,
        /// Collaborator-specific reason
        reason: String,
    },
    /// The device reported an error
    #[error("device error: {0}")]
    Device(String),
}

/// Errors reported by a shader-loading collaborator
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    /// No program source is known under the identifier
    #[error("shader source {0} not found")]
    NotFound(String),
    /// The program failed to compile or validate
    #[error("failed to compile {program}: {reason}")]
    Compilation {
        /// Program that failed
        program: String,
        /// Compiler output
        reason: String,
    },
}

/// Result type of rendering collaborator calls
pub type RenderResult<T> = Result<T, RenderError>;

/// Resolves named compute programs to opaque handles
pub trait ShaderLoader {
    /// Resolves `descriptor` to a program handle
    fn load_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramHandle, ShaderError>;
}

/// GPU rendering capability the pipeline depends on
///
/// Implementations own every resource; the pipeline only ever holds handles.
/// Calls are made from a single thread between frames or inside one `execute`.
pub trait Renderer: ShaderLoader {
    /// Creates a 2D texture
    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureHandle>;

    /// Creates a structured buffer
    fn create_buffer(&mut self, desc: &BufferDesc) -> RenderResult<BufferHandle>;

    /// Creates a parameter block initialized with `contents`
    fn create_parameter_block(&mut self, label: &'static str, contents: &[u8]) -> RenderResult<ParameterBlockHandle>;

    /// Overwrites the contents of a parameter block
    fn update_parameter_block(&mut self, block: ParameterBlockHandle, contents: &[u8]) -> RenderResult<()>;

    /// Overwrites the contents of a structured buffer starting at offset zero
    fn update_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) -> RenderResult<()>;

    /// Releases a texture created by [`Renderer::create_texture`]
    fn release_texture(&mut self, texture: TextureHandle);

    /// Releases a structured buffer
    fn release_buffer(&mut self, buffer: BufferHandle);

    /// Releases a parameter block
    fn release_parameter_block(&mut self, block: ParameterBlockHandle);

    /// Returns the size of a texture
    fn texture_extent(&self, texture: TextureHandle) -> RenderResult<Extent>;

    /// Binds the pass's program and slots and dispatches its work-group grid
    fn dispatch(&mut self, pass: &ComputePass) -> RenderResult<()>;

    /// Blocks until every previously dispatched pass has completed
    fn sync_compute(&mut self) -> RenderResult<()>;

    /// Copies `source` into `destination`; both must share size and layout
    fn copy_texture(&mut self, source: TextureHandle, destination: TextureHandle) -> RenderResult<()>;

    /// Returns the pool-owned intermediate texture for stage slot `index`, sized `extent`
    ///
    /// The texture stays valid until [`Renderer::release_intermediates`].
    fn intermediate_texture(&mut self, index: usize, extent: Extent) -> RenderResult<TextureHandle>;

    /// Releases every intermediate texture handed out since the last release
    fn release_intermediates(&mut self);
}
