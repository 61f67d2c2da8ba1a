//! Bicubic upscaling engine
//!
//! Resampling weights are computed on the host from the cubic convolution kernel,
//! normalized, and uploaded once per distinct sharpness coefficient. The per-pixel
//! resampling runs in a compute program dispatched over 8×8 output tiles.

use crate::{
    error::{FrameliftError, FrameliftResult},
    programs,
    renderer::{BufferDesc, BufferHandle, ComputePass, Extent, ParameterBlockHandle, ProgramHandle, Renderer, Resource, TextureHandle},
};

/// Number of discretized fractional positions in the weight table
pub const WEIGHT_TABLE_PRECISION: usize = 256;
/// Number of taps per fractional position
pub const TAPS_PER_POSITION: usize = 4;
/// Smoothest allowed coefficient (Mitchell-like)
pub const SHARPNESS_MITCHELL: f32 = -0.5;
/// Sharpest allowed coefficient (spline-like)
pub const SHARPNESS_SPLINE: f32 = -1.0;

/// Clamps a sharpness coefficient into [`SHARPNESS_SPLINE`], [`SHARPNESS_MITCHELL`]
///
/// NaN maps to [`SHARPNESS_MITCHELL`].
pub fn clamp_sharpness(sharpness: f32) -> f32 {
    if sharpness.is_nan() {
        return SHARPNESS_MITCHELL;
    }
    sharpness.clamp(SHARPNESS_SPLINE, SHARPNESS_MITCHELL)
}

/// Cubic convolution kernel with coefficient `a`, evaluated at `x`
pub fn bicubic_weight(a: f32, x: f32) -> f32 {
    let x = x.abs();
    if x < 1.0 {
        ((a + 2.0) * x - (a + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        ((a * x - 5.0 * a) * x + 8.0 * a) * x - 4.0 * a
    } else {
        0.0
    }
}

/// 256 fractional positions × 4 tap weights, each row summing to one
#[derive(Debug, Clone, PartialEq)]
pub struct BicubicWeightTable {
    coefficient: f32,
    rows: Vec<[f32; TAPS_PER_POSITION]>,
}

impl BicubicWeightTable {
    /// Computes the table for coefficient `a`
    ///
    /// Row `i` holds the weights of the samples at offsets -1, 0, 1 and 2 relative to
    /// fractional position `i / 256`, normalized so they sum to one.
    pub fn compute(a: f32) -> Self {
        let rows = (0..WEIGHT_TABLE_PRECISION)
            .map(|i| {
                let frac = i as f32 / WEIGHT_TABLE_PRECISION as f32;
                let mut row = [
                    bicubic_weight(a, 1.0 + frac),
                    bicubic_weight(a, frac),
                    bicubic_weight(a, 1.0 - frac),
                    bicubic_weight(a, 2.0 - frac),
                ];
                let sum: f32 = row.iter().sum();
                if sum.is_normal() {
                    row.iter_mut().for_each(|weight| *weight /= sum);
                }
                row
            })
            .collect();

        Self { coefficient: a, rows }
    }

    /// Coefficient the table was computed for
    pub fn coefficient(&self) -> f32 {
        self.coefficient
    }

    /// All rows, indexed by fractional position
    pub fn rows(&self) -> &[[f32; TAPS_PER_POSITION]] {
        &self.rows
    }

    /// Table contents in upload layout
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.rows)
    }
}

/// Parameter block of the bicubic program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct BicubicParams {
    /// Input width in pixels
    pub input_width: u32,
    /// Input height in pixels
    pub input_height: u32,
    /// Output width in pixels
    pub output_width: u32,
    /// Output height in pixels
    pub output_height: u32,
    /// Kernel coefficient in [-1.0, -0.5]
    pub sharpness: f32,
    _padding: [f32; 3],
}

impl BicubicParams {
    fn new(input: Extent, output: Extent, sharpness: f32) -> Self {
        Self {
            input_width: input.width,
            input_height: input.height,
            output_width: output.width,
            output_height: output.height,
            sharpness,
            _padding: [0.0; 3],
        }
    }
}

#[derive(Debug)]
struct UpscalerResources {
    program: ProgramHandle,
    parameters: ParameterBlockHandle,
    weights: BufferHandle,
}

/// Host side of the bicubic upscale pass
#[derive(Debug)]
pub struct BicubicUpscaler {
    resources: Option<UpscalerResources>,
    table: BicubicWeightTable,
}

impl BicubicUpscaler {
    /// Component name used in logs and errors
    pub const NAME: &'static str = "BicubicUpscaler";

    /// Loads the program and creates the parameter block and weight buffer
    ///
    /// The weight table starts out at [`SHARPNESS_MITCHELL`].
    pub fn new(renderer: &mut dyn Renderer) -> FrameliftResult<Self> {
        let program = programs::load(renderer, &programs::BICUBIC_UPSCALE, Self::NAME)?;

        let parameters = renderer.create_parameter_block("BicubicParams", bytemuck::bytes_of(&BicubicParams::new(Extent::default(), Extent::default(), SHARPNESS_MITCHELL)))?;

        let weights = renderer
            .create_buffer(&BufferDesc {
                label: "BicubicWeights",
                element_count: (WEIGHT_TABLE_PRECISION * TAPS_PER_POSITION) as u32,
                element_size: std::mem::size_of::<f32>() as u32,
                writable: false,
            })
            .inspect_err(|_| renderer.release_parameter_block(parameters))?;

        let table = BicubicWeightTable::compute(SHARPNESS_MITCHELL);
        if let Err(e) = renderer.update_buffer(weights, table.as_bytes()) {
            tracing::error!("{}: failed to upload weight table: {e}", Self::NAME);
            renderer.release_buffer(weights);
            renderer.release_parameter_block(parameters);
            return Err(e.into());
        }

        tracing::info!("{}: successfully initialized", Self::NAME);
        Ok(Self {
            resources: Some(UpscalerResources { program, parameters, weights }),
            table,
        })
    }

    /// Resamples `input` into `output`
    ///
    /// # Arguments
    /// * `renderer` - Rendering collaborator
    /// * `input` - Source texture of `input_extent`
    /// * `output` - Destination texture of `output_extent`
    /// * `sharpness` - Kernel coefficient; silently clamped to [-1.0, -0.5]
    ///
    /// The weight table is recomputed and uploaded only when the clamped
    /// coefficient differs from the previous call.
    pub fn upscale(&mut self, renderer: &mut dyn Renderer, input: TextureHandle, output: TextureHandle, input_extent: Extent, output_extent: Extent, sharpness: f32) -> FrameliftResult<()> {
        let Some(resources) = &self.resources else {
            tracing::error!("{}: not initialized", Self::NAME);
            return Err(FrameliftError::NotInitialized { component: Self::NAME });
        };

        if input.is_null() || output.is_null() {
            tracing::error!("{}: invalid input or output texture", Self::NAME);
            return Err(FrameliftError::NullTexture { component: Self::NAME });
        }

        let sharpness = clamp_sharpness(sharpness);

        renderer
            .update_parameter_block(resources.parameters, bytemuck::bytes_of(&BicubicParams::new(input_extent, output_extent, sharpness)))
            .inspect_err(|e| tracing::error!("{}: failed to update parameter block: {e}", Self::NAME))?;

        if sharpness != self.table.coefficient() {
            let table = BicubicWeightTable::compute(sharpness);
            renderer.update_buffer(resources.weights, table.as_bytes())?;
            self.table = table;
        }

        let pass = ComputePass::new("Bicubic Upscale", resources.program)
            .parameters(0, resources.parameters)
            .input(0, Resource::Texture(input))
            .input(1, Resource::Buffer(resources.weights))
            .output(0, Resource::Texture(output))
            .covering(output_extent);

        renderer.dispatch(&pass)?;
        renderer.sync_compute()?;

        Ok(())
    }

    /// Coefficient of the currently uploaded weight table
    pub fn sharpness(&self) -> f32 {
        self.table.coefficient()
    }

    /// Currently uploaded weight table
    pub fn weights(&self) -> &BicubicWeightTable {
        &self.table
    }

    /// Parameter block handle, if initialized
    pub fn parameter_block(&self) -> Option<ParameterBlockHandle> {
        self.resources.as_ref().map(|resources| resources.parameters)
    }

    /// Releases GPU resources; later calls fail with [`FrameliftError::NotInitialized`]
    pub fn release(&mut self, renderer: &mut dyn Renderer) {
        if let Some(resources) = self.resources.take() {
            renderer.release_parameter_block(resources.parameters);
            renderer.release_buffer(resources.weights);
            tracing::info!("{}: successfully shut down", Self::NAME);
        }
    }
}
