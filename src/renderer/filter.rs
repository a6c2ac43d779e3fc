// renderer/filter.rs
//
// Full-screen post-process over the captured colour and normals targets:
// an edge pass over the normals, then blur passes that mix towards the
// blurred colour where edges were found.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::renderer::constants::{REG_FILTER, REG_FILTER_TEXCOORD_SHIFT};
use crate::renderer::device::{Device, Resource, TargetId};
use crate::renderer::geometry::GeometryBuffer;
use crate::renderer::shader::{
    PixelShader, VertexShader, TARGET_BLUR_PIXEL_SHADER, TARGET_EDGES_PIXEL_SHADER,
};
use crate::renderer::target::RenderTarget;

pub const FILTER_SIZE: usize = 3;
/// Populated kernel cells: the centre and its 4-neighbourhood.
pub const FILTER_TAP_COUNT: usize = 5;
/// Divisor applied to the transmitted taps; shaders multiply it back in.
pub const FILTER_COEFF: f32 = 4.0;
/// Row-major indices of the transmitted cells in a 3x3 kernel.
pub const FILTER_TAP_CELLS: [usize; FILTER_TAP_COUNT] = [1, 3, 4, 5, 7];
/// Texel offsets of the transmitted cells.
pub const FILTER_TEXCOORD_SHIFT: [[f32; 2]; FILTER_TAP_COUNT] =
    [[0.0, -1.0], [-1.0, 0.0], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];

/// Output slot and samplers the passes use.
pub const TARGET_INDEX_COLOR: u32 = 0;
pub const TARGET_INDEX_NORMALS: u32 = 1;
pub const SAMPLER_INDEX_TARGET: u32 = 0;
pub const SAMPLER_INDEX_EDGES: u32 = 1;

/// Blur iteration counts selectable with the digit keys 1..=6.
pub const BLUR_ITERATION_CHOICES: [u32; 6] = [0, 1, 2, 4, 8, 16];

/// A 3x3 convolution kernel, row-major. Corners are never transmitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterKernel {
    cells: [f32; FILTER_SIZE * FILTER_SIZE],
}

pub const NO_FILTER: FilterKernel = FilterKernel::new([
    0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0,
]);

pub const BLUR_FILTER: FilterKernel = FilterKernel::new([
    0.0,
    1.0 / 6.0,
    0.0,
    1.0 / 6.0,
    1.0 / 3.0,
    1.0 / 6.0,
    0.0,
    1.0 / 6.0,
    0.0,
]);

pub const EDGE_FILTER: FilterKernel = FilterKernel::new([
    0.0, -1.0, 0.0, //
    -1.0, 4.0, -1.0, //
    0.0, -1.0, 0.0,
]);

impl FilterKernel {
    pub const fn new(cells: [f32; FILTER_SIZE * FILTER_SIZE]) -> Self {
        Self { cells }
    }

    pub fn cell(&self, row: usize, column: usize) -> f32 {
        self.cells[row * FILTER_SIZE + column]
    }

    /// Pixel shader constants c0..c4: each transmitted cell divided by
    /// [`FILTER_COEFF`], broadcast to four channels.
    pub fn pixel_constants(&self) -> [[f32; 4]; FILTER_TAP_COUNT] {
        FILTER_TAP_CELLS.map(|cell| [self.cells[cell] / FILTER_COEFF; 4])
    }

    /// Uploads the taps and the texcoord shifts for a `width` x `height` source.
    pub fn upload<D: Device + ?Sized>(&self, device: &mut D, width: f32, height: f32) -> Result<()> {
        device.set_vertex_constants(REG_FILTER_TEXCOORD_SHIFT, &texcoord_shifts(width, height))?;
        device.set_pixel_constants(REG_FILTER, &self.pixel_constants())?;
        Ok(())
    }
}

/// Vertex shader constants c40..c44: texel offsets scaled to texture space.
pub fn texcoord_shifts(width: f32, height: f32) -> [[f32; 4]; FILTER_TAP_COUNT] {
    FILTER_TEXCOORD_SHIFT.map(|[x, y]| [x / width, y / height, 0.0, 0.0])
}

/// Texel offsets of the transmitted cells as integers.
pub fn texel_offsets() -> [(i32, i32); FILTER_TAP_COUNT] {
    FILTER_TEXCOORD_SHIFT.map(|[x, y]| (x as i32, y as i32))
}

/// Post-process selection. `Off` draws the colour target straight to the
/// back buffer through the no-op kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Off,
    Filtered { blur_iterations: u32 },
}

impl FilterMode {
    /// Mode for the digit keys: `0` turns filtering off, `1`..=`6` select
    /// 0, 1, 2, 4, 8 or 16 blur iterations.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(FilterMode::Off),
            1..=6 => Some(FilterMode::Filtered {
                blur_iterations: BLUR_ITERATION_CHOICES[digit as usize - 1],
            }),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            FilterMode::Off => true,
            FilterMode::Filtered { blur_iterations } => {
                BLUR_ITERATION_CHOICES.contains(blur_iterations)
            }
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterMode::Off => f.write_str("off"),
            FilterMode::Filtered { blur_iterations } => {
                write!(f, "edges + {} blur iteration(s)", blur_iterations)
            }
        }
    }
}

/// The off-screen targets and pixel shaders private to the filter passes.
#[derive(Debug)]
pub struct FilterPipeline {
    edges: RenderTarget,
    scratch: RenderTarget,
    edge_shader: PixelShader,
    blur_shader: PixelShader,
}

/// Shared inputs of one filter run.
pub struct FilterInputs<'a> {
    pub color: &'a RenderTarget,
    pub normals: &'a RenderTarget,
    pub quad: &'a GeometryBuffer,
    pub quad_shader: VertexShader,
}

impl FilterPipeline {
    pub fn new<D: Device + ?Sized>(
        device: &mut D,
        width: u32,
        height: u32,
        acquired: &mut Vec<Resource>,
    ) -> Result<Self> {
        let edges = RenderTarget::new(device, width, height, "EdgesTarget")?;
        acquired.push(edges.resource());
        let scratch = RenderTarget::new(device, width, height, "BlurTarget")?;
        acquired.push(scratch.resource());
        let edge_shader = PixelShader::new(device, TARGET_EDGES_PIXEL_SHADER)?;
        acquired.push(edge_shader.resource());
        let blur_shader = PixelShader::new(device, TARGET_BLUR_PIXEL_SHADER)?;
        acquired.push(blur_shader.resource());
        Ok(Self {
            edges,
            scratch,
            edge_shader,
            blur_shader,
        })
    }

    pub fn edges(&self) -> TargetId {
        self.edges.id()
    }

    pub fn scratch(&self) -> TargetId {
        self.scratch.id()
    }

    /// Everything this pipeline acquired, in acquisition order.
    pub fn resources(&self) -> [Resource; 4] {
        [
            self.edges.resource(),
            self.scratch.resource(),
            self.edge_shader.resource(),
            self.blur_shader.resource(),
        ]
    }

    /// Runs the edge pass and `blur_iterations` blur passes, leaving the
    /// final image in whatever slot 0 held on entry (the back buffer).
    pub fn run<D: Device + ?Sized>(
        &self,
        device: &mut D,
        inputs: &FilterInputs<'_>,
        blur_iterations: u32,
    ) -> Result<()> {
        let (width, height) = (inputs.color.float_width(), inputs.color.float_height());

        EDGE_FILTER.upload(device, width, height)?;
        inputs.quad_shader.bind(device)?;
        self.edge_shader.bind(device)?;
        {
            let mut output = self.edges.bind_as_output(device, TARGET_INDEX_COLOR)?;
            let mut input = inputs.normals.bind_as_input(&mut *output, SAMPLER_INDEX_TARGET)?;
            inputs.quad.draw(&mut *input)?;
            input.unbind()?;
            output.unbind()?;
        }

        let mut edges = self.edges.bind_as_input(device, SAMPLER_INDEX_EDGES)?;
        BLUR_FILTER.upload(&mut *edges, width, height)?;
        self.blur_shader.bind(&mut *edges)?;

        if blur_iterations == 0 {
            let mut source = inputs.color.bind_as_input(&mut *edges, SAMPLER_INDEX_TARGET)?;
            inputs.quad.draw(&mut *source)?;
            source.unbind()?;
        } else {
            let mut source = inputs.color;
            let mut destination = &self.scratch;
            for iteration in 1..=blur_iterations {
                if iteration == blur_iterations {
                    let mut input = source.bind_as_input(&mut *edges, SAMPLER_INDEX_TARGET)?;
                    inputs.quad.draw(&mut *input)?;
                    input.unbind()?;
                } else {
                    let mut output = destination.bind_as_output(&mut *edges, TARGET_INDEX_COLOR)?;
                    let mut input = source.bind_as_input(&mut *output, SAMPLER_INDEX_TARGET)?;
                    inputs.quad.draw(&mut *input)?;
                    input.unbind()?;
                    output.unbind()?;
                }
                std::mem::swap(&mut source, &mut destination);
            }
        }

        edges.unbind()?;
        log::trace!("Filter pass done ({} blur iterations)", blur_iterations);
        Ok(())
    }
}
