// renderer/device.rs
//
// The immediate-mode device interface the renderer drives. Every call mutates
// the device's binding state in issue order; nothing is deferred.

use bitflags::bitflags;

use crate::error::DeviceError;

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Number of four-component vertex shader constant registers.
pub const VERTEX_REGISTER_COUNT: u32 = 48;
/// Number of four-component pixel shader constant registers.
pub const PIXEL_REGISTER_COUNT: u32 = 8;
/// Simultaneous colour outputs (colour + normals).
pub const OUTPUT_SLOT_COUNT: u32 = 2;
/// Texture samplers readable by pixel shaders.
pub const SAMPLER_COUNT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Something that can receive rendering output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// The presentation surface of the current frame.
    BackBuffer,
    Target(TargetId),
}

/// A resource owned by the device, used for release and rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Target(TargetId),
    Geometry(GeometryId),
    VertexShader(ShaderId),
    PixelShader(ShaderId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Stencil behaviour of subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilTest {
    /// Always pass and replace the stencil value with the reference.
    Replace,
    /// Pass where the stencil equals the reference, then increment it so a
    /// pixel is blended at most once.
    EqualIncrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    CullMode(CullMode),
    StencilEnable(bool),
    StencilTest(StencilTest),
    StencilRef(u32),
    StencilMask(u8),
    /// Source-alpha / inverse-source-alpha blending.
    AlphaBlend(bool),
    FillMode(FillMode),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const TARGET = 0b001;
        const ZBUFFER = 0b010;
        const STENCIL = 0b100;
    }
}

/// Vertex formats understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Position + normal.
    Lit,
    /// Position + normal + per-bone weights.
    Skinned,
    /// Position + texture coordinates.
    Textured,
}

/// Immutable vertex/index data submitted once at creation.
#[derive(Debug, Clone, Copy)]
pub struct GeometryDesc<'a> {
    pub label: &'a str,
    pub layout: VertexLayout,
    pub vertices: &'a [u8],
    pub vertex_count: u32,
    pub indices: &'a [u16],
    /// Triangles to draw; the topology is always a triangle list.
    pub primitive_count: u32,
}

pub trait Device {
    fn create_render_target(&mut self, width: u32, height: u32, label: &str)
        -> DeviceResult<TargetId>;
    fn create_geometry(&mut self, desc: &GeometryDesc<'_>) -> DeviceResult<GeometryId>;
    /// Compiles the named vertex shader source file.
    fn create_vertex_shader(&mut self, name: &str) -> DeviceResult<ShaderId>;
    /// Compiles the named pixel shader source file.
    fn create_pixel_shader(&mut self, name: &str) -> DeviceResult<ShaderId>;
    fn release(&mut self, resource: Resource);

    fn set_render_state(&mut self, state: RenderState) -> DeviceResult<()>;
    fn set_vertex_constants(&mut self, register: u32, data: &[[f32; 4]]) -> DeviceResult<()>;
    fn set_pixel_constants(&mut self, register: u32, data: &[[f32; 4]]) -> DeviceResult<()>;

    /// What is currently bound at `slot`.
    fn render_target(&self, slot: u32) -> DeviceResult<Option<Surface>>;
    fn set_render_target(&mut self, slot: u32, surface: Option<Surface>) -> DeviceResult<()>;
    fn set_texture(&mut self, sampler: u32, target: Option<TargetId>) -> DeviceResult<()>;
    fn bind_vertex_shader(&mut self, shader: ShaderId) -> DeviceResult<()>;
    fn bind_pixel_shader(&mut self, shader: ShaderId) -> DeviceResult<()>;

    fn begin_scene(&mut self) -> DeviceResult<()>;
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: u32)
        -> DeviceResult<()>;
    fn draw_indexed(&mut self, geometry: GeometryId) -> DeviceResult<()>;
    fn end_scene(&mut self) -> DeviceResult<()>;
    /// Presents the back buffer as a whole (no source or destination rects).
    fn present(&mut self) -> DeviceResult<()>;
}

pub(crate) fn check_slot(slot: u32) -> DeviceResult<()> {
    if slot < OUTPUT_SLOT_COUNT {
        Ok(())
    } else {
        Err(DeviceError::InvalidSlot(slot))
    }
}

pub(crate) fn check_sampler(sampler: u32) -> DeviceResult<()> {
    if sampler < SAMPLER_COUNT {
        Ok(())
    } else {
        Err(DeviceError::InvalidSampler(sampler))
    }
}

pub(crate) fn check_registers(register: u32, count: usize, capacity: u32) -> DeviceResult<()> {
    let end = register as usize + count;
    if end <= capacity as usize {
        Ok(())
    } else {
        Err(DeviceError::RegisterOutOfRange {
            first: register,
            end: end as u32,
            capacity,
        })
    }
}
