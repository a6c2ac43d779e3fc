use bytemuck::{Pod, Zeroable};
use std::mem;

use crate::renderer::device::VertexLayout;

pub const BONES_COUNT: usize = 2;

/// A vertex type that can be uploaded into a geometry buffer.
pub trait VertexFormat: Pod {
    const LAYOUT: VertexLayout;
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct SkinningVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub weights: [f32; BONES_COUNT],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct TexturedVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

impl VertexFormat for Vertex {
    const LAYOUT: VertexLayout = VertexLayout::Lit;
}

impl VertexFormat for SkinningVertex {
    const LAYOUT: VertexLayout = VertexLayout::Skinned;
}

impl VertexFormat for TexturedVertex {
    const LAYOUT: VertexLayout = VertexLayout::Textured;
}

impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3
    ];
}

impl SkinningVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2
    ];
}

impl TexturedVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2
    ];
}

impl VertexLayout {
    pub fn stride(self) -> usize {
        match self {
            VertexLayout::Lit => mem::size_of::<Vertex>(),
            VertexLayout::Skinned => mem::size_of::<SkinningVertex>(),
            VertexLayout::Textured => mem::size_of::<TexturedVertex>(),
        }
    }

    pub fn buffer_layout(self) -> wgpu::VertexBufferLayout<'static> {
        let attributes: &'static [wgpu::VertexAttribute] = match self {
            VertexLayout::Lit => &Vertex::ATTRS,
            VertexLayout::Skinned => &SkinningVertex::ATTRS,
            VertexLayout::Textured => &TexturedVertex::ATTRS,
        };
        wgpu::VertexBufferLayout {
            array_stride: self.stride() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}

#[inline]
pub fn v(pos: [f32; 3], normal: [f32; 3]) -> Vertex {
    Vertex { pos, normal }
}
