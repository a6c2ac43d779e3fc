// renderer/geometry.rs

use crate::error::{DemoError, Result};
use crate::renderer::device::{Device, GeometryDesc, GeometryId, Resource, VertexLayout};
use crate::renderer::vertex::VertexFormat;

pub type Index = u16;

pub const VERTICES_PER_TRIANGLE: u32 = 3;

/// Vertex and index data of one drawable, uploaded once at creation.
#[derive(Debug)]
pub struct GeometryBuffer {
    id: GeometryId,
    layout: VertexLayout,
    vertex_count: u32,
    primitive_count: u32,
}

impl GeometryBuffer {
    pub fn new<D, V>(device: &mut D, label: &str, vertices: &[V], indices: &[Index]) -> Result<Self>
    where
        D: Device + ?Sized,
        V: VertexFormat,
    {
        let primitive_count = indices.len() as u32 / VERTICES_PER_TRIANGLE;
        let desc = GeometryDesc {
            label,
            layout: V::LAYOUT,
            vertices: bytemuck::cast_slice(vertices),
            vertex_count: vertices.len() as u32,
            indices,
            primitive_count,
        };
        let id = device
            .create_geometry(&desc)
            .map_err(|source| DemoError::init(format!("geometry `{label}`"), source))?;

        log::debug!(
            "Uploaded geometry `{}`: {} vertices, {} triangles",
            label,
            vertices.len(),
            primitive_count
        );

        Ok(Self {
            id,
            layout: V::LAYOUT,
            vertex_count: vertices.len() as u32,
            primitive_count,
        })
    }

    /// Submits the geometry with whatever shaders and textures are bound.
    pub fn draw<D: Device + ?Sized>(&self, device: &mut D) -> Result<()> {
        device.draw_indexed(self.id)?;
        Ok(())
    }

    pub fn resource(&self) -> Resource {
        Resource::Geometry(self.id)
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn primitive_count(&self) -> u32 {
        self.primitive_count
    }
}
