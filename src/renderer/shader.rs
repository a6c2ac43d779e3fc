// renderer/shader.rs
//
// Opaque shader handles. The sources are looked up by file name by the device.

use crate::error::{DemoError, Result};
use crate::renderer::device::{Device, Resource, ShaderId};

pub const SHADOW_VERTEX_SHADER: &str = "shadow.vsh";
pub const SHADOW_PIXEL_SHADER: &str = "shadow.psh";
pub const DIFFUSE_VERTEX_SHADER: &str = "diffuse.vsh";
pub const SKINNING_VERTEX_SHADER: &str = "skinning.vsh";
pub const MORPHING_VERTEX_SHADER: &str = "morphing.vsh";
pub const LIGHT_SOURCE_VERTEX_SHADER: &str = "light_source.vsh";
pub const COLOR_PIXEL_SHADER: &str = "color.psh";
pub const TARGET_VERTEX_SHADER: &str = "target.vsh";
pub const TARGET_PIXEL_SHADER: &str = "target.psh";
pub const TARGET_EDGES_PIXEL_SHADER: &str = "target_edge.psh";
pub const TARGET_BLUR_PIXEL_SHADER: &str = "target_blur.psh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexShader {
    id: ShaderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelShader {
    id: ShaderId,
}

impl VertexShader {
    pub fn new<D: Device + ?Sized>(device: &mut D, name: &str) -> Result<Self> {
        let id = device
            .create_vertex_shader(name)
            .map_err(|source| DemoError::init(format!("vertex shader `{name}`"), source))?;
        log::info!("Loaded vertex shader {}", name);
        Ok(Self { id })
    }

    pub fn bind<D: Device + ?Sized>(&self, device: &mut D) -> Result<()> {
        device.bind_vertex_shader(self.id)?;
        Ok(())
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn resource(&self) -> Resource {
        Resource::VertexShader(self.id)
    }
}

impl PixelShader {
    pub fn new<D: Device + ?Sized>(device: &mut D, name: &str) -> Result<Self> {
        let id = device
            .create_pixel_shader(name)
            .map_err(|source| DemoError::init(format!("pixel shader `{name}`"), source))?;
        log::info!("Loaded pixel shader {}", name);
        Ok(Self { id })
    }

    pub fn bind<D: Device + ?Sized>(&self, device: &mut D) -> Result<()> {
        device.bind_pixel_shader(self.id)?;
        Ok(())
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn resource(&self) -> Resource {
        Resource::PixelShader(self.id)
    }
}

/// Shaders used by one model, for the lit pass and the shadow pass.
#[derive(Debug, Clone, Copy)]
pub struct ShaderSet {
    pub vertex: VertexShader,
    pub pixel: PixelShader,
    pub shadow_vertex: VertexShader,
    pub shadow_pixel: PixelShader,
}

impl ShaderSet {
    /// The same pair for both passes.
    pub fn unshadowed(vertex: VertexShader, pixel: PixelShader) -> Self {
        Self {
            vertex,
            pixel,
            shadow_vertex: vertex,
            shadow_pixel: pixel,
        }
    }

    pub fn bind<D: Device + ?Sized>(&self, device: &mut D, shadow: bool) -> Result<()> {
        if shadow {
            self.shadow_vertex.bind(device)?;
            self.shadow_pixel.bind(device)
        } else {
            self.vertex.bind(device)?;
            self.pixel.bind(device)
        }
    }
}
