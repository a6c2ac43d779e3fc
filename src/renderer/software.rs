// renderer/software.rs
//
// CPU stand-in for the GPU device. Every call is appended to a shared
// journal; full-screen filter draws are evaluated texel by texel on RGBA
// float images so pass ordering can be checked bit for bit. Scene draws
// paint a deterministic pattern that depends only on the geometry handle.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::DeviceError;
use crate::renderer::device::{
    check_registers, check_sampler, check_slot, ClearFlags, Device, DeviceResult, GeometryDesc,
    GeometryId, RenderState, Resource, ShaderId, Surface, TargetId, OUTPUT_SLOT_COUNT,
    PIXEL_REGISTER_COUNT, SAMPLER_COUNT, VERTEX_REGISTER_COUNT,
};
use crate::renderer::constants::{REG_FILTER, REG_FILTER_TEXCOORD_SHIFT};
use crate::renderer::filter::{FILTER_COEFF, FILTER_TAP_COUNT};
use crate::renderer::shader::{
    TARGET_BLUR_PIXEL_SHADER, TARGET_EDGES_PIXEL_SHADER, TARGET_PIXEL_SHADER,
};

pub type Texel = [f32; 4];

/// A row-major RGBA float image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    texels: Vec<Texel>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0.0; 4])
    }

    pub fn filled(width: u32, height: u32, texel: Texel) -> Self {
        Self {
            width,
            height,
            texels: vec![texel; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Texel {
        self.texels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, texel: Texel) {
        let index = (y * self.width + x) as usize;
        self.texels[index] = texel;
    }

    /// Nearest sampling with clamp-to-edge addressing.
    pub fn sample(&self, x: i32, y: i32) -> Texel {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.get(x, y)
    }

    pub fn fill(&mut self, texel: Texel) {
        self.texels.fill(texel);
    }
}

/// Filter taps as uploaded: per-tap weights and texel offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Taps {
    pub weights: [Texel; FILTER_TAP_COUNT],
    pub offsets: [(i32, i32); FILTER_TAP_COUNT],
}

impl Taps {
    fn apply(&self, source: &Image, x: u32, y: u32) -> Texel {
        let mut sum = [0.0f32; 4];
        for (weight, (dx, dy)) in self.weights.iter().zip(self.offsets) {
            let texel = source.sample(x as i32 + dx, y as i32 + dy);
            for c in 0..4 {
                sum[c] += weight[c] * texel[c];
            }
        }
        sum.map(|v| v * FILTER_COEFF)
    }
}

/// `target.psh`: the filtered source.
pub fn convolve(source: &Image, taps: &Taps) -> Image {
    map_image(source.width, source.height, |x, y| taps.apply(source, x, y))
}

/// `target_edge.psh`: the length of the filtered normal, saturated, in grey.
pub fn detect_edges(normals: &Image, taps: &Taps) -> Image {
    map_image(normals.width, normals.height, |x, y| {
        let f = taps.apply(normals, x, y);
        let edge = (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt().clamp(0.0, 1.0);
        [edge, edge, edge, 1.0]
    })
}

/// `target_blur.psh`: mixes the source towards its filtered value by the
/// edge intensity.
pub fn blur(source: &Image, edges: &Image, taps: &Taps) -> Image {
    map_image(source.width, source.height, |x, y| {
        let center = source.get(x, y);
        let blurred = taps.apply(source, x, y);
        let amount = edges.sample(x as i32, y as i32)[0].clamp(0.0, 1.0);
        let mut out = [0.0; 4];
        for c in 0..4 {
            out[c] = center[c] + (blurred[c] - center[c]) * amount;
        }
        out
    })
}

fn map_image(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Texel) -> Image {
    let mut image = Image::new(width, height);
    for y in 0..height {
        for x in 0..width {
            image.set(x, y, f(x, y));
        }
    }
    image
}

/// Colour a scene draw leaves in output slot 0.
pub fn scene_color(geometry: GeometryId, x: u32, y: u32) -> Option<Texel> {
    covered(geometry, x, y).then(|| {
        let g = geometry.0;
        [
            ((x + g) % 5) as f32 / 4.0,
            ((y + 2 * g) % 3) as f32 / 2.0,
            (g % 4) as f32 / 3.0,
            1.0,
        ]
    })
}

/// Normal a scene draw leaves in output slot 1.
pub fn scene_normal(geometry: GeometryId, x: u32, y: u32) -> Option<Texel> {
    covered(geometry, x, y).then(|| {
        [
            ((x / 2 + geometry.0) % 2) as f32,
            ((y / 2) % 2) as f32,
            1.0,
            1.0,
        ]
    })
}

fn covered(geometry: GeometryId, x: u32, y: u32) -> bool {
    let g = geometry.0;
    (x + 3 * y + g) % 4 == 0 || (x * y + g) % 7 == 0
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTarget { id: TargetId, width: u32, height: u32 },
    CreateGeometry { id: GeometryId, label: String },
    CreateVertexShader { id: ShaderId, name: String },
    CreatePixelShader { id: ShaderId, name: String },
    Release(Resource),
    RenderState(RenderState),
    VertexConstants { register: u32, data: Vec<[f32; 4]> },
    PixelConstants { register: u32, data: Vec<[f32; 4]> },
    SetRenderTarget { slot: u32, surface: Option<Surface> },
    SetTexture { sampler: u32, target: Option<TargetId> },
    BindVertexShader(ShaderId),
    BindPixelShader(ShaderId),
    BeginScene,
    Clear(ClearFlags),
    Draw(DrawCall),
    EndScene,
    Present,
}

/// Bindings in effect when a draw was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub geometry: GeometryId,
    pub vertex_shader: String,
    pub pixel_shader: String,
    pub outputs: [Option<Surface>; OUTPUT_SLOT_COUNT as usize],
    pub textures: [Option<TargetId>; SAMPLER_COUNT as usize],
}

#[derive(Debug, Default)]
pub struct Journal {
    commands: Vec<Command>,
}

impl Journal {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn releases(&self) -> Vec<Resource> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Release(resource) => Some(*resource),
                _ => None,
            })
            .collect()
    }

    /// Vertex constants most recently uploaded at `register` before command `end`.
    pub fn vertex_constants_before(&self, end: usize, register: u32) -> Option<&[[f32; 4]]> {
        self.commands[..end].iter().rev().find_map(|c| match c {
            Command::VertexConstants { register: r, data } if *r == register => {
                Some(data.as_slice())
            }
            _ => None,
        })
    }

    /// Pixel constants most recently uploaded at `register` before command `end`.
    pub fn pixel_constants_before(&self, end: usize, register: u32) -> Option<&[[f32; 4]]> {
        self.commands[..end].iter().rev().find_map(|c| match c {
            Command::PixelConstants { register: r, data } if *r == register => {
                Some(data.as_slice())
            }
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    fn push(&mut self, command: Command) {
        self.commands.push(command);
    }
}

pub type SharedJournal = Rc<RefCell<Journal>>;

#[derive(Debug)]
struct GeometryInfo {
    label: String,
}

/// See the module documentation.
#[derive(Debug)]
pub struct SoftwareDevice {
    journal: SharedJournal,
    back_buffer: Image,
    presented: Option<Image>,
    targets: BTreeMap<TargetId, Image>,
    geometries: BTreeMap<GeometryId, GeometryInfo>,
    vertex_shaders: BTreeMap<ShaderId, String>,
    pixel_shaders: BTreeMap<ShaderId, String>,
    next_id: u32,

    outputs: [Option<Surface>; OUTPUT_SLOT_COUNT as usize],
    textures: [Option<TargetId>; SAMPLER_COUNT as usize],
    vertex_shader: Option<ShaderId>,
    pixel_shader: Option<ShaderId>,
    vertex_registers: [[f32; 4]; VERTEX_REGISTER_COUNT as usize],
    pixel_registers: [[f32; 4]; PIXEL_REGISTER_COUNT as usize],
    in_scene: bool,

    creations_until_failure: Option<usize>,
    draws_until_failure: Option<usize>,
}

impl SoftwareDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            journal: SharedJournal::default(),
            back_buffer: Image::new(width, height),
            presented: None,
            targets: BTreeMap::new(),
            geometries: BTreeMap::new(),
            vertex_shaders: BTreeMap::new(),
            pixel_shaders: BTreeMap::new(),
            next_id: 1,
            outputs: [Some(Surface::BackBuffer), None],
            textures: [None; SAMPLER_COUNT as usize],
            vertex_shader: None,
            pixel_shader: None,
            vertex_registers: [[0.0; 4]; VERTEX_REGISTER_COUNT as usize],
            pixel_registers: [[0.0; 4]; PIXEL_REGISTER_COUNT as usize],
            in_scene: false,
            creations_until_failure: None,
            draws_until_failure: None,
        }
    }

    /// A handle to the command journal that outlives the device.
    pub fn journal(&self) -> SharedJournal {
        Rc::clone(&self.journal)
    }

    /// Makes the resource creation after `successes` more succeed fail.
    pub fn fail_creation_after(&mut self, successes: usize) {
        self.creations_until_failure = Some(successes);
    }

    /// Makes the draw after `successes` more succeed fail.
    pub fn fail_draw_after(&mut self, successes: usize) {
        self.draws_until_failure = Some(successes);
    }

    pub fn texture(&self, sampler: u32) -> Option<TargetId> {
        self.textures.get(sampler as usize).copied().flatten()
    }

    pub fn target_image(&self, id: TargetId) -> Option<&Image> {
        self.targets.get(&id)
    }

    pub fn back_buffer(&self) -> &Image {
        &self.back_buffer
    }

    /// The back buffer as of the last `present`.
    pub fn last_presented(&self) -> Option<&Image> {
        self.presented.as_ref()
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn live_geometries(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.vertex_shaders.len() + self.pixel_shaders.len()
    }

    fn allocate(&mut self) -> DeviceResult<u32> {
        if let Some(remaining) = self.creations_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(DeviceError::OutOfMemory);
            }
            *remaining -= 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn image(&self, surface: Surface) -> DeviceResult<&Image> {
        match surface {
            Surface::BackBuffer => Ok(&self.back_buffer),
            Surface::Target(id) => self.targets.get(&id).ok_or(DeviceError::UnknownResource {
                kind: "render target",
                id: id.0,
            }),
        }
    }

    fn image_mut(&mut self, surface: Surface) -> DeviceResult<&mut Image> {
        match surface {
            Surface::BackBuffer => Ok(&mut self.back_buffer),
            Surface::Target(id) => {
                self.targets
                    .get_mut(&id)
                    .ok_or(DeviceError::UnknownResource {
                        kind: "render target",
                        id: id.0,
                    })
            }
        }
    }

    fn sampled(&self, sampler: usize) -> DeviceResult<&Image> {
        let id = self.textures[sampler].ok_or_else(|| {
            DeviceError::Backend(format!("sampler {sampler} read while unbound"))
        })?;
        self.image(Surface::Target(id))
    }

    fn taps(&self, source: &Image) -> Taps {
        let mut weights = [[0.0; 4]; FILTER_TAP_COUNT];
        let mut offsets = [(0, 0); FILTER_TAP_COUNT];
        for i in 0..FILTER_TAP_COUNT {
            weights[i] = self.pixel_registers[REG_FILTER as usize + i];
            let shift = self.vertex_registers[REG_FILTER_TEXCOORD_SHIFT as usize + i];
            offsets[i] = (
                (shift[0] * source.width as f32).round() as i32,
                (shift[1] * source.height as f32).round() as i32,
            );
        }
        Taps { weights, offsets }
    }

    fn execute(&mut self, geometry: GeometryId, pixel_shader: &str) -> DeviceResult<()> {
        let Some(output) = self.outputs[0] else {
            return Err(DeviceError::Backend("draw with no render target".into()));
        };
        let filtered = match pixel_shader {
            TARGET_PIXEL_SHADER => {
                let source = self.sampled(0)?;
                Some(convolve(source, &self.taps(source)))
            }
            TARGET_EDGES_PIXEL_SHADER => {
                let source = self.sampled(0)?;
                Some(detect_edges(source, &self.taps(source)))
            }
            TARGET_BLUR_PIXEL_SHADER => {
                let source = self.sampled(0)?;
                let edges = self.sampled(1)?;
                Some(blur(source, edges, &self.taps(source)))
            }
            _ => None,
        };

        if let Some(image) = filtered {
            let destination = self.image_mut(output)?;
            if (destination.width, destination.height) != (image.width, image.height) {
                return Err(DeviceError::Backend(
                    "full-screen pass between differently sized surfaces".into(),
                ));
            }
            *destination = image;
            return Ok(());
        }

        let paint: [fn(GeometryId, u32, u32) -> Option<Texel>; 2] = [scene_color, scene_normal];
        for (slot, paint) in paint.into_iter().enumerate() {
            let Some(surface) = self.outputs[slot] else {
                continue;
            };
            let image = self.image_mut(surface)?;
            for y in 0..image.height {
                for x in 0..image.width {
                    if let Some(texel) = paint(geometry, x, y) {
                        image.set(x, y, texel);
                    }
                }
            }
        }
        Ok(())
    }

    fn check_known(&self, resource: Resource) -> DeviceResult<()> {
        let known = match resource {
            Resource::Target(id) => self.targets.contains_key(&id),
            Resource::Geometry(id) => self.geometries.contains_key(&id),
            Resource::VertexShader(id) => self.vertex_shaders.contains_key(&id),
            Resource::PixelShader(id) => self.pixel_shaders.contains_key(&id),
        };
        if known {
            return Ok(());
        }
        let (kind, id) = match resource {
            Resource::Target(id) => ("render target", id.0),
            Resource::Geometry(id) => ("geometry", id.0),
            Resource::VertexShader(id) => ("vertex shader", id.0),
            Resource::PixelShader(id) => ("pixel shader", id.0),
        };
        Err(DeviceError::UnknownResource { kind, id })
    }
}

impl Device for SoftwareDevice {
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        _label: &str,
    ) -> DeviceResult<TargetId> {
        let id = TargetId(self.allocate()?);
        self.targets.insert(id, Image::new(width, height));
        self.journal.borrow_mut().push(Command::CreateTarget { id, width, height });
        Ok(id)
    }

    fn create_geometry(&mut self, desc: &GeometryDesc<'_>) -> DeviceResult<GeometryId> {
        if desc.vertices.len() != desc.layout.stride() * desc.vertex_count as usize {
            return Err(DeviceError::Backend(format!(
                "geometry `{}` has a truncated vertex buffer",
                desc.label
            )));
        }
        let id = GeometryId(self.allocate()?);
        self.geometries.insert(
            id,
            GeometryInfo {
                label: desc.label.to_owned(),
            },
        );
        self.journal.borrow_mut().push(Command::CreateGeometry {
            id,
            label: desc.label.to_owned(),
        });
        Ok(id)
    }

    fn create_vertex_shader(&mut self, name: &str) -> DeviceResult<ShaderId> {
        let id = ShaderId(self.allocate()?);
        self.vertex_shaders.insert(id, name.to_owned());
        self.journal.borrow_mut().push(Command::CreateVertexShader {
            id,
            name: name.to_owned(),
        });
        Ok(id)
    }

    fn create_pixel_shader(&mut self, name: &str) -> DeviceResult<ShaderId> {
        let id = ShaderId(self.allocate()?);
        self.pixel_shaders.insert(id, name.to_owned());
        self.journal.borrow_mut().push(Command::CreatePixelShader {
            id,
            name: name.to_owned(),
        });
        Ok(id)
    }

    fn release(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Target(id) => self.targets.remove(&id).is_some(),
            Resource::Geometry(id) => self.geometries.remove(&id).is_some(),
            Resource::VertexShader(id) => self.vertex_shaders.remove(&id).is_some(),
            Resource::PixelShader(id) => self.pixel_shaders.remove(&id).is_some(),
        };
        if !removed {
            log::warn!("Release of unknown resource {:?}", resource);
        }
        self.journal.borrow_mut().push(Command::Release(resource));
    }

    fn set_render_state(&mut self, state: RenderState) -> DeviceResult<()> {
        self.journal.borrow_mut().push(Command::RenderState(state));
        Ok(())
    }

    fn set_vertex_constants(&mut self, register: u32, data: &[[f32; 4]]) -> DeviceResult<()> {
        check_registers(register, data.len(), VERTEX_REGISTER_COUNT)?;
        let start = register as usize;
        self.vertex_registers[start..start + data.len()].copy_from_slice(data);
        self.journal.borrow_mut().push(Command::VertexConstants {
            register,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn set_pixel_constants(&mut self, register: u32, data: &[[f32; 4]]) -> DeviceResult<()> {
        check_registers(register, data.len(), PIXEL_REGISTER_COUNT)?;
        let start = register as usize;
        self.pixel_registers[start..start + data.len()].copy_from_slice(data);
        self.journal.borrow_mut().push(Command::PixelConstants {
            register,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn render_target(&self, slot: u32) -> DeviceResult<Option<Surface>> {
        check_slot(slot)?;
        Ok(self.outputs[slot as usize])
    }

    fn set_render_target(&mut self, slot: u32, surface: Option<Surface>) -> DeviceResult<()> {
        check_slot(slot)?;
        if let Some(surface) = surface {
            self.image(surface)?;
        }
        self.outputs[slot as usize] = surface;
        self.journal
            .borrow_mut()
            .push(Command::SetRenderTarget { slot, surface });
        Ok(())
    }

    fn set_texture(&mut self, sampler: u32, target: Option<TargetId>) -> DeviceResult<()> {
        check_sampler(sampler)?;
        if let Some(id) = target {
            self.check_known(Resource::Target(id))?;
        }
        self.textures[sampler as usize] = target;
        self.journal
            .borrow_mut()
            .push(Command::SetTexture { sampler, target });
        Ok(())
    }

    fn bind_vertex_shader(&mut self, shader: ShaderId) -> DeviceResult<()> {
        self.check_known(Resource::VertexShader(shader))?;
        self.vertex_shader = Some(shader);
        self.journal
            .borrow_mut()
            .push(Command::BindVertexShader(shader));
        Ok(())
    }

    fn bind_pixel_shader(&mut self, shader: ShaderId) -> DeviceResult<()> {
        self.check_known(Resource::PixelShader(shader))?;
        self.pixel_shader = Some(shader);
        self.journal.borrow_mut().push(Command::BindPixelShader(shader));
        Ok(())
    }

    fn begin_scene(&mut self) -> DeviceResult<()> {
        if self.in_scene {
            return Err(DeviceError::Backend("begin_scene inside a scene".into()));
        }
        self.in_scene = true;
        self.journal.borrow_mut().push(Command::BeginScene);
        Ok(())
    }

    fn clear(
        &mut self,
        flags: ClearFlags,
        color: [f32; 4],
        _depth: f32,
        _stencil: u32,
    ) -> DeviceResult<()> {
        if flags.contains(ClearFlags::TARGET) {
            for surface in self.outputs.into_iter().flatten() {
                self.image_mut(surface)?.fill(color);
            }
        }
        self.journal.borrow_mut().push(Command::Clear(flags));
        Ok(())
    }

    fn draw_indexed(&mut self, geometry: GeometryId) -> DeviceResult<()> {
        if !self.in_scene {
            return Err(DeviceError::Backend("draw outside begin/end scene".into()));
        }
        if let Some(remaining) = self.draws_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(DeviceError::SurfaceLost);
            }
            *remaining -= 1;
        }
        self.check_known(Resource::Geometry(geometry))?;

        let (Some(vs), Some(ps)) = (self.vertex_shader, self.pixel_shader) else {
            return Err(DeviceError::Backend("draw without bound shaders".into()));
        };
        let vertex_shader = self.vertex_shaders.get(&vs).cloned().unwrap_or_default();
        let pixel_shader = self.pixel_shaders.get(&ps).cloned().unwrap_or_default();

        // A target may not be sampled while it is being written.
        for texture in self.textures.iter().flatten() {
            if self.outputs.contains(&Some(Surface::Target(*texture))) {
                return Err(DeviceError::Backend(format!(
                    "render target {} is bound as both input and output",
                    texture.0
                )));
            }
        }

        self.journal.borrow_mut().push(Command::Draw(DrawCall {
            geometry,
            vertex_shader,
            pixel_shader: pixel_shader.clone(),
            outputs: self.outputs,
            textures: self.textures,
        }));
        self.execute(geometry, &pixel_shader)?;

        if let Some(info) = self.geometries.get(&geometry) {
            log::trace!("Drew {}", info.label);
        }
        Ok(())
    }

    fn end_scene(&mut self) -> DeviceResult<()> {
        if !self.in_scene {
            return Err(DeviceError::Backend("end_scene outside a scene".into()));
        }
        self.in_scene = false;
        self.journal.borrow_mut().push(Command::EndScene);
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.presented = Some(self.back_buffer.clone());
        self.journal.borrow_mut().push(Command::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::filter::{texel_offsets, BLUR_FILTER, NO_FILTER};

    fn taps(kernel: &crate::renderer::filter::FilterKernel) -> Taps {
        Taps {
            weights: kernel.pixel_constants(),
            offsets: texel_offsets(),
        }
    }

    fn gradient(width: u32, height: u32) -> Image {
        map_image(width, height, |x, y| {
            [x as f32 / width as f32, y as f32 / height as f32, 0.5, 1.0]
        })
    }

    #[test]
    fn sampling_clamps_to_the_edges() {
        let image = gradient(4, 4);
        assert_eq!(image.sample(-3, 0), image.get(0, 0));
        assert_eq!(image.sample(9, 9), image.get(3, 3));
    }

    #[test]
    fn the_no_op_kernel_reproduces_its_source() {
        let image = gradient(6, 5);
        assert_eq!(convolve(&image, &taps(&NO_FILTER)), image);
    }

    #[test]
    fn zero_edges_leave_the_blur_source_untouched() {
        let image = gradient(6, 5);
        let edges = Image::new(6, 5);
        assert_eq!(blur(&image, &edges, &taps(&BLUR_FILTER)), image);
    }

    #[test]
    fn device_starts_bound_to_the_back_buffer() {
        let device = SoftwareDevice::new(4, 4);
        assert_eq!(device.render_target(0).unwrap(), Some(Surface::BackBuffer));
        assert_eq!(device.render_target(1).unwrap(), None);
    }

    #[test]
    fn injected_creation_failure_hits_the_requested_call() {
        let mut device = SoftwareDevice::new(4, 4);
        device.fail_creation_after(1);
        assert!(device.create_render_target(4, 4, "a").is_ok());
        assert_eq!(
            device.create_render_target(4, 4, "b"),
            Err(DeviceError::OutOfMemory)
        );
    }

    #[test]
    fn draws_need_an_open_scene() {
        let mut device = SoftwareDevice::new(4, 4);
        assert!(device.draw_indexed(GeometryId(1)).is_err());
    }
}
