// renderer/wgpu_device.rs
//
// `Device` on top of wgpu. Immediate-mode calls are recorded into pass
// segments: a segment closes whenever the output bindings change or a clear
// follows a draw, and the whole frame is encoded at `end_scene`. Each draw
// snapshots the register file into a dynamic-offset uniform buffer so later
// constant uploads never leak into earlier draws.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::DeviceError;
use crate::renderer::depth::{Depth, DEPTH_FORMAT};
use crate::renderer::device::{
    check_registers, check_sampler, check_slot, ClearFlags, CullMode, Device, DeviceResult,
    FillMode, GeometryDesc, GeometryId, RenderState, Resource, ShaderId, StencilTest, Surface,
    TargetId, VertexLayout, OUTPUT_SLOT_COUNT, PIXEL_REGISTER_COUNT, SAMPLER_COUNT,
    VERTEX_REGISTER_COUNT,
};
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::shader::{
    COLOR_PIXEL_SHADER, DIFFUSE_VERTEX_SHADER, LIGHT_SOURCE_VERTEX_SHADER, MORPHING_VERTEX_SHADER,
    SHADOW_PIXEL_SHADER, SHADOW_VERTEX_SHADER, SKINNING_VERTEX_SHADER, TARGET_BLUR_PIXEL_SHADER,
    TARGET_EDGES_PIXEL_SHADER, TARGET_PIXEL_SHADER, TARGET_VERTEX_SHADER,
};
use crate::settings::RenderSettings;

/// Off-screen targets hold signed normals, so they need a float format.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

const REGISTER_BLOCK_SIZE: u64 = ((VERTEX_REGISTER_COUNT + PIXEL_REGISTER_COUNT) * 16) as u64;
const INITIAL_DRAW_CAPACITY: u32 = 64;
const SHADOW_DEPTH_BIAS: i32 = -2;

const COMMON_SHADER: &str = include_str!("../shader/common.wgsl");

/// Maps a shader file name to its WGSL body (without the common prelude).
pub fn shader_source(name: &str) -> Option<&'static str> {
    let source = match name {
        DIFFUSE_VERTEX_SHADER => include_str!("../shader/diffuse_vs.wgsl"),
        SKINNING_VERTEX_SHADER => include_str!("../shader/skinning_vs.wgsl"),
        MORPHING_VERTEX_SHADER => include_str!("../shader/morphing_vs.wgsl"),
        LIGHT_SOURCE_VERTEX_SHADER => include_str!("../shader/light_source_vs.wgsl"),
        SHADOW_VERTEX_SHADER => include_str!("../shader/shadow_vs.wgsl"),
        TARGET_VERTEX_SHADER => include_str!("../shader/target_vs.wgsl"),
        COLOR_PIXEL_SHADER => include_str!("../shader/color_ps.wgsl"),
        SHADOW_PIXEL_SHADER => include_str!("../shader/shadow_ps.wgsl"),
        TARGET_PIXEL_SHADER => include_str!("../shader/target_ps.wgsl"),
        TARGET_EDGES_PIXEL_SHADER => include_str!("../shader/target_edge_ps.wgsl"),
        TARGET_BLUR_PIXEL_SHADER => include_str!("../shader/target_blur_ps.wgsl"),
        _ => return None,
    };
    Some(source)
}

struct GpuTarget {
    // keeps the texture alive alongside its view
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    layout: VertexLayout,
}

struct GpuShader {
    name: String,
    module: wgpu::ShaderModule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    vertex_shader: ShaderId,
    pixel_shader: ShaderId,
    layout: VertexLayout,
    formats: [Option<wgpu::TextureFormat>; OUTPUT_SLOT_COUNT as usize],
    cull: CullMode,
    fill: FillMode,
    blend: bool,
    stencil: Option<StencilTest>,
    stencil_mask: u8,
}

impl PipelineKey {
    fn depth_stencil(&self) -> wgpu::DepthStencilState {
        // full-screen quads ignore depth
        let full_screen = self.layout == VertexLayout::Textured;
        let shadow = self.stencil == Some(StencilTest::EqualIncrement);

        let face = match self.stencil {
            None => wgpu::StencilFaceState::IGNORE,
            Some(StencilTest::Replace) => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Replace,
            },
            Some(StencilTest::EqualIncrement) => wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Equal,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::IncrementClamp,
            },
        };
        let mask = if self.stencil.is_some() {
            self.stencil_mask as u32
        } else {
            0
        };

        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !full_screen && !shadow,
            depth_compare: if full_screen {
                wgpu::CompareFunction::Always
            } else {
                wgpu::CompareFunction::LessEqual
            },
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: mask,
                write_mask: mask,
            },
            bias: if shadow {
                wgpu::DepthBiasState {
                    constant: SHADOW_DEPTH_BIAS,
                    slope_scale: 0.0,
                    clamp: 0.0,
                }
            } else {
                wgpu::DepthBiasState::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingClear {
    flags: ClearFlags,
    color: [f32; 4],
    depth: f32,
    stencil: u32,
}

struct DrawOp {
    pipeline: PipelineKey,
    geometry: GeometryId,
    textures: [Option<TargetId>; SAMPLER_COUNT as usize],
    register_offset: u32,
    stencil_ref: u32,
}

/// Draws sharing one set of attachments; becomes one render pass.
struct Segment {
    outputs: [Option<Surface>; OUTPUT_SLOT_COUNT as usize],
    size: (u32, u32),
    clear: Option<PendingClear>,
    draws: Vec<DrawOp>,
}

impl Segment {
    fn color_load(&self) -> wgpu::LoadOp<wgpu::Color> {
        match self.clear {
            Some(clear) if clear.flags.contains(ClearFlags::TARGET) => {
                let [r, g, b, a] = clear.color.map(f64::from);
                wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
            }
            _ => wgpu::LoadOp::Load,
        }
    }

    fn depth_load(&self) -> wgpu::LoadOp<f32> {
        match self.clear {
            Some(clear) if clear.flags.contains(ClearFlags::ZBUFFER) => {
                wgpu::LoadOp::Clear(clear.depth)
            }
            _ => wgpu::LoadOp::Load,
        }
    }

    fn stencil_load(&self) -> wgpu::LoadOp<u32> {
        match self.clear {
            Some(clear) if clear.flags.contains(ClearFlags::STENCIL) => {
                wgpu::LoadOp::Clear(clear.stencil)
            }
            _ => wgpu::LoadOp::Load,
        }
    }
}

/// Binding state mutated by the immediate-mode calls.
struct BindingState {
    outputs: [Option<Surface>; OUTPUT_SLOT_COUNT as usize],
    textures: [Option<TargetId>; SAMPLER_COUNT as usize],
    vertex_shader: Option<ShaderId>,
    pixel_shader: Option<ShaderId>,
    vertex_registers: [[f32; 4]; VERTEX_REGISTER_COUNT as usize],
    pixel_registers: [[f32; 4]; PIXEL_REGISTER_COUNT as usize],
    cull: CullMode,
    fill: FillMode,
    blend: bool,
    stencil_enabled: bool,
    stencil_test: StencilTest,
    stencil_ref: u32,
    stencil_mask: u8,
    in_scene: bool,
}

impl Default for BindingState {
    fn default() -> Self {
        Self {
            outputs: [Some(Surface::BackBuffer), None],
            textures: [None; SAMPLER_COUNT as usize],
            vertex_shader: None,
            pixel_shader: None,
            vertex_registers: [[0.0; 4]; VERTEX_REGISTER_COUNT as usize],
            pixel_registers: [[0.0; 4]; PIXEL_REGISTER_COUNT as usize],
            cull: CullMode::Back,
            fill: FillMode::Solid,
            blend: false,
            stencil_enabled: false,
            stencil_test: StencilTest::Replace,
            stencil_ref: 0,
            stencil_mask: 0xff,
            in_scene: false,
        }
    }
}

pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    line_mode_supported: bool,

    register_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    white: wgpu::TextureView,

    register_buf: wgpu::Buffer,
    register_capacity: u32,
    register_bind_group: wgpu::BindGroup,
    register_stride: u64,
    register_scratch: Vec<u8>,

    targets: HashMap<TargetId, GpuTarget>,
    geometries: HashMap<GeometryId, GpuGeometry>,
    vertex_shaders: HashMap<ShaderId, GpuShader>,
    pixel_shaders: HashMap<ShaderId, GpuShader>,
    next_id: u32,

    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_groups: HashMap<[Option<TargetId>; SAMPLER_COUNT as usize], wgpu::BindGroup>,
    depth_buffers: HashMap<(u32, u32), Depth>,

    state: BindingState,
    frame: Option<wgpu::SurfaceTexture>,
    frame_view: Option<wgpu::TextureView>,
    segments: Vec<Segment>,
}

fn backend(err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Backend(err.to_string())
}

fn map_surface_error(err: wgpu::SurfaceError) -> DeviceError {
    match err {
        wgpu::SurfaceError::OutOfMemory => DeviceError::OutOfMemory,
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => DeviceError::SurfaceLost,
        other => backend(other),
    }
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> DeviceResult<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window).map_err(backend)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(backend)?;

        let line_mode_supported = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if line_mode_supported {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            log::warn!("Adapter lacks line polygon mode; wireframe draws stay solid");
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(backend)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| backend("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|m| *m == wgpu::CompositeAlphaMode::Opaque)
            .or_else(|| surface_caps.alpha_modes.first().copied())
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: settings.present_mode(&surface_caps.present_modes),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface configured: {}x{} {:?} {:?}",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );

        let register_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("RegisterBindLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(REGISTER_BLOCK_SIZE),
                },
                count: None,
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("TextureBindLayout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PipelineLayout"),
            bind_group_layouts: &[&register_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        // nearest, clamp to edge
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("TargetSampler"),
            ..Default::default()
        });

        let white = device
            .create_texture_with_data(
                &queue,
                &wgpu::TextureDescriptor {
                    label: Some("DefaultTexture"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[255, 255, 255, 255],
            )
            .create_view(&wgpu::TextureViewDescriptor::default());

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let register_stride = align_to(REGISTER_BLOCK_SIZE, alignment);
        let (register_buf, register_bind_group) = Self::create_register_buffer(
            &device,
            &register_layout,
            register_stride,
            INITIAL_DRAW_CAPACITY,
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            line_mode_supported,
            register_layout,
            texture_layout,
            pipeline_layout,
            sampler,
            white,
            register_buf,
            register_capacity: INITIAL_DRAW_CAPACITY,
            register_bind_group,
            register_stride,
            register_scratch: Vec::new(),
            targets: HashMap::new(),
            geometries: HashMap::new(),
            vertex_shaders: HashMap::new(),
            pixel_shaders: HashMap::new(),
            next_id: 1,
            pipelines: HashMap::new(),
            texture_groups: HashMap::new(),
            depth_buffers: HashMap::new(),
            state: BindingState::default(),
            frame: None,
            frame_view: None,
            segments: Vec::new(),
        })
    }

    fn create_register_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: u32,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("RegisterBuffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("RegisterBindGroup"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(REGISTER_BLOCK_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        // keep only depth buffers some render target still matches
        let target_sizes: Vec<(u32, u32)> = self
            .targets
            .values()
            .map(|t| (t.width, t.height))
            .collect();
        self.depth_buffers
            .retain(|size, _| target_sizes.contains(size));
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn compile(&self, name: &str) -> DeviceResult<GpuShader> {
        let body = shader_source(name).ok_or_else(|| DeviceError::ShaderNotFound(name.into()))?;
        let source = format!("{}\n{}", COMMON_SHADER, body);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DeviceError::Backend(format!("shader `{name}`: {err}")));
        }

        Ok(GpuShader {
            name: name.to_owned(),
            module,
        })
    }

    fn acquire_frame(&mut self) -> DeviceResult<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(map_surface_error)
            }
            Err(err) => Err(map_surface_error(err)),
        }
    }

    fn surface_extent(&self, surface: Surface) -> DeviceResult<(u32, u32)> {
        match surface {
            Surface::BackBuffer => Ok((self.config.width, self.config.height)),
            Surface::Target(id) => self
                .targets
                .get(&id)
                .map(|t| (t.width, t.height))
                .ok_or(DeviceError::UnknownResource {
                    kind: "render target",
                    id: id.0,
                }),
        }
    }

    fn surface_format(&self, surface: Surface) -> wgpu::TextureFormat {
        match surface {
            Surface::BackBuffer => self.config.format,
            Surface::Target(_) => TARGET_FORMAT,
        }
    }

    fn surface_view(&self, surface: Surface) -> DeviceResult<&wgpu::TextureView> {
        match surface {
            Surface::BackBuffer => self
                .frame_view
                .as_ref()
                .ok_or_else(|| backend("back buffer used outside a scene")),
            Surface::Target(id) => self
                .targets
                .get(&id)
                .map(|t| &t.view)
                .ok_or(DeviceError::UnknownResource {
                    kind: "render target",
                    id: id.0,
                }),
        }
    }

    /// The segment matching the current outputs, opening one if needed.
    fn current_segment(&mut self) -> DeviceResult<&mut Segment> {
        let outputs = self.state.outputs;
        let reuse = matches!(self.segments.last(), Some(s) if s.outputs == outputs);
        if !reuse {
            let first = outputs
                .into_iter()
                .flatten()
                .next()
                .ok_or_else(|| backend("no render target bound"))?;
            let size = self.surface_extent(first)?;
            let device = &self.device;
            self.depth_buffers
                .entry(size)
                .or_insert_with(|| Depth::new(device, size.0, size.1));
            self.segments.push(Segment {
                outputs,
                size,
                clear: None,
                draws: Vec::new(),
            });
        }
        let last = self.segments.len() - 1;
        Ok(&mut self.segments[last])
    }

    fn pipeline_key(&self, layout: VertexLayout) -> DeviceResult<PipelineKey> {
        let (Some(vertex_shader), Some(pixel_shader)) =
            (self.state.vertex_shader, self.state.pixel_shader)
        else {
            return Err(backend("draw without bound shaders"));
        };
        let formats = self.state.outputs.map(|o| o.map(|s| self.surface_format(s)));
        let fill = if self.line_mode_supported {
            self.state.fill
        } else {
            FillMode::Solid
        };
        Ok(PipelineKey {
            vertex_shader,
            pixel_shader,
            layout,
            formats,
            cull: self.state.cull,
            fill,
            blend: self.state.blend,
            stencil: self
                .state
                .stencil_enabled
                .then_some(self.state.stencil_test),
            stencil_mask: self.state.stencil_mask,
        })
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> DeviceResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let vs = self
            .vertex_shaders
            .get(&key.vertex_shader)
            .ok_or(DeviceError::UnknownResource {
                kind: "vertex shader",
                id: key.vertex_shader.0,
            })?;
        let ps = self
            .pixel_shaders
            .get(&key.pixel_shader)
            .ok_or(DeviceError::UnknownResource {
                kind: "pixel shader",
                id: key.pixel_shader.0,
            })?;

        let label = format!("{} + {}", vs.name, ps.name);
        let blend = key.blend.then_some(wgpu::BlendState::ALPHA_BLENDING);
        let cull = match key.cull {
            CullMode::None => None,
            CullMode::Back => Some(wgpu::Face::Back),
        };
        let polygon_mode = match key.fill {
            FillMode::Solid => wgpu::PolygonMode::Fill,
            FillMode::Wireframe => wgpu::PolygonMode::Line,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut builder =
            PipelineBuilder::new(&self.device, &self.pipeline_layout, &vs.module, &ps.module)
                .with_label(&label)
                .with_vertex_buffer(key.layout.buffer_layout())
                .with_cull_mode(cull)
                .with_polygon_mode(polygon_mode)
                .with_depth_stencil(key.depth_stencil());
        for format in key.formats {
            builder = builder.with_color_target(format, blend);
        }
        let pipeline = builder.build();
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(DeviceError::Backend(format!("pipeline `{label}`: {err}")));
        }

        log::debug!("Created pipeline {} ({} cached)", label, self.pipelines.len() + 1);
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn ensure_texture_group(
        &mut self,
        textures: [Option<TargetId>; SAMPLER_COUNT as usize],
    ) -> DeviceResult<()> {
        if self.texture_groups.contains_key(&textures) {
            return Ok(());
        }
        let mut views = [&self.white, &self.white];
        for (view, texture) in views.iter_mut().zip(textures) {
            if let Some(id) = texture {
                *view = self
                    .targets
                    .get(&id)
                    .map(|t| &t.view)
                    .ok_or(DeviceError::UnknownResource {
                        kind: "render target",
                        id: id.0,
                    })?;
            }
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("TextureBindGroup"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.texture_groups.insert(textures, bind_group);
        Ok(())
    }

    /// Appends the register file to this frame's uniform data.
    fn snapshot_registers(&mut self) -> u32 {
        let offset = self.register_scratch.len();
        self.register_scratch
            .extend_from_slice(bytemuck::cast_slice(&self.state.vertex_registers[..]));
        self.register_scratch
            .extend_from_slice(bytemuck::cast_slice(&self.state.pixel_registers[..]));
        self.register_scratch
            .resize(offset + self.register_stride as usize, 0);
        offset as u32
    }

    fn upload_registers(&mut self) {
        let required = (self.register_scratch.len() as u64 / self.register_stride) as u32;
        if required > self.register_capacity {
            let new_capacity = required.max(self.register_capacity * 2);
            log::info!(
                "Growing register buffer: {} -> {}",
                self.register_capacity,
                new_capacity
            );
            let (buffer, bind_group) = Self::create_register_buffer(
                &self.device,
                &self.register_layout,
                self.register_stride,
                new_capacity,
            );
            self.register_buf = buffer;
            self.register_bind_group = bind_group;
            self.register_capacity = new_capacity;
        }
        if !self.register_scratch.is_empty() {
            self.queue
                .write_buffer(&self.register_buf, 0, &self.register_scratch);
        }
    }

    fn encode_segment(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        segment: &Segment,
    ) -> DeviceResult<()> {
        let mut color_attachments = Vec::with_capacity(OUTPUT_SLOT_COUNT as usize);
        for output in segment.outputs {
            let attachment = match output {
                Some(surface) => Some(wgpu::RenderPassColorAttachment {
                    view: self.surface_view(surface)?,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: segment.color_load(),
                        store: wgpu::StoreOp::Store,
                    },
                }),
                None => None,
            };
            color_attachments.push(attachment);
        }
        let depth = self
            .depth_buffers
            .get(&segment.size)
            .ok_or_else(|| backend("missing depth buffer"))?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ScenePass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: segment.depth_load(),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: segment.stencil_load(),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &segment.draws {
            let (Some(pipeline), Some(geometry), Some(textures)) = (
                self.pipelines.get(&draw.pipeline),
                self.geometries.get(&draw.geometry),
                self.texture_groups.get(&draw.textures),
            ) else {
                log::warn!("Skipping draw whose resources were released mid-frame");
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.register_bind_group, &[draw.register_offset]);
            pass.set_bind_group(1, textures, &[]);
            pass.set_stencil_reference(draw.stencil_ref);
            pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
            pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..geometry.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn flush(&mut self) -> DeviceResult<()> {
        let segments = std::mem::take(&mut self.segments);
        if segments.is_empty() {
            return Ok(());
        }
        self.upload_registers();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Encoder"),
            });
        let encoded = segments
            .iter()
            .try_for_each(|segment| self.encode_segment(&mut encoder, segment));
        self.register_scratch.clear();
        encoded?;

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl Device for WgpuDevice {
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        label: &str,
    ) -> DeviceResult<TargetId> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TargetId(self.allocate());
        self.targets.insert(
            id,
            GpuTarget {
                _texture: texture,
                view,
                width,
                height,
            },
        );
        log::debug!("Created render target {} ({}x{})", label, width, height);
        Ok(id)
    }

    fn create_geometry(&mut self, desc: &GeometryDesc<'_>) -> DeviceResult<GeometryId> {
        if desc.vertices.len() != desc.layout.stride() * desc.vertex_count as usize {
            return Err(DeviceError::Backend(format!(
                "geometry `{}` has a truncated vertex buffer",
                desc.label
            )));
        }
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents: desc.vertices,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents: bytemuck::cast_slice(desc.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = GeometryId(self.allocate());
        self.geometries.insert(
            id,
            GpuGeometry {
                vertex_buffer,
                index_buffer,
                index_count: desc.primitive_count * 3,
                layout: desc.layout,
            },
        );
        Ok(id)
    }

    fn create_vertex_shader(&mut self, name: &str) -> DeviceResult<ShaderId> {
        let shader = self.compile(name)?;
        let id = ShaderId(self.allocate());
        self.vertex_shaders.insert(id, shader);
        Ok(id)
    }

    fn create_pixel_shader(&mut self, name: &str) -> DeviceResult<ShaderId> {
        let shader = self.compile(name)?;
        let id = ShaderId(self.allocate());
        self.pixel_shaders.insert(id, shader);
        Ok(id)
    }

    fn release(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Target(id) => {
                self.texture_groups
                    .retain(|textures, _| !textures.contains(&Some(id)));
                self.targets.remove(&id).is_some()
            }
            Resource::Geometry(id) => self.geometries.remove(&id).is_some(),
            Resource::VertexShader(id) => {
                self.pipelines.retain(|key, _| key.vertex_shader != id);
                self.vertex_shaders.remove(&id).is_some()
            }
            Resource::PixelShader(id) => {
                self.pipelines.retain(|key, _| key.pixel_shader != id);
                self.pixel_shaders.remove(&id).is_some()
            }
        };
        if !removed {
            log::warn!("Release of unknown resource {:?}", resource);
        }
    }

    fn set_render_state(&mut self, state: RenderState) -> DeviceResult<()> {
        let s = &mut self.state;
        match state {
            RenderState::CullMode(cull) => s.cull = cull,
            RenderState::StencilEnable(enabled) => s.stencil_enabled = enabled,
            RenderState::StencilTest(test) => s.stencil_test = test,
            RenderState::StencilRef(value) => s.stencil_ref = value,
            RenderState::StencilMask(mask) => s.stencil_mask = mask,
            RenderState::AlphaBlend(enabled) => s.blend = enabled,
            RenderState::FillMode(fill) => {
                if fill == FillMode::Wireframe && !self.line_mode_supported {
                    log::warn!("Wireframe requested but unsupported; keeping solid fill");
                }
                s.fill = fill;
            }
        }
        Ok(())
    }

    fn set_vertex_constants(&mut self, register: u32, data: &[[f32; 4]]) -> DeviceResult<()> {
        check_registers(register, data.len(), VERTEX_REGISTER_COUNT)?;
        let start = register as usize;
        self.state.vertex_registers[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn set_pixel_constants(&mut self, register: u32, data: &[[f32; 4]]) -> DeviceResult<()> {
        check_registers(register, data.len(), PIXEL_REGISTER_COUNT)?;
        let start = register as usize;
        self.state.pixel_registers[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn render_target(&self, slot: u32) -> DeviceResult<Option<Surface>> {
        check_slot(slot)?;
        Ok(self.state.outputs[slot as usize])
    }

    fn set_render_target(&mut self, slot: u32, surface: Option<Surface>) -> DeviceResult<()> {
        check_slot(slot)?;
        if let Some(surface) = surface {
            self.surface_extent(surface)?;
        }
        self.state.outputs[slot as usize] = surface;
        Ok(())
    }

    fn set_texture(&mut self, sampler: u32, target: Option<TargetId>) -> DeviceResult<()> {
        check_sampler(sampler)?;
        if let Some(id) = target {
            self.surface_extent(Surface::Target(id))?;
        }
        self.state.textures[sampler as usize] = target;
        Ok(())
    }

    fn bind_vertex_shader(&mut self, shader: ShaderId) -> DeviceResult<()> {
        if !self.vertex_shaders.contains_key(&shader) {
            return Err(DeviceError::UnknownResource {
                kind: "vertex shader",
                id: shader.0,
            });
        }
        self.state.vertex_shader = Some(shader);
        Ok(())
    }

    fn bind_pixel_shader(&mut self, shader: ShaderId) -> DeviceResult<()> {
        if !self.pixel_shaders.contains_key(&shader) {
            return Err(DeviceError::UnknownResource {
                kind: "pixel shader",
                id: shader.0,
            });
        }
        self.state.pixel_shader = Some(shader);
        Ok(())
    }

    fn begin_scene(&mut self) -> DeviceResult<()> {
        if self.state.in_scene {
            return Err(backend("begin_scene inside a scene"));
        }
        let frame = self.acquire_frame()?;
        self.frame_view = Some(
            frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        self.frame = Some(frame);
        self.state.in_scene = true;
        Ok(())
    }

    fn clear(
        &mut self,
        flags: ClearFlags,
        color: [f32; 4],
        depth: f32,
        stencil: u32,
    ) -> DeviceResult<()> {
        if !self.state.in_scene {
            return Err(backend("clear outside begin/end scene"));
        }
        let pending = PendingClear {
            flags,
            color,
            depth,
            stencil,
        };
        let segment = self.current_segment()?;
        if segment.draws.is_empty() {
            segment.clear = Some(pending);
        } else {
            // a clear after draws starts a fresh pass on the same outputs
            let (outputs, size) = (segment.outputs, segment.size);
            self.segments.push(Segment {
                outputs,
                size,
                clear: Some(pending),
                draws: Vec::new(),
            });
        }
        Ok(())
    }

    fn draw_indexed(&mut self, geometry: GeometryId) -> DeviceResult<()> {
        if !self.state.in_scene {
            return Err(backend("draw outside begin/end scene"));
        }
        for texture in self.state.textures.iter().flatten() {
            if self.state.outputs.contains(&Some(Surface::Target(*texture))) {
                return Err(DeviceError::Backend(format!(
                    "render target {} is bound as both input and output",
                    texture.0
                )));
            }
        }
        let layout = self
            .geometries
            .get(&geometry)
            .map(|g| g.layout)
            .ok_or(DeviceError::UnknownResource {
                kind: "geometry",
                id: geometry.0,
            })?;

        let key = self.pipeline_key(layout)?;
        self.ensure_pipeline(key)?;
        let textures = self.state.textures;
        self.ensure_texture_group(textures)?;
        let register_offset = self.snapshot_registers();
        let stencil_ref = self.state.stencil_ref;

        self.current_segment()?.draws.push(DrawOp {
            pipeline: key,
            geometry,
            textures,
            register_offset,
            stencil_ref,
        });
        Ok(())
    }

    fn end_scene(&mut self) -> DeviceResult<()> {
        if !self.state.in_scene {
            return Err(backend("end_scene outside a scene"));
        }
        self.state.in_scene = false;
        self.flush()
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.frame_view = None;
        match self.frame.take() {
            Some(frame) => {
                frame.present();
                Ok(())
            }
            None => Err(backend("present without a rendered frame")),
        }
    }
}
