// src/renderer/pipeline_builder.rs

/// Builder for creating render pipelines with sensible defaults
///
/// Vertex and fragment stages may come from different modules: the device
/// pairs any loaded vertex shader with any loaded pixel shader.
pub struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    vertex_shader: &'a wgpu::ShaderModule,
    fragment_shader: &'a wgpu::ShaderModule,
    vertex_entry: &'a str,
    fragment_entry: &'a str,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'a>>,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    primitive: wgpu::PrimitiveState,
}

impl<'a> PipelineBuilder<'a> {
    /// Create a new pipeline builder with required parameters
    pub fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        vertex_shader: &'a wgpu::ShaderModule,
        fragment_shader: &'a wgpu::ShaderModule,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            vertex_shader,
            fragment_shader,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_buffers: Vec::new(),
            color_targets: Vec::new(),
            depth_stencil: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
        }
    }

    /// Set the pipeline label for debugging
    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    /// Add a vertex buffer layout
    pub fn with_vertex_buffer(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    /// Add a color target; `None` keeps the slot empty
    pub fn with_color_target(
        mut self,
        format: Option<wgpu::TextureFormat>,
        blend: Option<wgpu::BlendState>,
    ) -> Self {
        self.color_targets.push(format.map(|format| wgpu::ColorTargetState {
            format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    /// Configure depth and stencil in one go
    pub fn with_depth_stencil(mut self, state: wgpu::DepthStencilState) -> Self {
        self.depth_stencil = Some(state);
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.primitive.cull_mode = cull_mode;
        self
    }

    pub fn with_polygon_mode(mut self, polygon_mode: wgpu::PolygonMode) -> Self {
        self.primitive.polygon_mode = polygon_mode;
        self
    }

    /// Build the render pipeline
    pub fn build(self) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: self.label,
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.vertex_shader,
                entry_point: Some(self.vertex_entry),
                buffers: &self.vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: self.fragment_shader,
                entry_point: Some(self.fragment_entry),
                targets: &self.color_targets,
                compilation_options: Default::default(),
            }),
            primitive: self.primitive,
            depth_stencil: self.depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}
