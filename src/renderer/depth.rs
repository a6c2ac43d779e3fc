pub struct Depth {
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// Depth plus the stencil bits the shadow pass tests against.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

impl Depth {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let format = DEPTH_FORMAT;
        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("DepthStencil"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view, format }
    }
}
