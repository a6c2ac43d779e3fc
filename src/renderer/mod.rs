pub mod constants;
pub mod depth;
pub mod device;
pub mod filter;
pub mod geometry;
pub mod pipeline_builder;
pub mod primitives;
pub mod scene_renderer;
pub mod shader;
pub mod software;
pub mod target;
pub mod vertex;
pub mod wgpu_device;

pub use depth::Depth;
pub use device::{Device, Surface, TargetId};
pub use filter::{FilterKernel, FilterMode, FilterPipeline};
pub use geometry::GeometryBuffer;
pub use pipeline_builder::PipelineBuilder;
pub use scene_renderer::SceneRenderer;
pub use software::SoftwareDevice;
pub use target::RenderTarget;
pub use vertex::Vertex;
pub use wgpu_device::WgpuDevice;
