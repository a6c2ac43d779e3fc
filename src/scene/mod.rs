// scene/mod.rs

pub mod camera;
pub mod demo;
pub mod model;
pub mod transform;

pub use camera::{Camera, OrbitSettings};
pub use demo::build_demo_scene;
pub use model::{AnimatedModel, Animation, ModelId, Plane};
pub use transform::Transform;
