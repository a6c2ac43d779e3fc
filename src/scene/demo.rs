// scene/demo.rs
//
// The default scene: a floor plane, a marker at the point light, a bending
// cylinder, a cube that morphs into a sphere and a static cube.

use glam::Vec3;

use crate::error::Result;
use crate::renderer::device::Device;
use crate::renderer::geometry::GeometryBuffer;
use crate::renderer::primitives::{
    cube_mesh, plane_mesh, skinned_cylinder_mesh, sphere_mesh, subdivided_cube_mesh,
};
use crate::renderer::scene_renderer::SceneRenderer;
use crate::renderer::shader::{
    ShaderSet, COLOR_PIXEL_SHADER, DIFFUSE_VERTEX_SHADER, LIGHT_SOURCE_VERTEX_SHADER,
    MORPHING_VERTEX_SHADER, SHADOW_PIXEL_SHADER, SHADOW_VERTEX_SHADER, SKINNING_VERTEX_SHADER,
};
use crate::scene::model::{AnimatedModel, Animation, Plane};
use crate::scene::transform::Transform;

const FLOOR_HEIGHT: f32 = -0.3;
const LIGHT_SOURCE_RADIUS: f32 = 0.04;
const CYLINDER_HEIGHT: f32 = 0.8;
const MORPH_CUBE_SIZE: f32 = 0.4;
const MORPH_FINAL_RADIUS: f32 = 0.25;

/// Installs the demo plane, light source, target plane and models.
pub fn build_demo_scene<D: Device>(renderer: &mut SceneRenderer<D>) -> Result<()> {
    let color = renderer.load_pixel_shader(COLOR_PIXEL_SHADER)?;
    let diffuse = renderer.load_vertex_shader(DIFFUSE_VERTEX_SHADER)?;
    let skinning = renderer.load_vertex_shader(SKINNING_VERTEX_SHADER)?;
    let morphing = renderer.load_vertex_shader(MORPHING_VERTEX_SHADER)?;
    let light = renderer.load_vertex_shader(LIGHT_SOURCE_VERTEX_SHADER)?;
    let shadow_vertex = renderer.load_vertex_shader(SHADOW_VERTEX_SHADER)?;
    let shadow_pixel = renderer.load_pixel_shader(SHADOW_PIXEL_SHADER)?;

    let with_shadow = |vertex| ShaderSet {
        vertex,
        pixel: color,
        shadow_vertex,
        shadow_pixel,
    };

    let (vertices, indices) = plane_mesh(3.0);
    let plane = Plane::new(
        renderer.device_mut(),
        &vertices,
        &indices,
        ShaderSet::unshadowed(diffuse, color),
        Transform::new(Vec3::new(0.0, 0.0, FLOOR_HEIGHT), Vec3::ZERO),
    )?;
    renderer.set_plane(plane);

    let (vertices, indices) = sphere_mesh(1.0, 12, 6);
    let geometry = GeometryBuffer::new(renderer.device_mut(), "LightSource", &vertices, &indices)?;
    renderer.set_light_source(AnimatedModel::new(
        geometry,
        ShaderSet::unshadowed(light, color),
        Transform::default(),
        Animation::light_source(LIGHT_SOURCE_RADIUS),
    ));

    renderer.create_target_plane()?;

    let (vertices, indices) = skinned_cylinder_mesh(0.08, CYLINDER_HEIGHT, 16, 12);
    let geometry = GeometryBuffer::new(renderer.device_mut(), "Cylinder", &vertices, &indices)?;
    renderer.add_model(AnimatedModel::new(
        geometry,
        with_shadow(skinning),
        Transform::new(Vec3::new(-0.5, 0.3, FLOOR_HEIGHT), Vec3::ZERO),
        Animation::skinning(Vec3::new(0.0, 0.0, CYLINDER_HEIGHT / 2.0)),
    ));

    let (vertices, indices) = subdivided_cube_mesh(MORPH_CUBE_SIZE, 8);
    let geometry = GeometryBuffer::new(renderer.device_mut(), "MorphingCube", &vertices, &indices)?;
    renderer.add_model(AnimatedModel::new(
        geometry,
        with_shadow(morphing),
        Transform::new(Vec3::new(0.4, 0.3, 0.05), Vec3::new(0.0, 0.0, 0.3)),
        Animation::morphing(MORPH_FINAL_RADIUS),
    ));

    let (vertices, indices) = cube_mesh(0.3);
    let geometry = GeometryBuffer::new(renderer.device_mut(), "Cube", &vertices, &indices)?;
    renderer.add_model(AnimatedModel::new(
        geometry,
        with_shadow(diffuse),
        Transform::new(Vec3::new(0.0, -0.4, FLOOR_HEIGHT + 0.15), Vec3::new(0.0, 0.0, 0.4)),
        Animation::Static,
    ));

    log::info!("Demo scene built with {} models", renderer.model_count());
    Ok(())
}
