// scene/model.rs
//
// Drawable models: geometry, the shaders that draw it, a transform and a
// per-frame animation that feeds the model's block of shader constants.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};

use crate::error::{DemoError, Result};
use crate::renderer::constants::{float, ConstantWriter, VECTORS_IN_MATRIX};
use crate::renderer::device::{Device, Resource, TargetId};
use crate::renderer::geometry::{GeometryBuffer, Index};
use crate::renderer::shader::ShaderSet;
use crate::renderer::vertex::{Vertex, BONES_COUNT};
use crate::scene::transform::{rotate_x_about, rotation_matrix, Transform};

pub const SKINNING_ANGLE: f32 = PI / 8.0;
pub const SKINNING_PERIOD: f32 = 2.0;
pub const MORPHING_PERIOD: f32 = 3.0;

/// Bend of bone 0 at `time` seconds.
pub fn skinning_angle(time: f32) -> f32 {
    SKINNING_ANGLE * (2.0 * PI / SKINNING_PERIOD * time).sin()
}

/// Blend between base and morphed shape at `time` seconds, in [0, 1].
pub fn morphing_param(time: f32) -> f32 {
    (1.0 - (2.0 * PI / MORPHING_PERIOD * time).cos()) / 2.0
}

/// Per-variant animation state.
#[derive(Debug, Clone, PartialEq)]
pub enum Animation {
    Static,
    Skinning {
        bones: [Mat4; BONES_COUNT],
        bone_center: Vec3,
    },
    Morphing {
        param: f32,
        final_radius: f32,
    },
    LightSource {
        radius: f32,
    },
}

impl Animation {
    pub fn skinning(bone_center: Vec3) -> Self {
        Animation::Skinning {
            bones: [Mat4::IDENTITY; BONES_COUNT],
            bone_center,
        }
    }

    /// The blend parameter reads 1 until the first `set_time`.
    pub fn morphing(final_radius: f32) -> Self {
        Animation::Morphing {
            param: 1.0,
            final_radius,
        }
    }

    pub fn light_source(radius: f32) -> Self {
        Animation::LightSource { radius }
    }

    pub fn set_time(&mut self, time: f32) {
        match self {
            Animation::Static | Animation::LightSource { .. } => {}
            Animation::Skinning { bones, bone_center } => {
                bones[0] = rotate_x_about(skinning_angle(time), *bone_center);
            }
            Animation::Morphing { param, .. } => {
                *param = morphing_param(time);
            }
        }
    }

    /// Registers this variant writes per frame.
    pub fn constants_needed(&self) -> usize {
        match self {
            Animation::Static => 0,
            Animation::Skinning { .. } => BONES_COUNT * VECTORS_IN_MATRIX,
            Animation::Morphing { .. } => 2,
            Animation::LightSource { .. } => 1,
        }
    }

    /// Appends this variant's constants to `out` and returns how many were
    /// written. Nothing is written if they do not all fit.
    pub fn write_constants(&self, out: &mut ConstantWriter) -> Result<usize> {
        let needed = self.constants_needed();
        out.reserve(needed)?;
        match self {
            Animation::Static => {}
            Animation::Skinning { bones, .. } => {
                for bone in bones {
                    out.push_matrix(bone)?;
                }
            }
            Animation::Morphing {
                param,
                final_radius,
            } => {
                out.push(float(*final_radius))?;
                out.push(float(*param))?;
            }
            Animation::LightSource { radius } => {
                out.push(float(*radius))?;
            }
        }
        Ok(needed)
    }
}

/// Identifies a model added to the scene renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

#[derive(Debug)]
pub struct AnimatedModel {
    geometry: GeometryBuffer,
    shaders: ShaderSet,
    transform: Transform,
    animation: Animation,
    texture: Option<(u32, TargetId)>,
}

impl AnimatedModel {
    pub fn new(
        geometry: GeometryBuffer,
        shaders: ShaderSet,
        transform: Transform,
        animation: Animation,
    ) -> Self {
        Self {
            geometry,
            shaders,
            transform,
            animation,
            texture: None,
        }
    }

    /// Samples `target` at `sampler` whenever this model is drawn.
    pub fn with_texture(mut self, sampler: u32, target: TargetId) -> Self {
        self.texture = Some((sampler, target));
        self
    }

    pub fn set_time(&mut self, time: f32) {
        self.animation.set_time(time);
    }

    pub fn write_constants(&self, out: &mut ConstantWriter) -> Result<usize> {
        self.animation.write_constants(out)
    }

    pub fn rotate(&mut self, delta: f32) {
        self.transform.rotate(delta);
    }

    /// Submits the geometry with whatever shaders and textures are bound.
    pub fn draw<D: Device + ?Sized>(&self, device: &mut D) -> Result<()> {
        self.geometry.draw(device)
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn shaders(&self) -> &ShaderSet {
        &self.shaders
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn texture(&self) -> Option<(u32, TargetId)> {
        self.texture
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    pub fn resource(&self) -> Resource {
        self.geometry.resource()
    }
}

/// Planar-shadow projection onto the plane `dot(n, x) = d` from a point
/// light at `light`.
pub fn shadow_projection(normal: Vec3, d: f32, light: Vec3) -> Mat4 {
    let l_dot_n = light.dot(normal);
    let rows = |r: [[f32; 4]; 4]| {
        Mat4::from_cols_array_2d(&r).transpose()
    };

    let m1 = rows([
        [d, 0.0, 0.0, -d * light.x],
        [0.0, d, 0.0, -d * light.y],
        [0.0, 0.0, d, -d * light.z],
        [0.0, 0.0, 0.0, 0.0],
    ]);
    let m2 = rows([
        [l_dot_n, 0.0, 0.0, 0.0],
        [0.0, l_dot_n, 0.0, 0.0],
        [0.0, 0.0, l_dot_n, 0.0],
        [0.0, 0.0, 0.0, 0.0],
    ]);
    let m3 = rows([
        [light.x * normal.x, light.x * normal.y, light.x * normal.z, 0.0],
        [light.y * normal.x, light.y * normal.y, light.y * normal.z, 0.0],
        [light.z * normal.x, light.z * normal.y, light.z * normal.z, 0.0],
        [0.0, 0.0, 0.0, 0.0],
    ]);
    let mz = rows([
        [0.0; 4],
        [0.0; 4],
        [0.0; 4],
        [normal.x, normal.y, normal.z, -l_dot_n],
    ]);

    Mat4::ZERO - (m1 - m2 + m3 + mz)
}

/// A static model that receives shadows, with its plane equation.
#[derive(Debug)]
pub struct Plane {
    model: AnimatedModel,
    normal: Vec3,
    d: f32,
}

impl Plane {
    pub fn new<D: Device + ?Sized>(
        device: &mut D,
        vertices: &[Vertex],
        indices: &[Index],
        shaders: ShaderSet,
        transform: Transform,
    ) -> Result<Self> {
        let first = vertices
            .first()
            .ok_or_else(|| DemoError::InvalidGeometry("plane without vertices".into()))?;
        let normal = rotation_matrix(transform.rotation())
            .transform_vector3(Vec3::from(first.normal))
            .try_normalize()
            .ok_or_else(|| DemoError::InvalidGeometry("plane normal has zero length".into()))?;
        let d = transform.position().dot(normal);

        let geometry = GeometryBuffer::new(device, "Plane", vertices, indices)?;
        log::debug!("Plane normal {:?}, distance {}", normal, d);
        Ok(Self {
            model: AnimatedModel::new(geometry, shaders, transform, Animation::Static),
            normal,
            d,
        })
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn distance(&self) -> f32 {
        self.d
    }

    /// Recomputed every frame; the light may move.
    pub fn projection_matrix(&self, light: Vec3) -> Mat4 {
        shadow_projection(self.normal, self.d, light)
    }

    pub fn model(&self) -> &AnimatedModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut AnimatedModel {
        &mut self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn static_and_light_source_ignore_time() {
        let mut light = Animation::light_source(0.05);
        light.set_time(12.5);
        assert_eq!(light, Animation::light_source(0.05));
    }

    #[test]
    fn morphing_starts_fully_morphed_until_time_is_set() {
        let mut morph = Animation::morphing(0.4);
        let mut out = ConstantWriter::new();
        morph.write_constants(&mut out).unwrap();
        assert_eq!(out.as_slice(), &[[0.4; 4], [1.0; 4]]);

        morph.set_time(0.0);
        out.clear();
        morph.write_constants(&mut out).unwrap();
        assert_eq!(out.as_slice()[1], [0.0; 4]);
    }

    #[test]
    fn variants_declare_the_registers_they_write() {
        let cases = [
            (Animation::Static, 0),
            (Animation::skinning(Vec3::ZERO), 8),
            (Animation::morphing(1.0), 2),
            (Animation::light_source(1.0), 1),
        ];
        for (animation, expected) in cases {
            let mut out = ConstantWriter::new();
            assert_eq!(animation.write_constants(&mut out).unwrap(), expected);
            assert_eq!(out.len(), expected);
        }
    }

    #[test]
    fn skinning_does_not_fit_a_short_block() {
        let skin = Animation::skinning(Vec3::ZERO);
        let mut out = ConstantWriter::with_capacity(4);
        assert!(matches!(
            skin.write_constants(&mut out),
            Err(DemoError::ConstantBudgetExceeded { needed: 8, capacity: 4 })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn only_bone_zero_moves() {
        let mut skin = Animation::skinning(Vec3::new(0.0, 0.0, 0.5));
        skin.set_time(0.5);
        let Animation::Skinning { bones, .. } = &skin else {
            unreachable!()
        };
        assert!(!bones[0].abs_diff_eq(Mat4::IDENTITY, 1e-3));
        assert_eq!(bones[1], Mat4::IDENTITY);
    }

    #[test]
    fn shadow_matrix_of_a_tilted_plane_lands_points_on_the_plane() {
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let d = 0.3;
        let light = Vec3::new(0.2, 2.0, 1.5);
        let m = shadow_projection(normal, d, light);
        let p = m * Vec4::new(0.1, 0.4, 0.2, 1.0);
        let projected = p.truncate() / p.w;
        assert!((projected.dot(normal) - d).abs() < 1e-4);
    }
}
