use glam::Vec3;

use planar_shadows::renderer::primitives::plane_mesh;
use planar_shadows::renderer::shader::{
    PixelShader, ShaderSet, VertexShader, COLOR_PIXEL_SHADER, DIFFUSE_VERTEX_SHADER,
};
use planar_shadows::renderer::software::SoftwareDevice;
use planar_shadows::scene::model::{
    morphing_param, shadow_projection, skinning_angle, Plane, MORPHING_PERIOD, SKINNING_ANGLE,
    SKINNING_PERIOD,
};
use planar_shadows::scene::transform::Transform;
use planar_shadows::DemoError;

const EPSILON: f32 = 1e-4;

fn project(normal: Vec3, d: f32, light: Vec3, p: Vec3) -> Vec3 {
    let h = shadow_projection(normal, d, light) * p.extend(1.0);
    h.truncate() / h.w
}

fn shaders(device: &mut SoftwareDevice) -> ShaderSet {
    let vs = VertexShader::new(device, DIFFUSE_VERTEX_SHADER).unwrap();
    let ps = PixelShader::new(device, COLOR_PIXEL_SHADER).unwrap();
    ShaderSet::unshadowed(vs, ps)
}

#[test]
fn points_on_the_plane_are_fixed() {
    let normal = Vec3::Z;
    let d = -0.3;
    let light = Vec3::new(0.2, -0.91, 1.5);
    for p in [
        Vec3::new(0.0, 0.0, -0.3),
        Vec3::new(1.0, -2.0, -0.3),
        Vec3::new(-0.4, 0.7, -0.3),
    ] {
        assert!(project(normal, d, light, p).abs_diff_eq(p, EPSILON));
    }
}

#[test]
fn shadow_lies_on_the_ray_from_the_light() {
    let normal = Vec3::new(0.3, 0.1, 1.0).normalize();
    let d = -0.2;
    let light = Vec3::new(0.4, 0.2, 2.0);
    let p = Vec3::new(0.1, -0.2, 0.5);

    let shadow = project(normal, d, light, p);
    assert!((shadow.dot(normal) - d).abs() < EPSILON);

    let towards_point = (p - light).normalize();
    let towards_shadow = (shadow - light).normalize();
    assert!(towards_point.abs_diff_eq(towards_shadow, EPSILON));
}

#[test]
fn light_on_the_plane_sends_every_shadow_to_the_light() {
    let normal = Vec3::Z;
    let light = Vec3::new(0.5, 0.5, 0.0);
    let m = shadow_projection(normal, 0.0, light);

    let shadow = project(normal, 0.0, light, Vec3::new(0.1, 0.1, 0.7));
    assert!(shadow.abs_diff_eq(light, EPSILON));

    let at_light = m * light.extend(1.0);
    assert!(at_light.w.abs() < EPSILON);
}

#[test]
fn light_above_a_horizontal_plane_fixes_the_plane_and_degenerates_at_itself() {
    let normal = Vec3::Y;
    for h in [0.5, 1.0, 3.0] {
        let light = Vec3::new(0.0, h, 0.0);
        let m = shadow_projection(normal, 0.0, light);
        for p in [
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, -2.0),
            Vec3::new(-0.7, 0.0, 0.4),
        ] {
            assert!(project(normal, 0.0, light, p).abs_diff_eq(p, EPSILON));
        }

        let at_light = m * light.extend(1.0);
        assert!(at_light.w.abs() < EPSILON);
        assert!(at_light.truncate().length() < EPSILON);
    }
}

#[test]
fn plane_normal_follows_its_rotation() {
    let mut device = SoftwareDevice::new(4, 4);
    let (vertices, indices) = plane_mesh(2.0);
    let transform = Transform::new(
        Vec3::new(0.0, 0.0, -0.3),
        Vec3::new(std::f32::consts::FRAC_PI_2, 0.0, 0.0),
    );
    let set = shaders(&mut device);
    let plane = Plane::new(&mut device, &vertices, &indices, set, transform).unwrap();

    assert!(plane.normal().abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), EPSILON));
    assert!((plane.distance() - 0.0).abs() < EPSILON);
}

#[test]
fn floor_plane_distance_is_its_height() {
    let mut device = SoftwareDevice::new(4, 4);
    let (vertices, indices) = plane_mesh(3.0);
    let transform = Transform::new(Vec3::new(0.5, 0.5, -0.3), Vec3::ZERO);
    let set = shaders(&mut device);
    let plane = Plane::new(&mut device, &vertices, &indices, set, transform).unwrap();

    assert!(plane.normal().abs_diff_eq(Vec3::Z, EPSILON));
    assert!((plane.distance() + 0.3).abs() < EPSILON);
}

#[test]
fn empty_plane_is_rejected() {
    let mut device = SoftwareDevice::new(4, 4);
    let set = shaders(&mut device);
    let err = Plane::new(&mut device, &[], &[], set, Transform::default()).unwrap_err();
    assert!(matches!(err, DemoError::InvalidGeometry(_)));
    // the failed plane created nothing on the device
    assert_eq!(device.live_geometries(), 0);
}

#[test]
fn skinning_swings_within_its_amplitude() {
    for step in 0..40 {
        let t = step as f32 * 0.1;
        let angle = skinning_angle(t);
        assert!(angle.abs() <= SKINNING_ANGLE + 1e-6);
        assert!((skinning_angle(t + SKINNING_PERIOD) - angle).abs() < EPSILON);
    }
    assert!(skinning_angle(0.0).abs() < 1e-6);
}

#[test]
fn morph_parameter_cycles_between_base_and_sphere() {
    assert!(morphing_param(0.0).abs() < 1e-6);
    assert!((morphing_param(MORPHING_PERIOD / 2.0) - 1.0).abs() < EPSILON);
    for step in 0..30 {
        let t = step as f32 * 0.17;
        let m = morphing_param(t);
        assert!((0.0..=1.0).contains(&m));
        assert!((morphing_param(t + MORPHING_PERIOD) - m).abs() < EPSILON);
    }
}
