use glam::{EulerRot, Mat4, Vec3};

/// Position and Euler rotation of a model, with the composed matrix kept in
/// sync on every mutation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Vec3,
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self {
            position,
            rotation,
            matrix: compose_transform(position, rotation),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Adds `delta` to the rotation about Z and recomputes the matrix.
    pub fn rotate(&mut self, delta: f32) {
        self.rotation.z += delta;
        self.matrix = compose_transform(self.position, self.rotation);
    }
}

/// Rotation about X, then Y, then Z (a column vector sees `Rz * Ry * Rx`).
pub fn rotation_matrix(rotation: Vec3) -> Mat4 {
    Mat4::from_euler(EulerRot::ZYX, rotation.z, rotation.y, rotation.x)
}

/// Rotation followed by translation.
pub fn compose_transform(position: Vec3, rotation: Vec3) -> Mat4 {
    Mat4::from_translation(position) * rotation_matrix(rotation)
}

/// Rotation about the X axis through `pivot`.
pub fn rotate_x_about(angle: f32, pivot: Vec3) -> Mat4 {
    Mat4::from_translation(pivot) * Mat4::from_rotation_x(angle) * Mat4::from_translation(-pivot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn default_is_identity() {
        let m = Transform::default().matrix();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn rotation_happens_before_translation() {
        let tr = Transform::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, FRAC_PI_2));
        let p = tr.matrix().transform_point3(Vec3::X);
        // (1,0,0) -> (0,1,0) -> (1,3,3)
        assert!(p.abs_diff_eq(Vec3::new(1.0, 3.0, 3.0), 1e-6));
    }

    #[test]
    fn x_rotation_is_applied_first() {
        let m = rotation_matrix(Vec3::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        // Rx takes Y to Z, Rz leaves Z alone
        assert!(m.transform_vector3(Vec3::Y).abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn rotate_recomposes_with_the_new_angle() {
        let position = Vec3::new(0.4, -0.2, 0.1);
        let rotation = Vec3::new(0.2, 0.0, 0.3);
        let mut tr = Transform::new(position, rotation);

        tr.rotate(0.5);
        let expected = compose_transform(position, rotation + Vec3::new(0.0, 0.0, 0.5));
        assert!(tr.matrix().abs_diff_eq(expected, 1e-6));
        assert_eq!(tr.position(), position);
    }

    #[test]
    fn rotations_accumulate() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let mut stepped = Transform::new(position, Vec3::ZERO);
        let deltas = [0.1, -0.4, 1.3, 2.9, -0.05];
        for delta in deltas {
            stepped.rotate(delta);
        }

        let total: f32 = deltas.iter().sum();
        let mut once = Transform::new(position, Vec3::ZERO);
        once.rotate(total);

        assert!((stepped.rotation().z - total).abs() < 1e-5);
        assert!(stepped.matrix().abs_diff_eq(once.matrix(), 1e-5));
        assert!(stepped
            .matrix()
            .abs_diff_eq(compose_transform(position, Vec3::new(0.0, 0.0, total)), 1e-5));
    }

    #[test]
    fn pivot_is_a_fixed_point() {
        let pivot = Vec3::new(0.0, 0.5, 1.0);
        let m = rotate_x_about(0.7, pivot);
        assert!(m.transform_point3(pivot).abs_diff_eq(pivot, 1e-6));
    }
}
