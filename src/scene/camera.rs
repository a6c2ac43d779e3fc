use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

const RHO_STEP: f32 = 0.1;
const ANGLE_STEP: f32 = PI / 60.0;
const MIN_RHO: f32 = 0.5;
const THETA_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Spherical camera coordinates around the origin; Z is up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    pub rho: f32,
    pub theta: f32,
    pub phi: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            rho: 2.6,
            theta: 0.68,
            phi: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    rho: f32,
    theta: f32,
    phi: f32,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(orbit: OrbitSettings) -> Self {
        Self {
            rho: orbit.rho.max(MIN_RHO),
            theta: orbit.theta.clamp(-THETA_LIMIT, THETA_LIMIT),
            phi: orbit.phi,
            fov_y_radians: PI / 4.0,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn eye(&self) -> Vec3 {
        Vec3::new(
            self.rho * self.theta.cos() * self.phi.cos(),
            self.rho * self.theta.cos() * self.phi.sin(),
            self.rho * self.theta.sin(),
        )
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Z)
    }

    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.proj(aspect) * self.view()
    }

    pub fn move_up(&mut self) {
        self.theta = (self.theta + ANGLE_STEP).min(THETA_LIMIT);
    }

    pub fn move_down(&mut self) {
        self.theta = (self.theta - ANGLE_STEP).max(-THETA_LIMIT);
    }

    pub fn move_nearer(&mut self) {
        self.rho = (self.rho - RHO_STEP).max(MIN_RHO);
    }

    pub fn move_farther(&mut self) {
        self.rho += RHO_STEP;
    }

    pub fn move_clockwise(&mut self) {
        self.phi -= ANGLE_STEP;
    }

    pub fn move_counterclockwise(&mut self) {
        self.phi += ANGLE_STEP;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(OrbitSettings::default())
    }
}
