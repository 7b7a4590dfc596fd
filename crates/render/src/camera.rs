use glam::{Mat4, Vec3};
use modelview_common::CameraConfig;

/// Perspective camera on the +Z axis looking at the origin.
///
/// Only the aspect ratio changes after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    fov_y_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Vec3,
}

impl Camera {
    pub fn new(config: &CameraConfig, width: u32, height: u32) -> Self {
        Self {
            fov_y_degrees: config.fov_y_degrees,
            aspect: width as f32 / height.max(1) as f32,
            near: config.near,
            far: config.far,
            position: Vec3::new(0.0, 0.0, config.distance),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn fov_y_degrees(&self) -> f32 {
        self.fov_y_degrees
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
