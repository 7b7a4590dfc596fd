use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local transform of a scene node: translation, rotation, scale.
///
/// Composition order is translation * rotation * scale, so a point is scaled,
/// then rotated, then moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Pre-multiply by a uniform scale about the origin after moving by `offset`.
    ///
    /// Equivalent to `S(factor) * T(offset) * self`. A uniform scale commutes with
    /// the rotation, so the result is still expressible as a TRS transform.
    pub fn offset_then_scale(&self, offset: Vec3, factor: f32) -> Self {
        Self {
            position: (self.position + offset) * factor,
            rotation: self.rotation,
            scale: self.scale * factor,
        }
    }
}
