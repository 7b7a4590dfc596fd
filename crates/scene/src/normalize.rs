//! Normalizer: centre a loaded model on the origin and scale its largest
//! dimension to a fixed reference size.
//!
//! The loaded root is consumed and wrapped in a pivot node at the origin, so a
//! model can only be normalized once and spins about its bounding-box centre.

use crate::graph::SceneNode;
use glam::{Mat4, Quat, Vec3};
use modelview_common::{Aabb, Transform, config::REFERENCE_SIZE};

/// Raised when a model has no usable extent to scale from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DegenerateModelError {
    #[error("model contains no geometry")]
    Empty,
    #[error("model geometry collapses to a single point at {center}")]
    ZeroExtent { center: Vec3 },
    #[error("model bounds are not finite")]
    NonFinite,
}

/// A model root positioned by the [`Normalizer`], ready for the scene graph.
#[derive(Debug, Clone)]
pub struct NormalizedModel {
    root: SceneNode,
    yaw: f32,
    scale_factor: f32,
    source_bounds: Aabb,
}

impl NormalizedModel {
    /// Pivot node at the origin whose single child is the loaded root.
    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    /// Accumulated rotation about +Y. Never wrapped, only its sine and cosine matter.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Uniform scale applied to the loaded root.
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// World-space bounds of the model as loaded, before normalization.
    pub fn source_bounds(&self) -> Aabb {
        self.source_bounds
    }

    /// Current world-space bounds, including the accumulated spin.
    pub fn bounds(&self) -> Aabb {
        self.root.world_bounds(Mat4::IDENTITY)
    }

    pub fn spin(&mut self, radians: f32) {
        self.yaw += radians;
        self.root.transform.rotation = Quat::from_rotation_y(self.yaw);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    reference_size: f32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(REFERENCE_SIZE)
    }
}

impl Normalizer {
    pub fn new(reference_size: f32) -> Self {
        Self { reference_size }
    }

    pub fn reference_size(&self) -> f32 {
        self.reference_size
    }

    /// Centre `node`'s world-space bounds on the origin and scale its largest
    /// dimension to the reference size.
    pub fn normalize(&self, mut node: SceneNode) -> Result<NormalizedModel, DegenerateModelError> {
        let _span = tracing::info_span!("normalize").entered();

        let bounds = node.world_bounds(Mat4::IDENTITY);
        if bounds.is_empty() {
            return Err(DegenerateModelError::Empty);
        }
        if !bounds.is_finite() {
            return Err(DegenerateModelError::NonFinite);
        }

        let center = bounds.center();
        let max_dim = bounds.max_dimension();
        let scale = self.reference_size / max_dim;
        if max_dim <= 0.0 || !scale.is_finite() {
            return Err(DegenerateModelError::ZeroExtent { center });
        }

        node.transform = node.transform.offset_then_scale(-center, scale);
        tracing::debug!(?center, max_dim, scale, "model normalized");

        let pivot = SceneNode {
            name: Some("model_pivot".into()),
            transform: Transform::default(),
            children: vec![node],
            mesh: None,
        };
        Ok(NormalizedModel {
            root: pivot,
            yaw: 0.0,
            scale_factor: scale,
            source_bounds: bounds,
        })
    }
}
