//! Scene Graph: lights plus at most one loaded model, independent of camera and renderer.
//!
//! # Invariants
//! - The two fixed lights are added once and never mutated.
//! - Exactly one model root may be inserted, and only after normalization.
//! - The graph is only mutated from the viewer's event-loop thread.

pub mod graph;
pub mod mesh;
pub mod normalize;

pub use graph::{DrawItem, Light, SceneError, SceneGraph, SceneNode};
pub use mesh::{Mesh, MeshId};
pub use normalize::{DegenerateModelError, NormalizedModel, Normalizer};

pub fn crate_info() -> &'static str {
    "modelview-scene v0.1.0"
}
