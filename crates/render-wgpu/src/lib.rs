//! wgpu render backend for the model viewer.
//!
//! Draws every mesh of the scene's model with one directional and one ambient
//! light over a solid clear colour. Mesh geometry is uploaded once per [`MeshId`]
//! and reused across frames; only per-draw transforms change.
//!
//! # Invariants
//! - The renderer never mutates the scene graph or camera.
//! - GPU buffers are keyed by content hash, so identical meshes share them.
//!
//! [`MeshId`]: modelview_scene::MeshId

mod gpu;
mod shaders;

pub use gpu::WgpuRenderer;
