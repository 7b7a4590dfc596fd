//! Shared types and constants for the model viewer.

pub mod bounds;
pub mod config;
pub mod types;

pub use bounds::Aabb;
pub use config::{CameraConfig, LightConfig, ViewerConfig};
pub use types::Transform;

pub fn crate_info() -> &'static str {
    "modelview-common v0.1.0"
}
