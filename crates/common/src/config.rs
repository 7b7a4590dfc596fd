use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Largest dimension every loaded model is scaled to, in world units.
pub const REFERENCE_SIZE: f32 = 3.0;

/// Rotation applied to the model about the vertical axis each frame, in radians.
pub const SPIN_PER_FRAME: f32 = 0.01;

/// Identifier requested when the launch URL carries no `model` parameter.
pub const DEFAULT_MODEL_SOURCE: &str = "model.glb";

/// Location of the compressed-geometry decoder resources.
pub const DEFAULT_DECODER_LOCATION: &str =
    "https://www.gstatic.com/draco/versioned/decoders/1.5.6/";

/// Perspective camera parameters. Only the aspect ratio changes after startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the origin along +Z.
    pub distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            distance: 5.0,
        }
    }
}

/// The two fixed lights added at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub directional_color: [f32; 3],
    pub directional_intensity: f32,
    /// Position of the directional light; it always points at the origin.
    pub directional_position: Vec3,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.5,
            directional_color: [1.0, 1.0, 1.0],
            directional_intensity: 1.0,
            directional_position: Vec3::new(5.0, 5.0, 5.0),
        }
    }
}

/// Viewer-wide configuration. Everything here is fixed for the viewer's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub reference_size: f32,
    pub spin_per_frame: f32,
    /// Clear colour as linear RGBA.
    pub background: [f64; 4],
    pub default_model: String,
    pub decoder_location: String,
    pub camera: CameraConfig,
    pub lights: LightConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            reference_size: REFERENCE_SIZE,
            spin_per_frame: SPIN_PER_FRAME,
            background: srgb_hex_to_linear(0xf0f0f0),
            default_model: DEFAULT_MODEL_SOURCE.into(),
            decoder_location: DEFAULT_DECODER_LOCATION.into(),
            camera: CameraConfig::default(),
            lights: LightConfig::default(),
        }
    }
}

/// Convert a `0xRRGGBB` sRGB colour to opaque linear RGBA.
pub fn srgb_hex_to_linear(hex: u32) -> [f64; 4] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f64 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0), 1.0]
}
