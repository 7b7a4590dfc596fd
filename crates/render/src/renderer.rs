use crate::camera::Camera;
use modelview_scene::{Light, SceneGraph};
use std::fmt::Write;

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads the scene graph and camera and produces one frame. It never
/// mutates the scene; `&mut self` is for the renderer's own caches.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame of `scene` as seen through `camera`.
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Self::Output;
}

/// Produces a human-readable description of each frame.
///
/// Used for CLI output, logging, and exercising the render loop without a GPU.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    frames: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> String {
        self.frames += 1;
        let mut out = String::new();
        let _ = writeln!(out, "=== Frame {} ===", self.frames);
        let p = camera.position();
        let _ = writeln!(
            out,
            "Camera: pos=({:.1}, {:.1}, {:.1}) fov={:.0} aspect={:.3}",
            p.x,
            p.y,
            p.z,
            camera.fov_y_degrees(),
            camera.aspect()
        );
        for light in scene.lights() {
            match light {
                Light::Ambient { intensity, .. } => {
                    let _ = writeln!(out, "  ambient intensity={intensity:.2}");
                }
                Light::Directional {
                    intensity, position, ..
                } => {
                    let _ = writeln!(
                        out,
                        "  directional intensity={intensity:.2} from=({:.1}, {:.1}, {:.1})",
                        position.x, position.y, position.z
                    );
                }
            }
        }
        match scene.model() {
            Some(model) => {
                let b = model.bounds();
                let _ = writeln!(
                    out,
                    "Model: meshes={} yaw={:.2} scale={:.4} bounds=({:.2}, {:.2}, {:.2})..({:.2}, {:.2}, {:.2})",
                    model.root().mesh_count(),
                    model.yaw(),
                    model.scale_factor(),
                    b.min.x,
                    b.min.y,
                    b.min.z,
                    b.max.x,
                    b.max.y,
                    b.max.z
                );
            }
            None => {
                let _ = writeln!(out, "Model: none");
            }
        }
        out
    }
}
