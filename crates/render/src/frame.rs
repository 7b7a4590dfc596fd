use crate::camera::Camera;
use crate::renderer::Renderer;
use modelview_scene::SceneGraph;

/// Asks the host to deliver one more frame callback, e.g. by requesting a redraw.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// Self-rescheduling frame callback: spin the model, render once, ask for the next frame.
///
/// Once cancelled it neither renders nor reschedules again.
#[derive(Debug)]
pub struct RenderLoop {
    spin_per_frame: f32,
    running: bool,
    frames: u64,
}

impl RenderLoop {
    /// Create a running loop and schedule its first frame.
    pub fn start(spin_per_frame: f32, scheduler: &mut impl FrameScheduler) -> Self {
        scheduler.request_frame();
        Self {
            spin_per_frame,
            running: true,
            frames: 0,
        }
    }

    /// Run one frame. Returns `None` without side effects once cancelled.
    pub fn frame<R: Renderer>(
        &mut self,
        scene: &mut SceneGraph,
        camera: &Camera,
        renderer: &mut R,
        scheduler: &mut impl FrameScheduler,
    ) -> Option<R::Output> {
        if !self.running {
            return None;
        }
        scheduler.request_frame();
        scene.spin_model(self.spin_per_frame);
        let output = renderer.render(scene, camera);
        self.frames += 1;
        tracing::trace!(frame = self.frames, "frame rendered");
        Some(output)
    }

    pub fn cancel(&mut self) {
        if self.running {
            tracing::debug!(frames = self.frames, "render loop cancelled");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}
