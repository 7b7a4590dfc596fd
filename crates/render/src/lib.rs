//! Viewer core: camera, render loop, resize coordination, and viewport lifecycle,
//! independent of any GPU backend.
//!
//! # Invariants
//! - Everything here runs on the single event-loop thread; nothing is locked.
//! - Renderers read the scene graph and camera, they never mutate them.
//! - Teardown cancels the pending load, unsubscribes resize, stops the render
//!   loop, detaches the surface, then releases it. It runs once, on every exit path.

mod camera;
mod frame;
mod renderer;
mod resize;
mod session;
mod viewport;

pub use camera::Camera;
pub use frame::{FrameScheduler, RenderLoop};
pub use renderer::{DebugTextRenderer, Renderer};
pub use resize::ResizeCoordinator;
pub use session::ViewerSession;
pub use viewport::{AttachmentError, DrawableSurface, SurfaceContainer, ViewportHost, ViewportState};

pub fn crate_info() -> &'static str {
    "modelview-render v0.1.0"
}

#[cfg(test)]
pub(crate) mod testing;
