//! Recording fakes for lifecycle tests.

use crate::camera::Camera;
use crate::frame::FrameScheduler;
use crate::renderer::Renderer;
use crate::viewport::{AttachmentError, DrawableSurface, SurfaceContainer};
use modelview_scene::SceneGraph;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, ordered log of lifecycle events.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Debug, Default)]
pub struct CountingScheduler {
    pub requests: u32,
}

impl FrameScheduler for CountingScheduler {
    fn request_frame(&mut self) {
        self.requests += 1;
    }
}

pub struct FakeContainer {
    pub width: u32,
    pub height: u32,
    pub occupied: bool,
    pub fail_attach: bool,
    journal: Journal,
}

impl FakeContainer {
    pub fn new(width: u32, height: u32, journal: &Journal) -> Self {
        Self {
            width,
            height,
            occupied: false,
            fail_attach: false,
            journal: journal.clone(),
        }
    }
}

impl SurfaceContainer for FakeContainer {
    type Surface = FakeSurface;

    fn inner_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_occupied(&self) -> bool {
        self.occupied
    }

    fn attach(&mut self, width: u32, height: u32) -> Result<FakeSurface, AttachmentError> {
        if self.fail_attach {
            return Err(AttachmentError::InvalidContainer("no adapter".into()));
        }
        self.occupied = true;
        self.journal.record(format!("attach {width}x{height}"));
        Ok(FakeSurface {
            journal: self.journal.clone(),
        })
    }

    fn detach(&mut self) {
        self.occupied = false;
        self.journal.record("detach");
    }
}

pub struct FakeSurface {
    journal: Journal,
}

impl Renderer for FakeSurface {
    type Output = bool;

    fn render(&mut self, scene: &SceneGraph, _camera: &Camera) -> bool {
        self.journal.record(format!("render model={}", scene.has_model()));
        true
    }
}

impl DrawableSurface for FakeSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.journal.record(format!("resize {width}x{height}"));
    }

    fn release(&mut self) {
        self.journal.record("release");
    }
}
