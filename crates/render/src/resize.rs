use crate::camera::Camera;
use crate::viewport::{SurfaceContainer, ViewportHost};

/// Keeps the camera aspect ratio and surface pixel size in step with the container.
///
/// Notifications arriving after [`ResizeCoordinator::unsubscribe`] are ignored.
#[derive(Debug)]
pub struct ResizeCoordinator {
    subscribed: bool,
}

impl ResizeCoordinator {
    pub fn subscribe() -> Self {
        Self { subscribed: true }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Apply a dimension change. Returns whether anything was updated.
    ///
    /// A zero width or height (a minimised window) leaves camera and surface untouched.
    pub fn on_resize<C: SurfaceContainer>(
        &mut self,
        width: u32,
        height: u32,
        camera: &mut Camera,
        viewport: &mut ViewportHost<C>,
    ) -> bool {
        if !self.subscribed || width == 0 || height == 0 {
            return false;
        }
        camera.set_aspect(width as f32 / height as f32);
        viewport.resize(width, height);
        tracing::debug!(width, height, aspect = camera.aspect(), "viewport resized");
        true
    }

    pub fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeContainer, Journal};
    use crate::viewport::ViewportState;
    use approx::assert_relative_eq;
    use modelview_common::CameraConfig;

    fn setup(journal: &Journal) -> (Camera, ViewportHost<FakeContainer>) {
        let host = ViewportHost::initialize(FakeContainer::new(800, 600, journal)).unwrap();
        let camera = Camera::new(&CameraConfig::default(), 800, 600);
        (camera, host)
    }

    #[test]
    fn resize_updates_aspect_and_surface() {
        let journal = Journal::default();
        let (mut camera, mut host) = setup(&journal);
        let mut coordinator = ResizeCoordinator::subscribe();
        assert_relative_eq!(camera.aspect(), 1.333, epsilon = 1e-3);

        assert!(coordinator.on_resize(1600, 900, &mut camera, &mut host));
        assert_relative_eq!(camera.aspect(), 1.778, epsilon = 1e-3);
        assert_eq!(host.state(), ViewportState::new(1600, 900));
        assert!(journal.entries().contains(&"resize 1600x900".to_string()));
    }

    #[test]
    fn aspect_is_exact_for_many_sizes() {
        let journal = Journal::default();
        let (mut camera, mut host) = setup(&journal);
        let mut coordinator = ResizeCoordinator::subscribe();
        for (w, h) in [(1, 1), (1920, 1080), (333, 777), (4096, 2), (7, 3000)] {
            assert!(coordinator.on_resize(w, h, &mut camera, &mut host));
            assert_eq!(camera.aspect(), w as f32 / h as f32);
            assert_eq!(host.state(), ViewportState::new(w, h));
        }
    }

    #[test]
    fn zero_sized_notifications_are_ignored() {
        let journal = Journal::default();
        let (mut camera, mut host) = setup(&journal);
        let mut coordinator = ResizeCoordinator::subscribe();
        let before = camera.aspect();
        for (w, h) in [(800, 0), (0, 600), (0, 0)] {
            assert!(!coordinator.on_resize(w, h, &mut camera, &mut host));
        }
        assert_eq!(camera.aspect(), before);
        assert_eq!(host.state(), ViewportState::new(800, 600));
        assert_eq!(journal.count("resize"), 0);
    }

    #[test]
    fn unsubscribed_coordinator_ignores_notifications() {
        let journal = Journal::default();
        let (mut camera, mut host) = setup(&journal);
        let mut coordinator = ResizeCoordinator::subscribe();
        coordinator.unsubscribe();
        assert!(!coordinator.on_resize(1600, 900, &mut camera, &mut host));
        assert_eq!(host.state(), ViewportState::new(800, 600));
    }
}
