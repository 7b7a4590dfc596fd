use crate::renderer::Renderer;

/// The viewport could not be attached to its container. Fatal at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttachmentError {
    #[error("container already holds a drawable surface")]
    Occupied,
    #[error("container is not usable: {0}")]
    InvalidContainer(String),
}

/// Pixel dimensions of the drawable surface. Both are always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportState {
    pub width: u32,
    pub height: u32,
}

impl ViewportState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// A drawable element that renders frames and owns GPU-side resources.
pub trait DrawableSurface: Renderer {
    /// Resize the pixel buffer.
    fn resize(&mut self, width: u32, height: u32);

    /// Release GPU-side resources. Called once, after detaching.
    fn release(&mut self);
}

/// The presentation area a drawable surface is inserted into, e.g. a window.
pub trait SurfaceContainer {
    type Surface: DrawableSurface;

    /// Current inner size in physical pixels.
    fn inner_size(&self) -> (u32, u32);

    /// Whether a drawable surface is currently attached.
    fn is_occupied(&self) -> bool;

    /// Create a drawable surface of the given size and insert it.
    fn attach(&mut self, width: u32, height: u32) -> Result<Self::Surface, AttachmentError>;

    /// Remove the drawable surface from the container.
    fn detach(&mut self);
}

/// Owns the drawable surface, its dimensions, and its attachment to a container.
///
/// Teardown detaches then releases, exactly once; dropping the host tears it down.
pub struct ViewportHost<C: SurfaceContainer> {
    container: C,
    surface: Option<C::Surface>,
    state: ViewportState,
}

impl<C: SurfaceContainer> ViewportHost<C> {
    pub fn initialize(mut container: C) -> Result<Self, AttachmentError> {
        if container.is_occupied() {
            return Err(AttachmentError::Occupied);
        }
        let (width, height) = container.inner_size();
        let state = ViewportState::new(width, height);
        let surface = container.attach(state.width, state.height)?;
        tracing::info!(width = state.width, height = state.height, "viewport attached");
        Ok(Self {
            container,
            surface: Some(surface),
            state,
        })
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn surface_mut(&mut self) -> Option<&mut C::Surface> {
        self.surface.as_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    /// Resize the surface pixel buffer. Ignored after teardown.
    pub fn resize(&mut self, width: u32, height: u32) {
        let Some(surface) = &mut self.surface else {
            return;
        };
        self.state = ViewportState::new(width, height);
        surface.resize(self.state.width, self.state.height);
    }

    /// Detach the surface from the container, then release it. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            self.container.detach();
            surface.release();
            tracing::info!("viewport torn down");
        }
    }
}

impl<C: SurfaceContainer> Drop for ViewportHost<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
