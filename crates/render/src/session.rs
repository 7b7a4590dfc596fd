use crate::camera::Camera;
use crate::frame::{FrameScheduler, RenderLoop};
use crate::renderer::Renderer;
use crate::resize::ResizeCoordinator;
use crate::viewport::{AttachmentError, SurfaceContainer, ViewportHost};
use modelview_assets::{AssetLoader, LoadError, LoadRequest, ModelSource};
use modelview_common::ViewerConfig;
use modelview_scene::{Normalizer, SceneGraph, SceneNode};

type SurfaceOutput<C> = <<C as SurfaceContainer>::Surface as Renderer>::Output;

/// One viewer instance: scene, camera, render loop, and viewport, from start to teardown.
///
/// All methods are meant to be called from the event-loop thread. Load results
/// produced on the loader thread are handed back through [`ViewerSession::on_model_loaded`].
pub struct ViewerSession<C: SurfaceContainer> {
    viewport: ViewportHost<C>,
    camera: Camera,
    scene: SceneGraph,
    normalizer: Normalizer,
    render_loop: RenderLoop,
    resize: ResizeCoordinator,
    load: Option<LoadRequest>,
    torn_down: bool,
}

impl<C: SurfaceContainer> ViewerSession<C> {
    /// Attach to `container`, light the scene, and schedule the first frame.
    pub fn start(
        container: C,
        config: &ViewerConfig,
        scheduler: &mut impl FrameScheduler,
    ) -> Result<Self, AttachmentError> {
        let viewport = ViewportHost::initialize(container)?;
        let state = viewport.state();
        let camera = Camera::new(&config.camera, state.width, state.height);
        let scene = SceneGraph::with_lights(&config.lights);
        let render_loop = RenderLoop::start(config.spin_per_frame, scheduler);
        tracing::info!(width = state.width, height = state.height, "viewer started");
        Ok(Self {
            viewport,
            camera,
            scene,
            normalizer: Normalizer::new(config.reference_size),
            render_loop,
            resize: ResizeCoordinator::subscribe(),
            load: None,
            torn_down: false,
        })
    }

    /// Kick off the model load. Any load already in flight is cancelled.
    pub fn begin_load<F>(&mut self, loader: &AssetLoader, source: ModelSource, on_complete: F)
    where
        F: FnOnce(Result<SceneNode, LoadError>) + Send + 'static,
    {
        if self.torn_down {
            return;
        }
        if let Some(previous) = self.load.take() {
            previous.cancel();
        }
        self.load = Some(loader.load(source, on_complete));
    }

    /// Apply a finished load. Returns whether a model was added to the scene.
    ///
    /// Failures are logged and the viewer keeps rendering the empty, lit scene.
    pub fn on_model_loaded(&mut self, result: Result<SceneNode, LoadError>) -> bool {
        if self.torn_down {
            tracing::debug!("ignoring load result after teardown");
            return false;
        }
        let node = match result {
            Ok(node) => node,
            Err(e) => {
                tracing::error!(error = %e, "failed to load model");
                return false;
            }
        };
        let model = match self.normalizer.normalize(node) {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(error = %e, "model not added");
                return false;
            }
        };
        let scale = model.scale_factor();
        match self.scene.add_model(model) {
            Ok(()) => {
                tracing::info!(scale, "model added to scene");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "model not added");
                false
            }
        }
    }

    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        self.resize
            .on_resize(width, height, &mut self.camera, &mut self.viewport)
    }

    /// Run one frame of the render loop. `None` once stopped or torn down.
    pub fn on_frame(&mut self, scheduler: &mut impl FrameScheduler) -> Option<SurfaceOutput<C>> {
        let surface = self.viewport.surface_mut()?;
        self.render_loop
            .frame(&mut self.scene, &self.camera, surface, scheduler)
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> &ViewportHost<C> {
        &self.viewport
    }

    pub fn load_request(&self) -> Option<&LoadRequest> {
        self.load.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stop everything and give the container back. Runs once; later calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(load) = &self.load {
            load.cancel();
        }
        self.resize.unsubscribe();
        self.render_loop.cancel();
        self.viewport.teardown();
        tracing::info!(frames = self.render_loop.frames_rendered(), "viewer torn down");
    }
}

impl<C: SurfaceContainer> Drop for ViewerSession<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
