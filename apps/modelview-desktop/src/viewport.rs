//! Window-backed surface container for the viewer session.

use modelview_render::{AttachmentError, Camera, DrawableSurface, Renderer, SurfaceContainer};
use modelview_render_wgpu::WgpuRenderer;
use modelview_scene::SceneGraph;
use std::sync::Arc;
use winit::window::Window;

/// A winit window that accepts one wgpu drawing surface.
pub struct WindowContainer {
    window: Arc<Window>,
    instance: wgpu::Instance,
    background: [f64; 4],
    attached: bool,
}

impl WindowContainer {
    pub fn new(window: Arc<Window>, background: [f64; 4]) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        Self {
            window,
            instance,
            background,
            attached: false,
        }
    }
}

impl SurfaceContainer for WindowContainer {
    type Surface = WindowSurface;

    fn inner_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn is_occupied(&self) -> bool {
        self.attached
    }

    fn attach(&mut self, width: u32, height: u32) -> Result<WindowSurface, AttachmentError> {
        let surface = self
            .instance
            .create_surface(self.window.clone())
            .map_err(invalid)?;

        let adapter = pollster::block_on(self.instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| invalid("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("modelview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(invalid)?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .ok_or_else(|| invalid("surface reports no formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(&device, format, width, height, self.background);
        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            ?format,
            "GPU surface attached"
        );

        self.attached = true;
        Ok(WindowSurface {
            surface,
            device,
            queue,
            config,
            renderer,
        })
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}

fn invalid(reason: impl std::fmt::Display) -> AttachmentError {
    AttachmentError::InvalidContainer(reason.to_string())
}

/// The wgpu surface drawn into the window, with its device and renderer.
pub struct WindowSurface {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
}

impl Renderer for WindowSurface {
    type Output = Result<(), wgpu::SurfaceError>;

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Self::Output {
        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.renderer
            .render(&self.device, &self.queue, &view, scene, camera);
        output.present();
        Ok(())
    }
}

impl DrawableSurface for WindowSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.renderer.resize(&self.device, width, height);
    }

    fn release(&mut self) {
        self.renderer.release();
        tracing::debug!("GPU resources released");
    }
}
