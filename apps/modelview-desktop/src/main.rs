mod viewport;

use anyhow::Result;
use clap::Parser;
use modelview_assets::{AssetLoader, DecoderConfig, LoadError, ModelSource};
use modelview_common::ViewerConfig;
use modelview_render::{FrameScheduler, ViewerSession};
use modelview_scene::SceneNode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use viewport::WindowContainer;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "modelview-desktop", about = "Spin one glTF model in a window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Launch URL whose `model` query parameter names the asset
    #[arg(long)]
    launch_url: Option<String>,

    /// Model URL or path; takes precedence over --launch-url
    #[arg(long)]
    model: Option<String>,

    /// Location of the compressed-geometry decoder resources
    #[arg(long)]
    decoder_location: Option<String>,
}

impl Cli {
    fn source(&self, default: &str) -> Result<ModelSource> {
        if let Some(model) = &self.model {
            return Ok(ModelSource::resolve(Some(model), default));
        }
        match &self.launch_url {
            Some(url) => Ok(ModelSource::from_launch_url(url, default)?),
            None => Ok(ModelSource::resolve(None, default)),
        }
    }
}

/// Events delivered to the event loop from other threads.
enum ViewerEvent {
    ModelLoaded(Result<SceneNode, LoadError>),
}

/// Schedules the next frame by asking the window for a redraw.
struct RedrawScheduler<'a>(&'a Window);

impl FrameScheduler for RedrawScheduler<'_> {
    fn request_frame(&mut self) {
        self.0.request_redraw();
    }
}

struct ViewerApp {
    config: ViewerConfig,
    source: ModelSource,
    loader: AssetLoader,
    proxy: EventLoopProxy<ViewerEvent>,
    window: Option<Arc<Window>>,
    session: Option<ViewerSession<WindowContainer>>,
}

impl ViewerApp {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Model Viewer")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let container = WindowContainer::new(window.clone(), self.config.background);
        let mut session =
            ViewerSession::start(container, &self.config, &mut RedrawScheduler(&window))?;

        let proxy = self.proxy.clone();
        session.begin_load(&self.loader, self.source.clone(), move |result| {
            if proxy.send_event(ViewerEvent::ModelLoaded(result)).is_err() {
                tracing::debug!("event loop closed before the model arrived");
            }
        });

        self.window = Some(window);
        self.session = Some(session);
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(session) = &mut self.session {
            session.teardown();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            tracing::error!("failed to start viewer: {e:#}");
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        let ViewerEvent::ModelLoaded(result) = event;
        if let Some(session) = &mut self.session {
            session.on_model_loaded(result);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(session), Some(window)) = (&mut self.session, &self.window) else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                session.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                session.on_resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Some(Err(e)) = session.on_frame(&mut RedrawScheduler(window)) {
                    tracing::error!("surface error: {e}");
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("modelview-desktop starting");

    let mut config = ViewerConfig::default();
    if let Some(location) = &cli.decoder_location {
        config.decoder_location = location.clone();
    }
    let source = cli.source(&config.default_model)?;
    let loader = AssetLoader::new(DecoderConfig {
        location: config.decoder_location.clone(),
    });

    let event_loop = EventLoop::<ViewerEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = ViewerApp {
        config,
        source,
        loader,
        proxy: event_loop.create_proxy(),
        window: None,
        session: None,
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("modelview-desktop").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn no_flags_loads_default_model() {
        let src = parse(&[]).source("model.glb").unwrap();
        assert_eq!(src.identifier(), "model.glb");
    }

    #[test]
    fn launch_url_model_param_is_honoured() {
        let src = parse(&["--launch-url", "https://viewer.example/?model=robot.glb"])
            .source("model.glb")
            .unwrap();
        assert_eq!(src.identifier(), "robot.glb");
    }

    #[test]
    fn model_flag_wins_over_launch_url() {
        let src = parse(&[
            "--launch-url",
            "?model=robot.glb",
            "--model",
            "car.glb",
        ])
        .source("model.glb")
        .unwrap();
        assert_eq!(src.identifier(), "car.glb");
    }

    #[test]
    fn empty_model_flag_falls_back_to_default() {
        let src = parse(&["--model", ""]).source("model.glb").unwrap();
        assert_eq!(src.identifier(), "model.glb");
    }
}
