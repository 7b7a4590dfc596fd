use clap::{Parser, Subcommand};
use modelview_assets::{AssetLoader, DecoderConfig, ModelSource};
use modelview_common::{Aabb, ViewerConfig};
use modelview_render::{Camera, DebugTextRenderer, FrameScheduler, RenderLoop};
use modelview_scene::{Normalizer, SceneGraph};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modelview-cli", about = "CLI tool for model viewer operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print viewer version and crate info
    Info,
    /// Print the model identifier a launch URL resolves to
    Resolve {
        /// Launch URL or bare query string, e.g. `?model=robot.glb`
        launch_url: String,
    },
    /// Load a model, normalize it, and report its bounds
    Inspect {
        /// Model URL or path
        source: String,
        /// Emit a JSON report instead of text
        #[arg(long)]
        json: bool,
        /// Number of frames to spin before describing the scene
        #[arg(short, long, default_value = "1")]
        frames: u32,
        /// Location of the compressed-geometry decoder resources
        #[arg(long)]
        decoder_location: Option<String>,
    },
}

/// Frames are driven by the inspect loop itself.
struct Immediate;

impl FrameScheduler for Immediate {
    fn request_frame(&mut self) {}
}

#[derive(Debug, Serialize)]
struct BoundsReport {
    min: [f32; 3],
    max: [f32; 3],
    size: [f32; 3],
}

impl From<Aabb> for BoundsReport {
    fn from(b: Aabb) -> Self {
        Self {
            min: b.min.to_array(),
            max: b.max.to_array(),
            size: b.size().to_array(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InspectReport {
    source: String,
    nodes: usize,
    meshes: usize,
    raw_bounds: BoundsReport,
    scale_factor: f32,
    normalized_bounds: BoundsReport,
}

fn inspect(
    config: &ViewerConfig,
    source: &ModelSource,
    frames: u32,
) -> anyhow::Result<(InspectReport, Option<String>)> {
    let loader = AssetLoader::new(DecoderConfig {
        location: config.decoder_location.clone(),
    });
    let root = loader.load_blocking(source)?;
    let nodes = root.node_count();
    let meshes = root.mesh_count();
    tracing::info!(%source, nodes, meshes, "model loaded");
    let model = Normalizer::new(config.reference_size).normalize(root)?;
    tracing::debug!(scale = model.scale_factor(), "model normalized");

    let report = InspectReport {
        source: source.to_string(),
        nodes,
        meshes,
        raw_bounds: model.source_bounds().into(),
        scale_factor: model.scale_factor(),
        normalized_bounds: model.bounds().into(),
    };

    let mut scene = SceneGraph::with_lights(&config.lights);
    scene.add_model(model)?;
    let camera = Camera::new(&config.camera, 800, 600);
    let mut renderer = DebugTextRenderer::new();
    let mut render_loop = RenderLoop::start(config.spin_per_frame, &mut Immediate);
    let mut last = None;
    for _ in 0..frames {
        last = render_loop.frame(&mut scene, &camera, &mut renderer, &mut Immediate);
    }
    Ok((report, last))
}

fn fmt_bounds(b: &BoundsReport) -> String {
    format!(
        "({:.3}, {:.3}, {:.3})..({:.3}, {:.3}, {:.3})",
        b.min[0], b.min[1], b.min[2], b.max[0], b.max[1], b.max[2]
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("modelview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", modelview_common::crate_info());
            println!("scene: {}", modelview_scene::crate_info());
            println!("assets: {}", modelview_assets::crate_info());
            println!("render: {}", modelview_render::crate_info());
            let config = ViewerConfig::default();
            println!(
                "defaults: model={} reference_size={} spin={} rad/frame",
                config.default_model, config.reference_size, config.spin_per_frame
            );
        }
        Commands::Resolve { launch_url } => {
            let config = ViewerConfig::default();
            let source = ModelSource::from_launch_url(&launch_url, &config.default_model)?;
            println!("{source}");
        }
        Commands::Inspect {
            source,
            json,
            frames,
            decoder_location,
        } => {
            let mut config = ViewerConfig::default();
            if let Some(location) = decoder_location {
                config.decoder_location = location;
            }
            let (report, frame) = inspect(&config, &ModelSource::new(source), frames)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Source: {}", report.source);
                println!("Nodes: {}  Meshes: {}", report.nodes, report.meshes);
                println!("Raw bounds: {}", fmt_bounds(&report.raw_bounds));
                println!("Scale factor: {:.6}", report.scale_factor);
                println!("Normalized bounds: {}", fmt_bounds(&report.normalized_bounds));
                if let Some(frame) = frame {
                    print!("{frame}");
                }
            }
        }
    }

    Ok(())
}
