use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eframe::egui;

mod app;

use app::SamApp;
use sam_canvas::{logging, AnnotationCanvas, CanvasConfig};

/// Interactive SAM mask annotation on a single image.
#[derive(Parser, Debug)]
#[command(name = "sam-canvas", version, about)]
struct Cli {
    /// Image to open at startup
    #[arg(value_name = "IMAGE_PATH")]
    image: Option<PathBuf>,

    /// JSON canvas config
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v, -vv)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(cli: &Cli) -> sam_canvas::Result<CanvasConfig> {
    let config = match &cli.config {
        Some(path) => CanvasConfig::load(path)?,
        None => CanvasConfig::default(),
    };
    config.with_env_overrides()
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Bad configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &cli.image {
        if !path.exists() {
            tracing::error!("File not found: {}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let canvas = match AnnotationCanvas::new(config) {
        Ok(canvas) => canvas,
        Err(e) => {
            tracing::error!("Could not create canvas: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let title = match cli.image.as_ref().and_then(|p| p.file_name()) {
        Some(name) => format!("sam-canvas - {}", name.to_string_lossy()),
        None => "sam-canvas".to_string(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_title(&title),
        ..Default::default()
    };

    let image = cli.image;
    let result = eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(SamApp::new(canvas, image)))
        }),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("eframe failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
