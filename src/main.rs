#![warn(clippy::all, rust_2018_idioms)]
use std::path::PathBuf;
use std::sync::Arc;
use std::{fs, path::Path};

use anyhow::Result;
use clap::{Parser, Subcommand};
use grid_glyph_scanner::capture::{capture_screen, load_image};
use grid_glyph_scanner::config::SCAN_CONFIG;
use grid_glyph_scanner::ocr::{CharCnn, FallbackClassifier, NoFallback};
use grid_glyph_scanner::{ScanConfig, ScanService};
use log::{error, info, warn};
use log4rs::config::Deserializers;

/// Reads the 5x5 puzzle grid from the screen (or an image file).
#[derive(Parser, Debug)]
#[command(name = "grid-scan", version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Use this image instead of capturing the primary display.
    #[arg(long, global = true)]
    image: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, default_value = SCAN_CONFIG)]
    config: PathBuf,

    /// Dump intermediate images of this scan into the directory.
    #[arg(long, global = true)]
    debug_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq)]
enum Mode {
    /// Recognize all 25 cells.
    #[default]
    Grid,
    /// Recognize the cell framed by the highlight markers.
    Cell,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    let mut config = ScanConfig::load_or_init(&cli.config)?;
    if let Some(dir) = cli.debug_dir.clone() {
        config.store.debug_dir = Some(dir);
    }
    let fallback = load_fallback(&config);
    let image = match &cli.image {
        Some(path) => load_image(path)?,
        None => capture_screen()?,
    };

    let service = ScanService::new(config, fallback);
    let outcome = run(&service, cli.mode.unwrap_or_default(), image, cli.json).await;
    service.shutdown().await;

    if let Err(e) = &outcome {
        error!("Scan failed: {e:#}");
    }
    outcome
}

async fn run(service: &ScanService, mode: Mode, image: image::RgbImage, json: bool) -> Result<()> {
    match mode {
        Mode::Grid => {
            let result = service.submit(image)?.await??;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{result}");
            }
            if !result.issues.is_empty() {
                info!("{} recognition issue(s)", result.issues.len());
            }
        }
        Mode::Cell => {
            let result = service.submit_single_cell(image)?.await??;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.text);
            }
        }
    }
    Ok(())
}

fn load_fallback(config: &ScanConfig) -> Arc<dyn FallbackClassifier> {
    match CharCnn::load(&config.classifier.fallback_model) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            warn!("Fallback classifier disabled: {e:#}");
            Arc::new(NoFallback)
        }
    }
}

const LOG_CONFIG_DIR: &str = "config";
const LOG_CONFIG: &str = "config/log4rs.yaml";

fn init_logger() {
    fs::create_dir_all(LOG_CONFIG_DIR).expect("Config directory creation failed");
    if !Path::new(&LOG_CONFIG).exists() {
        fs::write(LOG_CONFIG, include_str!("../config/log4rs.yaml"))
            .expect("Config file creation failed");
    }

    log4rs::init_file(LOG_CONFIG, Deserializers::default()).expect("Logger init failed");
}
