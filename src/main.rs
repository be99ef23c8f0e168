mod app;
mod color;
mod config;
mod data;
mod error;
mod session;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::Result;
use app::DashboardApp;
use clap::Parser;
use config::DashboardConfig;
use eframe::egui;
use state::AppState;

/// Patient follow-up reporting dashboard.
#[derive(Parser, Debug)]
#[command(name = "follow-up-dashboard", version, about)]
struct Cli {
    /// Follow-up table to open (.xlsx, .csv, .json, .parquet); overrides `data_file`
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Dashboard configuration (JSON); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => {
            log::info!("No configuration file given, using built-in defaults");
            DashboardConfig::default()
        }
    };
    if let Some(data) = cli.data {
        config.data_file = data;
    }

    let title = config.title.clone();
    let mut state = AppState::new(config);
    state.open(state.config.data_file.clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            // Install image loaders so egui can render the header logo.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(DashboardApp::new(state)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("running the dashboard window: {e}"))
}
