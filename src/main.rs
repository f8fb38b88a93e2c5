mod app;
mod chart;
mod color;
mod config;
mod data;
mod selection;
mod state;
mod sync;
mod tasks;
mod ui;

use app::RustyBuoyApp;
use config::ViewerConfig;
use data::vocab::Vocabulary;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = ViewerConfig::from_env().unwrap_or_else(|e| {
        log::error!("Invalid configuration, using defaults: {e:#}");
        ViewerConfig::default()
    });
    let vocab = Vocabulary::builtin().unwrap_or_else(|e| {
        log::error!("{e:#}");
        Vocabulary::default()
    });
    log::info!("Vocabulary with {} parameters", vocab.len());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Buoy – Station Viewer",
        options,
        Box::new(|cc| Ok(Box::new(RustyBuoyApp::new(cc, config, vocab)))),
    )
}
