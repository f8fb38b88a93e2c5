use eframe::egui;

use crate::config::ViewerConfig;
use crate::data::vocab::Vocabulary;
use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyBuoyApp {
    pub state: AppState,
}

impl RustyBuoyApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ViewerConfig, vocab: Vocabulary) -> Self {
        let mut state = AppState::new(config, vocab);

        // Completions arrive on worker threads; wake the UI to apply them.
        let ctx = cc.egui_ctx.clone();
        state.set_waker(move || ctx.request_repaint());

        if let Some(dir) = state.config.data_dir.clone() {
            if let Err(e) = state.open_data_dir(&dir) {
                log::error!("Failed to open {}: {e:#}", dir.display());
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }

        Self { state }
    }
}

impl eframe::App for RustyBuoyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll();

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: stations & series ----
        egui::SidePanel::left("selection_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::station_plot(ui, &mut self.state);
        });
    }
}
