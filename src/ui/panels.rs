use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::state::AppState;

/// A selection change requested by a widget, applied after the panel is drawn.
enum SelectionEdit {
    Depth {
        parameter: String,
        depth: f64,
        selected: bool,
    },
    All {
        parameter: String,
        selected: bool,
    },
}

// ---------------------------------------------------------------------------
// Left side panel – stations and series selection
// ---------------------------------------------------------------------------

/// Render the left panel: station list, query start, parameter/depth picks.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Stations");
    ui.separator();

    if state.stations.is_empty() {
        ui.label("No data directory loaded.");
        return;
    }

    let mut picked_station = None;
    let mut new_start = None;
    let mut edits = Vec::new();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (i, station) in state.stations.iter().enumerate() {
                let label = station
                    .get("label")
                    .map(|l| format!("{}  ({l})", station.name))
                    .unwrap_or_else(|| station.name.clone());
                if ui
                    .selectable_label(state.selected_station == Some(i), label)
                    .clicked()
                {
                    picked_station = Some(i);
                }
            }
            ui.separator();

            // ---- Query window start ----
            ui.horizontal(|ui: &mut Ui| {
                ui.strong("From");
                let mut date = state.start_date;
                if ui
                    .add(DatePickerButton::new(&mut date).id_salt("start_date"))
                    .changed()
                {
                    new_start = Some(date);
                }
            });
            ui.separator();

            let Some(model) = &state.model else {
                return;
            };
            if !model.is_ready() {
                if state.pending() > 0 {
                    ui.horizontal(|ui: &mut Ui| {
                        ui.spinner();
                        ui.label("Looking up depths…");
                    });
                } else {
                    ui.label("No parameters available for this station.");
                }
                return;
            }

            // ---- Per-parameter depth pickers (collapsible) ----
            for (idx, entry) in model.entries().iter().enumerate() {
                let code = &entry.parameter.name;
                let name = state.synchronizer().display_name(code);
                let header_text = format!(
                    "{name}  ({}/{})",
                    entry.selected_count(),
                    entry.series.len()
                );

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt((code, idx))
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            let mut all = entry.all_selected();
                            let tri_state = egui::Checkbox::new(&mut all, "All")
                                .indeterminate(entry.some_selected());
                            if ui.add(tri_state).changed() {
                                edits.push(SelectionEdit::All {
                                    parameter: code.clone(),
                                    selected: all,
                                });
                            }
                            if ui.small_button("None").clicked() {
                                edits.push(SelectionEdit::All {
                                    parameter: code.clone(),
                                    selected: false,
                                });
                            }
                        });

                        for depth in &entry.series {
                            let mut checked = depth.selected;
                            let text = format!("{} m", depth.depth);
                            if ui.checkbox(&mut checked, text).changed() {
                                edits.push(SelectionEdit::Depth {
                                    parameter: code.clone(),
                                    depth: depth.depth,
                                    selected: checked,
                                });
                            }
                        }
                    });
            }

            if model.failures() > 0 {
                ui.label(
                    RichText::new(format!(
                        "{} of {} parameter(s) unavailable",
                        model.failures(),
                        model.requested()
                    ))
                        .color(Color32::GRAY),
                );
            }
        });

    if let Some(date) = new_start {
        state.set_start_date(date);
    }
    if let Some(i) = picked_station {
        state.select_station(i);
    }
    for edit in edits {
        match edit {
            SelectionEdit::Depth {
                parameter,
                depth,
                selected,
            } => state.set_selected(&parameter, depth, selected),
            SelectionEdit::All {
                parameter,
                selected,
            } => state.select_all(&parameter, selected),
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open data directory…").clicked() {
                open_dir_dialog(state);
                ui.close_menu();
            }
            let can_export = state.chart.visible_series().next().is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export CSV…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(dir) = &state.data_dir {
            ui.label(format!(
                "{} stations in {}",
                state.stations.len(),
                dir.display()
            ));
        }

        let pending = state.pending();
        if pending > 0 {
            ui.separator();
            ui.spinner();
            ui.label(format!("{pending} request(s) in flight"));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_dir_dialog(state: &mut AppState) {
    let dir = rfd::FileDialog::new()
        .set_title("Open station data directory")
        .pick_folder();

    if let Some(path) = dir {
        if let Err(e) = state.open_data_dir(&path) {
            log::error!("Failed to open data directory: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

fn export_dialog(state: &mut AppState) {
    let station = state
        .model
        .as_ref()
        .map(|m| m.station().name.clone())
        .unwrap_or_else(|| "series".to_string());
    let file = rfd::FileDialog::new()
        .set_title("Export visible series")
        .set_file_name(format!("{station}.csv"))
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        state.export_csv(&path);
    }
}
