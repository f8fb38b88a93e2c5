use std::collections::HashMap;

use chrono::{DateTime, Local};
use eframe::egui::{self, Ui};
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotPoints};

use crate::chart::TooltipFormat;
use crate::state::{AppState, ViewWindow};

/// Local-time label for an epoch-millis x value.
fn format_time(ms: f64, pattern: &str) -> String {
    DateTime::from_timestamp_millis(ms as i64)
        .map(|t| t.with_timezone(&Local).format(pattern).to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Station plot (central panel)
// ---------------------------------------------------------------------------

/// Render the range selector and the time-series plot.
pub fn station_plot(ui: &mut Ui, state: &mut AppState) {
    if state.model.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Pick a station to chart its measurements");
        });
        return;
    }

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Zoom");
        for window in ViewWindow::ALL {
            if ui
                .selectable_label(state.view_window == window, window.label())
                .clicked()
            {
                state.set_view_window(window);
            }
        }
    });

    if let Some(msg) = state.chart.loading_message() {
        ui.label(egui::RichText::new(msg).italics());
    }

    let bounds = if state.view_changed {
        state.view_changed = false;
        state.view_bounds()
    } else {
        None
    };

    let units: Vec<&str> = state
        .chart
        .visible_axes()
        .iter()
        .map(|a| a.label_suffix.as_str())
        .collect();

    // Legend names must be unique per line; depth goes in the name.
    let lines: Vec<(String, &crate::chart::ChartSeries)> = state
        .chart
        .visible_series()
        .map(|s| (format!("{} [{}]", s.name, s.id), s))
        .collect();
    let tooltips: HashMap<String, TooltipFormat> = lines
        .iter()
        .map(|(name, s)| (name.clone(), s.tooltip.clone()))
        .collect();

    let mut plot = Plot::new("station_plot")
        .legend(Legend::default())
        .x_axis_label("Date")
        .y_axis_label(units.join(", "))
        .x_axis_formatter(|mark, _range| format_time(mark.value, "%d %b %H:%M"))
        .label_formatter(move |name, value| {
            let when = format_time(value.x, "%Y-%m-%d %H:%M");
            match tooltips.get(name) {
                Some(tooltip) => format!("{name}\n{when}\n{}", tooltip.format(value.y)),
                None => when,
            }
        })
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);

    // With a single unit on screen the y ticks carry it.
    if let [axis] = state.chart.visible_axes().as_slice() {
        let axis = (*axis).clone();
        plot = plot.y_axis_formatter(move |mark, _range| axis.format_label(mark.value));
    }

    plot.show(ui, |plot_ui| {
        if let Some((min, max)) = bounds {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max(min, max));
        }
        for (name, series) in &lines {
            let points: PlotPoints = series.points.iter().copied().collect();
            let line = Line::new(points)
                .name(name)
                .color(series.color)
                .width(1.5);
            plot_ui.line(line);
        }
    });
}
